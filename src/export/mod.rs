//! CSV serialization of displayed rows.
//!
//! Records are uniform JSON objects; the column set comes from the first
//! record's keys (in insertion order) and no per-row schema reconciliation
//! is attempted.

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("no data to export")]
    Empty,
}

/// Serialize rows to CSV text. Every field is double-quoted with interior
/// quotes doubled, so commas and quotes inside values survive common
/// spreadsheet imports. Nulls and missing keys render as the empty string.
pub fn to_csv(rows: &[Map<String, Value>]) -> Result<String, ExportError> {
    let first = rows.first().ok_or(ExportError::Empty)?;
    let columns: Vec<&str> = first.keys().map(String::as_str).collect();

    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(
        columns
            .iter()
            .map(|column| quote(column))
            .collect::<Vec<_>>()
            .join(","),
    );

    for row in rows {
        let line = columns
            .iter()
            .map(|column| quote(&render(row.get(*column))))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }

    Ok(lines.join("\n"))
}

/// Keep a download filename to a safe character set; everything else
/// becomes a dash.
pub fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '-'
            }
        })
        .collect();

    if cleaned.trim_matches('-').is_empty() {
        "export".to_string()
    } else {
        cleaned
    }
}

fn render(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(value: Value) -> Vec<Map<String, Value>> {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn escapes_commas_and_quotes() {
        let rows = rows(json!([
            {"a": 1, "b": "x,y"},
            {"a": 2, "b": "He said \"hi\""},
        ]));

        let csv = to_csv(&rows).unwrap();
        assert_eq!(
            csv,
            "\"a\",\"b\"\n\"1\",\"x,y\"\n\"2\",\"He said \"\"hi\"\"\""
        );
    }

    #[test]
    fn empty_rows_produce_no_file() {
        let err = to_csv(&[]).unwrap_err();
        assert!(matches!(err, ExportError::Empty));
    }

    #[test]
    fn null_and_missing_values_render_empty() {
        let rows = rows(json!([
            {"Fecha": "1 ene", "Visitantes": null},
            {"Fecha": "2 ene"},
        ]));

        let csv = to_csv(&rows).unwrap();
        assert_eq!(
            csv,
            "\"Fecha\",\"Visitantes\"\n\"1 ene\",\"\"\n\"2 ene\",\"\""
        );
    }

    #[test]
    fn columns_follow_first_record_key_order() {
        let rows = rows(json!([
            {"b": 1, "a": 2},
        ]));

        let csv = to_csv(&rows).unwrap();
        assert!(csv.starts_with("\"b\",\"a\""));
    }

    #[test]
    fn filenames_are_sanitized() {
        assert_eq!(sanitize_filename("reporte-prj_1"), "reporte-prj_1");
        assert_eq!(sanitize_filename("reporte general (marzo)"), "reporte-general--marzo-");
        assert_eq!(sanitize_filename("???"), "export");
    }
}

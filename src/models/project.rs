use serde::{Deserialize, Serialize};

/// A registered analytics project: an opaque upstream project identifier
/// plus the label the user chose for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
}

// Identity is the upstream project id. Renaming a project must not change
// how it compares, otherwise removal by value silently no-ops.
impl PartialEq for Project {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Project {}

/// Per-user profile document. One per authenticated user, created on first
/// login and never deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub email: Option<String>,
    /// Unix timestamp (seconds)
    pub created_at: i64,
    pub projects: Vec<Project>,
}

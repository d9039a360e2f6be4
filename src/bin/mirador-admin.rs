use anyhow::Result;
use clap::{Parser, Subcommand};
use mirador::config::{Config, DatabaseBackend};
use mirador::models::Project;
use mirador::storage::{PostgresStorage, ProfileStore, SqliteStorage};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mirador-admin")]
#[command(about = "Mirador project registry management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a user's registered projects
    List {
        /// User ID (sub claim from JWT, or 'local' when auth is disabled)
        user_id: String,
    },
    /// Register a project for a user
    Add {
        /// User ID (sub claim from JWT, or 'local' when auth is disabled)
        user_id: String,
        /// Opaque upstream project identifier
        project_id: String,
        /// User-facing project label
        name: String,
    },
    /// Remove a project from a user's list
    Remove {
        /// User ID (sub claim from JWT, or 'local' when auth is disabled)
        user_id: String,
        /// Opaque upstream project identifier
        project_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage: Arc<dyn ProfileStore> = match config.database.backend {
        DatabaseBackend::Sqlite => Arc::new(
            SqliteStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
        DatabaseBackend::Postgres => Arc::new(
            PostgresStorage::new(&config.database.url, config.database.max_connections).await?,
        ),
    };

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::List { user_id } => {
            let projects = storage.list_projects(&user_id).await?;
            if projects.is_empty() {
                println!("No projects registered for user '{}'.", user_id);
            } else {
                println!("{:<30} {}", "Project ID", "Name");
                println!("{}", "-".repeat(60));
                for project in projects {
                    println!("{:<30} {}", project.id, project.name);
                }
            }
        }
        Commands::Add {
            user_id,
            project_id,
            name,
        } => {
            storage.ensure_profile(&user_id, None).await?;
            let project = Project {
                id: project_id,
                name,
            };
            storage.add_project(&user_id, &project).await?;
            println!(
                "✓ Registered project '{}' ({}) for user '{}'",
                project.name, project.id, user_id
            );
        }
        Commands::Remove {
            user_id,
            project_id,
        } => {
            storage.ensure_profile(&user_id, None).await?;
            match storage.remove_project(&user_id, &project_id).await {
                Ok(remaining) => {
                    println!(
                        "✓ Removed project '{}' for user '{}' ({} remaining)",
                        project_id,
                        user_id,
                        remaining.len()
                    );
                }
                Err(mirador::storage::StorageError::NotFound) => {
                    println!(
                        "⚠ Project '{}' is not registered for user '{}'",
                        project_id, user_id
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}

//! libSQL run index (offline mode).
//!
//! The [`Storage`] struct wraps a local libSQL database holding the
//! workflow-run index consulted by `list-workflows` and the tone-profile
//! cache. The CLI process is the sole writer.

mod migrations;

use std::path::Path;

use chrono::Utc;
use libsql::{Connection, Database, params};

use blogsmith_shared::{BlogsmithError, Result};

/// A row from the workflow-run index.
#[derive(Debug, Clone)]
pub struct WorkflowRow {
    pub id: String,
    pub keywords: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

impl Storage {
    /// Open or create a database at `path`.
    pub async fn open(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| BlogsmithError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| BlogsmithError::Storage(e.to_string()))?;

        let conn = db
            .connect()
            .map_err(|e| BlogsmithError::Storage(e.to_string()))?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    /// Run pending schema migrations.
    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.get_schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        BlogsmithError::Storage(format!(
                            "migration v{} failed: {e}",
                            migration.version
                        ))
                    })?;
            }
        }
        Ok(())
    }

    /// Get the current schema version, or 0 if no migrations have been applied.
    async fn get_schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0, // Table doesn't exist yet
        }
    }

    // -----------------------------------------------------------------------
    // Workflow index
    // -----------------------------------------------------------------------

    /// Register a new workflow run.
    pub async fn insert_workflow(&self, id: &str, keywords: &str, status: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO workflows (id, keywords, status, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                   status = excluded.status,
                   updated_at = excluded.updated_at",
                params![id, keywords, status, now.as_str(), now.as_str()],
            )
            .await
            .map_err(|e| BlogsmithError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Update a workflow's status.
    pub async fn update_workflow_status(&self, id: &str, status: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE workflows SET status = ?1, updated_at = ?2 WHERE id = ?3",
                params![status, now.as_str(), id],
            )
            .await
            .map_err(|e| BlogsmithError::Storage(e.to_string()))?;
        Ok(())
    }

    /// List all workflow runs, most recently updated first.
    pub async fn list_workflows(&self) -> Result<Vec<WorkflowRow>> {
        let mut rows = self
            .conn
            .query(
                "SELECT id, keywords, status, created_at, updated_at
                 FROM workflows ORDER BY updated_at DESC",
                params![],
            )
            .await
            .map_err(|e| BlogsmithError::Storage(e.to_string()))?;

        let mut results = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            results.push(WorkflowRow {
                id: get_text(&row, 0)?,
                keywords: get_text(&row, 1)?,
                status: get_text(&row, 2)?,
                created_at: get_text(&row, 3)?,
                updated_at: get_text(&row, 4)?,
            });
        }
        Ok(results)
    }

    // -----------------------------------------------------------------------
    // Tone-profile cache
    // -----------------------------------------------------------------------

    /// Look up a cached tone profile by content hash and model.
    pub async fn get_tone_profile(
        &self,
        content_hash: &str,
        model_id: &str,
    ) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT profile_json FROM tone_profiles
                 WHERE content_hash = ?1 AND model_id = ?2",
                params![content_hash, model_id],
            )
            .await
            .map_err(|e| BlogsmithError::Storage(e.to_string()))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(Some(get_text(&row, 0)?)),
            Ok(None) => Ok(None),
            Err(e) => Err(BlogsmithError::Storage(e.to_string())),
        }
    }

    /// Cache a tone profile for a reference document + model pair.
    pub async fn set_tone_profile(
        &self,
        content_hash: &str,
        model_id: &str,
        profile_json: &str,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO tone_profiles (content_hash, model_id, profile_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(content_hash, model_id) DO UPDATE SET
                   profile_json = excluded.profile_json,
                   created_at = excluded.created_at",
                params![content_hash, model_id, profile_json, now.as_str()],
            )
            .await
            .map_err(|e| BlogsmithError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn get_text(row: &libsql::Row, idx: i32) -> Result<String> {
    row.get::<String>(idx)
        .map_err(|e| BlogsmithError::Storage(e.to_string()))
}

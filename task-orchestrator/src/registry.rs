//! Context registry cache.
//!
//! A durable, human-inspectable summary of every known project: one
//! pretty-printed JSON file per project under the application data
//! directory. It is the first stop for any "what was I doing" query because
//! reading it costs a file read instead of a store round-trip.
//!
//! Write contract: entries are rewritten in full and replaced atomically
//! (temp file + rename), never patched field-by-field, so a cancelled
//! session always leaves the cache in its last consistent state. Entries
//! are only deleted on explicit project archival.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use task_orchestrator_sdk::{ContextSnapshot, Project, TaskCounts};
use tracing::warn;

/// Persisted record for one project
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tech_summary: String,
    #[serde(default)]
    pub task_counts: TaskCounts,
    pub updated_at: DateTime<Local>,
}

impl RegistryEntry {
    /// Snapshot view consumed by the recovery resolver
    pub fn snapshot(&self) -> ContextSnapshot {
        ContextSnapshot {
            project_id: self.id.clone(),
            project_title: self.title.clone(),
            todo_count: self.task_counts.todo,
            doing_count: self.task_counts.doing,
            review_count: self.task_counts.review,
            observed_at: self.updated_at,
        }
    }
}

/// File-backed registry of project context records
///
/// Cheap to clone; reads never touch the network.
#[derive(Debug, Clone)]
pub struct RegistryCache {
    dir: PathBuf,
}

impl RegistryCache {
    /// Open the registry under the platform data directory
    pub fn open_default() -> Result<Self> {
        use directories::ProjectDirs;

        let dir = ProjectDirs::from("com", "task-orchestrator", "task-orchestrator")
            .map(|dirs| dirs.data_dir().join("registry"))
            .unwrap_or_else(|| PathBuf::from(".task-orchestrator-registry"));
        Self::open(dir)
    }

    /// Open the registry at an explicit directory
    pub fn open(dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create registry dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    /// Write-through hook: record the state observed after a store
    /// read or mutation touching this project
    pub fn record_observation(&self, project: &Project, counts: TaskCounts) -> Result<()> {
        self.record(&RegistryEntry {
            id: project.id.clone(),
            title: project.title.clone(),
            description: project.description.clone(),
            tech_summary: project.tech_summary.clone(),
            task_counts: counts,
            updated_at: Local::now(),
        })
    }

    /// Replace the project's record in full
    pub fn record(&self, entry: &RegistryEntry) -> Result<()> {
        let path = self.entry_path(&entry.id);
        let tmp = path.with_extension("json.tmp");

        let content = serde_json::to_string_pretty(entry)?;
        std::fs::write(&tmp, content)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }

    /// Most recent record for a project plus its age, if present
    pub fn load(&self, project_id: &str) -> Option<(RegistryEntry, Duration)> {
        let path = self.entry_path(project_id);
        let content = std::fs::read_to_string(path).ok()?;
        match serde_json::from_str::<RegistryEntry>(&content) {
            Ok(entry) => {
                let age = Local::now().signed_duration_since(entry.updated_at);
                Some((entry, age))
            }
            Err(e) => {
                warn!(project_id, error = %e, "unreadable registry entry, ignoring");
                None
            }
        }
    }

    /// All readable records with their ages
    pub fn load_all(&self) -> Vec<(RegistryEntry, Duration)> {
        let mut entries = Vec::new();
        let Ok(dir) = std::fs::read_dir(&self.dir) else {
            return entries;
        };
        for file in dir.flatten() {
            let path = file.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            match serde_json::from_str::<RegistryEntry>(&content) {
                Ok(entry) => {
                    let age = Local::now().signed_duration_since(entry.updated_at);
                    entries.push((entry, age));
                }
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable registry entry"),
            }
        }
        // Stable order for callers that enumerate candidates
        entries.sort_by(|a, b| a.0.id.cmp(&b.0.id));
        entries
    }

    /// Delete a record; only called on explicit project archival
    pub fn remove(&self, project_id: &str) -> Result<()> {
        let path = self.entry_path(project_id);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
        }
        Ok(())
    }

    fn entry_path(&self, project_id: &str) -> PathBuf {
        // Project ids are opaque; keep the filename filesystem-safe while
        // the real id lives inside the record
        let safe: String = project_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }
}

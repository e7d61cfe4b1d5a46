use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::db::{MemoryStore, SqliteStore};
use crate::insight::{InsightProvider, TemplateInsights};
use crate::ledger::Ledger;
use crate::query::StudentView;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub ledger: Ledger,
    pub student_view: StudentView,
    pub insights: Box<dyn InsightProvider>,
    pub rng_seed: u64,
}

impl AppState {
    /// Seeded, in-memory state used until a workspace is selected.
    pub fn in_memory(rng_seed: u64) -> Self {
        Self {
            workspace: None,
            ledger: Ledger::load(Box::new(MemoryStore::new()), rng_seed),
            student_view: StudentView::new(),
            insights: Box::new(TemplateInsights),
            rng_seed,
        }
    }

    pub fn open_workspace(&mut self, path: &Path) -> anyhow::Result<()> {
        let store = SqliteStore::open(path)?;
        self.ledger = Ledger::load(Box::new(store), self.rng_seed);
        self.workspace = Some(path.to_path_buf());
        self.student_view = StudentView::new();
        log::info!(
            "opened workspace {} ({})",
            path.to_string_lossy(),
            self.ledger.source().as_str()
        );
        Ok(())
    }
}

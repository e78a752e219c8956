use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::db;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    /// Opens (or creates) the workspace database and makes it current.
    pub fn open_workspace(&mut self, path: PathBuf) -> anyhow::Result<()> {
        let conn = db::open_db(&path)?;
        self.workspace = Some(path);
        self.db = Some(conn);
        Ok(())
    }
}

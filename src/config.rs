use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::db;
use crate::error::{CoreError, CoreResult};

pub const WORKSPACE_ENV: &str = "REGISTRARD_WORKSPACE";

const KEY_FAILED_BLOCKS: &str = "gwa.failedBlocksAverage";
const KEY_SUBJECT_SOURCE: &str = "migration.subjectSource";

/// Where migration takes a student's target-semester subject list from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubjectSource {
    /// Curriculum rows for (program, year level, target term).
    #[default]
    Curriculum,
    /// The target semester's registered subject offerings.
    Offerings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSettings {
    /// When set, a FAILED grade makes its slice unavailable like INC does.
    pub failed_blocks_average: bool,
    pub subject_source: SubjectSource,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    pub failed_blocks_average: Option<bool>,
    pub subject_source: Option<SubjectSource>,
}

impl EngineSettings {
    /// Reads the workspace settings. Missing or unreadable keys fall back to defaults.
    pub fn load(conn: &Connection) -> CoreResult<EngineSettings> {
        let mut out = EngineSettings::default();
        if let Some(v) = db::settings_get_json(conn, KEY_FAILED_BLOCKS)? {
            out.failed_blocks_average = v.as_bool().unwrap_or(false);
        }
        if let Some(v) = db::settings_get_json(conn, KEY_SUBJECT_SOURCE)? {
            out.subject_source = serde_json::from_value(v).unwrap_or_default();
        }
        Ok(out)
    }

    pub fn apply(conn: &Connection, patch: &SettingsPatch) -> CoreResult<EngineSettings> {
        if patch.failed_blocks_average.is_none() && patch.subject_source.is_none() {
            return Err(CoreError::InvalidInput("no settings to update".into()));
        }
        if let Some(v) = patch.failed_blocks_average {
            db::settings_set_json(conn, KEY_FAILED_BLOCKS, &json!(v))?;
        }
        if let Some(v) = patch.subject_source {
            let raw = serde_json::to_value(v)
                .map_err(|e| CoreError::InvalidInput(e.to_string()))?;
            db::settings_set_json(conn, KEY_SUBJECT_SOURCE, &raw)?;
        }
        let updated = EngineSettings::load(conn)?;
        tracing::info!(?updated, "engine settings updated");
        Ok(updated)
    }
}

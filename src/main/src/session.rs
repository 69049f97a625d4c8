use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use control::{validate_threshold, Temperature, DEFAULT_TEMPERATURE};
use log::*;
use serde::{Deserialize, Serialize};

/// What survives a restart: whether to resume and with which threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub enabled: bool,
    pub max_temperature: Temperature,
}

impl Default for Session {
    fn default() -> Self {
        Session {
            enabled: false,
            max_temperature: DEFAULT_TEMPERATURE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionFile {
    path: PathBuf,
}

impl SessionFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Session {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!("No saved session at {}", self.path.display());
                return Session::default();
            }
            Err(e) => {
                warn!("Can't read session {}: {}", self.path.display(), e);
                return Session::default();
            }
        };

        let session: Session = match serde_json::from_str(&json) {
            Ok(session) => session,
            Err(e) => {
                warn!("Ignoring corrupt session {}: {}", self.path.display(), e);
                return Session::default();
            }
        };
        if let Err(e) = validate_threshold(session.max_temperature) {
            warn!("Ignoring corrupt session {}: {}", self.path.display(), e);
            return Session::default();
        }
        session
    }

    pub fn save(&self, session: &Session) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string(session)?;

        // Write next to the target and rename so a crash never leaves half a file
        let staging = self.path.with_extension("json.tmp");
        fs::write(&staging, json)
            .with_context(|| format!("Failed to write {}", staging.display()))?;
        fs::rename(&staging, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        debug!("Saved session {:?}", session);
        Ok(())
    }
}

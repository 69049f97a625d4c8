use std::fs;
use std::path::PathBuf;

use control::Temperature;
use log::*;

/// Battery temperature as published by the power supply driver.
///
/// The value is passed through in the unit the driver uses, which on
/// Android is tenths of a degree.
#[derive(Debug, Clone)]
pub struct BatterySensor {
    path: PathBuf,
}

impl BatterySensor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn read(&self) -> Option<Temperature> {
        let content = fs::read_to_string(&self.path)
            .inspect_err(|e| debug!("Can't read {}: {}", self.path.display(), e))
            .ok()?;
        Temperature::parse(&content)
    }
}

use core::time::Duration;

use crate::error::ControlError;
use crate::state::{InjectionProbability, Temperature};

pub const DEFAULT_TEMPERATURE: Temperature = Temperature(60);
pub const MIN_TEMPERATURE: Temperature = Temperature(0);
pub const MAX_TEMPERATURE: Temperature = Temperature(100);
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ControllerConfig {
    // CPU temperature at and above which injection ramps up
    pub max_temperature: Temperature,

    // Time between two control steps
    pub tick_interval: Duration,

    // Upper bound for the injection probability, unbounded when None
    pub probability_ceiling: Option<InjectionProbability>,
}

impl ControllerConfig {
    pub fn new(
        max_temperature: Temperature,
        tick_interval: Duration,
        probability_ceiling: Option<InjectionProbability>,
    ) -> Result<Self, ControlError> {
        validate_threshold(max_temperature)?;
        if tick_interval.is_zero() {
            return Err(ControlError::InvalidConfig(
                "tick interval must be greater than zero".into(),
            ));
        }
        Ok(ControllerConfig {
            max_temperature,
            tick_interval,
            probability_ceiling,
        })
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            max_temperature: DEFAULT_TEMPERATURE,
            tick_interval: DEFAULT_TICK_INTERVAL,
            probability_ceiling: None,
        }
    }
}

pub fn validate_threshold(threshold: Temperature) -> Result<(), ControlError> {
    if threshold < MIN_TEMPERATURE || threshold > MAX_TEMPERATURE {
        return Err(ControlError::InvalidConfig(format!(
            "max temperature {} outside [{}, {}]",
            threshold.0, MIN_TEMPERATURE.0, MAX_TEMPERATURE.0
        )));
    }
    Ok(())
}

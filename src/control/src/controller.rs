use log::{debug, info, warn};

use crate::config::{validate_threshold, ControllerConfig};
use crate::error::ControlError;
use crate::event::{ControllerEvent, EventSink};
use crate::next_probability;
use crate::state::{
    ControllerState, InjectionProbability, RunState, Temperature, TemperatureSample, UiUpdate,
};
use crate::store::{Parameter, ParameterStore};

/// Outcome of a single control step.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TickReport {
    pub sample: TemperatureSample,
    pub probability: InjectionProbability,
    /// False when the new probability could not be written
    pub written: bool,
}

/// What the kernel currently reports, independent of controller state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct KernelStatus {
    pub injection_enabled: Option<bool>,
    pub injection_probability: Option<InjectionProbability>,
}

/// Drives the injection probability from periodic temperature samples.
///
/// The controller does not schedule itself: whoever owns it calls
/// [`Controller::tick`] periodically while it is running, never concurrently.
pub struct Controller<S, K> {
    store: S,
    sink: K,
    config: ControllerConfig,
    state: ControllerState,
}

impl<S: ParameterStore, K: EventSink> Controller<S, K> {
    pub fn new(store: S, sink: K, config: ControllerConfig) -> Self {
        Self {
            store,
            sink,
            config,
            state: ControllerState::default(),
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Switches injection on and begins accepting ticks.
    ///
    /// An invalid threshold leaves the controller untouched. Failing to
    /// write the enable flag does not prevent the transition; it is posted
    /// as a fault instead. Starting a running controller reconfigures it.
    pub fn start(&mut self, threshold: Temperature) -> Result<(), ControlError> {
        validate_threshold(threshold)?;

        info!(
            "Starting temperature controller with threshold {}",
            threshold.0
        );
        self.config.max_temperature = threshold;
        self.state.run_state = RunState::Running;
        self.switch_injection(true);
        Ok(())
    }

    /// Switches injection off and resets the probability. Idempotent.
    pub fn stop(&mut self) {
        if self.state.run_state == RunState::Stopped {
            debug!("Temperature controller is already stopped");
            return;
        }

        info!("Stopping temperature controller");
        self.state = ControllerState::default();
        self.switch_injection(false);
    }

    /// Samples, reports and adjusts once. Returns `None` while stopped.
    pub fn tick(&mut self, battery: Option<Temperature>) -> Option<TickReport> {
        if self.state.run_state != RunState::Running {
            return None;
        }

        let sample = TemperatureSample {
            cpu: self.cpu_temperature(),
            battery,
        };
        self.sink
            .post(ControllerEvent::Temperatures(UiUpdate::from(sample)));

        let next = next_probability(
            self.state.injection_probability,
            sample.cpu,
            self.config.max_temperature,
            self.config.probability_ceiling,
        );
        let written = self.set_injection_probability(next);

        Some(TickReport {
            sample,
            probability: self.state.injection_probability,
            written,
        })
    }

    pub fn kernel_status(&mut self) -> KernelStatus {
        let injection_enabled = self
            .read_parameter(Parameter::InjectionEnabled)
            .map(|value| value.trim() == "1");
        let injection_probability = self
            .read_parameter(Parameter::InjectionProbability)
            .and_then(|value| {
                parse_or_warn(
                    Parameter::InjectionProbability,
                    &value,
                    InjectionProbability::parse,
                )
            });

        KernelStatus {
            injection_enabled,
            injection_probability,
        }
    }

    /// Gives up privileged access. Further store operations fail.
    pub fn release(&mut self) {
        self.store.release();
    }

    fn cpu_temperature(&mut self) -> Option<Temperature> {
        let value = self.read_parameter(Parameter::CpuTemperature)?;
        parse_or_warn(Parameter::CpuTemperature, &value, Temperature::parse)
    }

    fn read_parameter(&mut self, parameter: Parameter) -> Option<String> {
        match self.store.read(parameter.key()) {
            Ok(value) => Some(value),
            Err(source) => {
                let error = ControlError::ParameterReadFailed {
                    key: parameter.key(),
                    source,
                };
                warn!("{}", error);
                None
            }
        }
    }

    fn write_parameter(&mut self, parameter: Parameter, value: &str) -> bool {
        match self.store.write(parameter.key(), value) {
            Ok(()) => true,
            Err(source) => {
                let error = ControlError::ParameterWriteFailed {
                    key: parameter.key(),
                    source,
                };
                warn!("{}", error);
                self.sink.post(ControllerEvent::Fault(error));
                false
            }
        }
    }

    fn switch_injection(&mut self, on: bool) -> bool {
        self.write_parameter(Parameter::InjectionEnabled, if on { "1" } else { "0" })
    }

    fn set_injection_probability(&mut self, probability: InjectionProbability) -> bool {
        let written = self.write_parameter(
            Parameter::InjectionProbability,
            &u32::from(probability).to_string(),
        );
        if written {
            self.state.injection_probability = probability;
        }
        written
    }
}

fn parse_or_warn<T>(
    parameter: Parameter,
    value: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let parsed = parse(value);
    if parsed.is_none() {
        let error = ControlError::MalformedValue {
            key: parameter.key(),
            value: value.to_string(),
        };
        warn!("{}", error);
    }
    parsed
}

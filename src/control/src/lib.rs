mod config;
mod controller;
mod error;
mod event;
mod state;
mod store;

pub use config::{
    validate_threshold, ControllerConfig, DEFAULT_TEMPERATURE, DEFAULT_TICK_INTERVAL,
    MAX_TEMPERATURE, MIN_TEMPERATURE,
};
pub use controller::{Controller, KernelStatus, TickReport};
pub use error::ControlError;
pub use event::{ControllerEvent, EventSink};
pub use state::{
    ControllerState, InjectionProbability, RunState, Temperature, TemperatureSample, UiUpdate,
};
pub use store::{Parameter, ParameterStore, StoreError};

pub const INJECTION_INCREASE_STEP: u32 = 2;
pub const INJECTION_DECREASE_STEP: u32 = 1;

/// One step of the exponential-backoff-like control law.
///
/// Once the CPU reaches `max_temperature` the probability starts at 1 and
/// doubles every step; below it, it decays by one per step down to off. An
/// unknown CPU temperature counts as below the threshold.
pub fn next_probability(
    current: InjectionProbability,
    cpu_temperature: Option<Temperature>,
    max_temperature: Temperature,
    ceiling: Option<InjectionProbability>,
) -> InjectionProbability {
    let current = u32::from(current);
    let too_hot = cpu_temperature.is_some_and(|t| t >= max_temperature);

    let next = if too_hot {
        if current > 0 {
            current.saturating_mul(INJECTION_INCREASE_STEP)
        } else {
            1
        }
    } else {
        current.saturating_sub(INJECTION_DECREASE_STEP)
    };

    match ceiling {
        Some(ceiling) => InjectionProbability::new(next.min(u32::from(ceiling))),
        None => InjectionProbability::new(next),
    }
}

use serde::{Deserialize, Serialize};

// Temperature in whole degrees celcius, as reported by the sensor
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize, Deserialize)]
pub struct Temperature(pub i32);

impl Temperature {
    /// Wire value for a reading that could not be taken.
    pub const UNKNOWN: i32 = -1;

    pub fn new(value: i32) -> Self {
        Self(value)
    }

    /// Parses a kernel parameter value such as `"47\n"`.
    pub fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<i32>().ok().map(Self)
    }

    pub fn to_wire(reading: Option<Temperature>) -> i32 {
        reading.map_or(Self::UNKNOWN, i32::from)
    }
}

impl From<Temperature> for i32 {
    fn from(value: Temperature) -> i32 {
        value.0
    }
}

// Chance of an idle cycle being injected, as understood by the kernel
#[derive(Debug, Default, PartialEq, Eq, PartialOrd, Ord, Clone, Copy)]
pub struct InjectionProbability(u32);

impl InjectionProbability {
    pub const OFF: Self = Self(0);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn parse(text: &str) -> Option<Self> {
        text.trim().parse::<u32>().ok().map(Self)
    }

}

impl From<InjectionProbability> for u32 {
    fn from(value: InjectionProbability) -> u32 {
        value.0
    }
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub enum RunState {
    #[default]
    Stopped,
    Running,
}

#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct ControllerState {
    pub run_state: RunState,
    pub injection_probability: InjectionProbability,
}

impl ControllerState {
    pub fn enabled(&self) -> bool {
        self.run_state == RunState::Running
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct TemperatureSample {
    pub cpu: Option<Temperature>,
    pub battery: Option<Temperature>,
}

/// Payload delivered to the UI once per tick. Unknown readings are sent as `-1`.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiUpdate {
    pub battery_temperature: i32,
    pub cpu_temperature: i32,
}

impl From<TemperatureSample> for UiUpdate {
    fn from(sample: TemperatureSample) -> UiUpdate {
        UiUpdate {
            battery_temperature: Temperature::to_wire(sample.battery),
            cpu_temperature: Temperature::to_wire(sample.cpu),
        }
    }
}

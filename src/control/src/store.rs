use thiserror::Error;

/// Kernel tunables the controller knows about, by conceptual key.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Parameter {
    /// `"1"` while idle injection is switched on, `"0"` otherwise
    InjectionEnabled,
    InjectionProbability,
    /// Read-only from the controller's point of view
    CpuTemperature,
}

impl Parameter {
    pub const ALL: [Parameter; 3] = [
        Parameter::InjectionEnabled,
        Parameter::InjectionProbability,
        Parameter::CpuTemperature,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Parameter::InjectionEnabled => "injection-enabled",
            Parameter::InjectionProbability => "injection-probability",
            Parameter::CpuTemperature => "cpu-temperature",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("parameter store has been released")]
    Released,

    #[error("privileged access unavailable: {0}")]
    Unavailable(String),

    #[error("no parameter is mapped to key '{0}'")]
    UnknownKey(String),

    #[error("refusing to send {0:?} through the privileged channel")]
    Rejected(String),

    #[error("command exited with status {status}")]
    CommandFailed { status: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Read/write access to text-valued kernel tunables.
///
/// Every call is a single best-effort attempt with no retries. A failed
/// write means the device state is unchanged. Taking `&mut self` keeps a
/// single command in flight against the underlying channel.
///
/// After [`ParameterStore::release`] every further call must fail with
/// [`StoreError::Released`].
pub trait ParameterStore: Send {
    fn read(&mut self, key: &str) -> Result<String, StoreError>;

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    fn release(&mut self);
}

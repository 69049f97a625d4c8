use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ControlError {
    /// The privileged channel could not be opened at all. Fatal at start-up.
    #[error("privileged parameter access unavailable: {0}")]
    PrivilegedAccessUnavailable(#[source] StoreError),

    #[error("failed to read parameter '{key}': {source}")]
    ParameterReadFailed {
        key: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("failed to write parameter '{key}': {source}")]
    ParameterWriteFailed {
        key: &'static str,
        #[source]
        source: StoreError,
    },

    #[error("parameter '{key}' holds malformed value {value:?}")]
    MalformedValue { key: &'static str, value: String },

    #[error("invalid controller configuration: {0}")]
    InvalidConfig(String),
}

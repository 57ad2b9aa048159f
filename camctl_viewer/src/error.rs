use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    /// The page collaborator supplied no endpoint address; the channel is
    /// never opened and there is nothing to retry.
    #[error("no control endpoint configured")]
    MissingEndpoint,

    #[error("invalid control endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },

    /// The retry bound was exhausted. Terminal: a fresh session is required.
    #[error("connection failed after {attempts} attempts")]
    ConnectionFailed { attempts: u32 },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Schema-level rejections, raised at schema-load time before any control is
/// built. These fail the whole panel.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SchemaError {
    #[error("no initial value for control '{variable_name}'")]
    MissingInitialValue { variable_name: String },

    #[error("duplicate control '{variable_name}'")]
    DuplicateControl { variable_name: String },

    #[error("duplicate display window '{window_name}'")]
    DuplicateWindow { window_name: String },
}

/// Per-control construction failures. These drop the one offending control
/// and leave the rest of the panel usable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ControlBuildError {
    #[error("slider '{variable_name}' has non-positive step {step_size}")]
    BadStep {
        variable_name: String,
        step_size: f64,
    },

    #[error("slider '{variable_name}' range is empty (min {min_value} >= max {max_value})")]
    EmptyRange {
        variable_name: String,
        min_value: f64,
        max_value: f64,
    },

    #[error("control '{variable_name}' has no initial value")]
    MissingSeed { variable_name: String },

    #[error("control '{variable_name}' initial value has the wrong type")]
    WrongSeedType { variable_name: String },

    #[error("menu '{variable_name}' declares no options")]
    EmptyMenu { variable_name: String },

    #[error("menu '{variable_name}' initial value matches no option")]
    UnknownMenuValue { variable_name: String },
}

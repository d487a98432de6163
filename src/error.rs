//! Error type for the synthesis engine.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No module with this name is loaded in the chain
    #[error("module '{0}' not found")]
    ModuleNotFound(String),

    /// The module exists but has no setter with this name
    #[error("module '{module}' has no setter '{setter}'")]
    UnknownSetter { module: String, setter: String },

    /// A binding name is neither reserved nor of the form `module.setter`
    #[error("invalid binding name '{0}'")]
    InvalidBinding(String),

    /// A module reported a failure while processing
    #[error("module '{module}' faulted: {reason}")]
    ModuleFault { module: String, reason: String },

    /// No module constructor is registered under this name
    #[error("no module registered as '{0}'")]
    UnknownModule(String),

    #[error("preset {0} is not configured")]
    PresetOutOfRange(usize),

    #[error("preset file is malformed: {0}")]
    PresetFormat(#[from] serde_json::Error),

    #[error("MIDI: {0}")]
    Midi(String),

    #[error("audio device: {0}")]
    Audio(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

//! Error types for the synthcode-core crate.

use thiserror::Error;

/// Errors that can occur while building, compiling or inspecting programs.
///
/// Clamped values are not errors: they are reported with `log::warn!` and
/// compilation continues.
#[derive(Error, Debug)]
pub enum SynthCodeError {
    /// A value, arity or repeat count was rejected while constructing a program.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A byte outside the encodable range reached the stream.
    #[error("Byte out of range: {0} (valid range is 0..{max})", max = crate::stream::NUM_VALUES)]
    Range(i64),

    /// The program or a registry is malformed (nesting, termination, unknown or duplicate names).
    #[error("Structural error: {0}")]
    Structural(String),

    /// No short decimal representation could be found for an encoded value.
    #[error("Could not calculate rounded version of {encoding}({value})")]
    DecodeRounding { encoding: String, value: u8 },

    /// Compiling a named instrument failed.
    #[error("Instrument {name:?}: {source}")]
    Instrument {
        name: String,
        source: Box<SynthCodeError>,
    },

    /// Error during Rhai script evaluation.
    #[error("Script error: {0}")]
    Script(String),

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using SynthCodeError.
pub type Result<T> = std::result::Result<T, SynthCodeError>;

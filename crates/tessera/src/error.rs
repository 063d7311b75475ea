//! Error types for the Tessera template engine.

use thiserror::Error;

pub use tessera_ast::{Location, ParseError};

/// All errors that can occur while parsing or rendering.
#[derive(Error, Debug)]
pub enum TesseraError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Invalid function: {name}")]
    UnknownFunction { name: String },

    #[error("The function {name} is expecting {expected} parameters and receives {received}")]
    ArgumentCount {
        name: String,
        expected: usize,
        received: usize,
    },

    #[error("Error converting parameter {index} in {function}: {cause}")]
    ParameterConversion {
        function: String,
        index: usize,
        cause: String,
    },

    #[error("The function {name} has an invalid signature: {message}")]
    InvalidSignature { name: String, message: String },

    #[error("Function {name} failed: {message}")]
    Function { name: String, message: String },

    #[error("Can't access {name} by index {index} because it is not a list")]
    NotAList { name: String, index: String },

    #[error("Can't access {name} by key {index} because it is not a dictionary")]
    NotADictionary { name: String, index: String },

    #[error("Invalid index '{index}' for {name}")]
    InvalidIndex { name: String, index: String },

    #[error("Type error: {message}")]
    TypeError { message: String },

    #[error("Base template not found: {name}")]
    BaseTemplateNotFound { name: String },

    #[error("Circular template reference detected: {name}")]
    CircularReference { name: String },

    #[error("Format error: {message}")]
    Format { message: String },

    #[error("Include error: {message}")]
    IncludeError { message: String },

    #[error("Error at {path}: {source}")]
    Render {
        path: String,
        #[source]
        source: Box<TesseraError>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TesseraError {
    /// The innermost error, looking through [`TesseraError::Render`] annotations.
    pub fn root_cause(&self) -> &TesseraError {
        match self {
            TesseraError::Render { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

/// Result type alias for Tessera operations
pub type Result<T> = std::result::Result<T, TesseraError>;

use thiserror::Error;

/// Result type for BRAVIA operations
pub type Result<T> = std::result::Result<T, BraviaError>;

/// Errors that can occur when interacting with a BRAVIA television
#[derive(Error, Debug)]
pub enum BraviaError {
    /// A command name was not found in the device's remote-controller table
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A decoded success body lacked the expected result field
    #[error("{method}: response missing result field: {body}")]
    MissingResult {
        /// The API method whose response was incomplete
        method: String,
        /// Raw response body, for diagnosis
        body: String,
    },

    /// The device answered with a non-200 HTTP status
    #[error("{method}: HTTP status {status}")]
    HttpStatus {
        /// The API method that failed
        method: String,
        /// HTTP status code returned by the device
        status: u16,
    },

    /// Connection, timeout, or DNS failure
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The device returned an application-level error envelope
    #[error("{method}: device error {code}: {message}")]
    Application {
        /// The API method that failed
        method: String,
        /// Device error code
        code: i64,
        /// Device error message
        message: String,
    },

    /// A response body did not parse per the expected encoding
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

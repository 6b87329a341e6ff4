/// Represents the possible errors that can occur while harvesting finished tasks.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// A required configuration value was not provided.
    #[error("Missing configuration value: {name}")]
    MissingConfig { name: &'static str },
    /// A configuration value was provided but could not be used.
    #[error("Invalid configuration value for {name}: {message}")]
    InvalidConfig {
        name: &'static str,
        message: String,
    },
    #[error("Network request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Failed to parse response: {0}")]
    ResponseParseFailed(#[from] serde_json::Error),
    /// The Tripo API returned a non-successful status code.
    #[error("API request failed: {message}")]
    ApiError { message: String },
    /// The database endpoint rejected a query or reported errors.
    #[error("Database query failed: {message}")]
    Database { message: String },
    /// The object store rejected an upload.
    #[error("Upload failed: {message}")]
    Storage { message: String },
    /// A pending row could not be turned into a work item.
    #[error("Invalid work item: {message}")]
    InvalidWorkItem { message: String },
    #[error("URL parsing failed: {0}")]
    UrlParseFailed(#[from] url::ParseError),
    #[error("File I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// Error taxonomy for the upload command. Every variant is terminal: the
// `Display` text is what the user sees and `exit_code` is what the process
// exits with.

use serde_json::Value;
use thiserror::Error;

/// Exit code for a successful upload or a `--help` request.
pub const EXIT_OK: i32 = 0;
/// Exit code for configuration problems detected by the binary.
pub const EXIT_CONFIG: i32 = 1;
/// Exit code for bad arguments or an unusable image file.
pub const EXIT_USAGE: i32 = 2;
/// Exit code for authorization and upstream failures.
pub const EXIT_UPLOAD: i32 = 3;
/// Exit code when the account is not enrolled in the images beta.
pub const EXIT_NOT_IN_BETA: i32 = 4;

#[derive(Error, Debug)]
pub enum UploadError {
    #[error("No file at {0}; must be a path to a valid file.")]
    NoFile(String),

    #[error("File {0} is too large; compressed size must be less than 5GB")]
    TooLarge(String),

    #[error(
        "Your token was not authorized to use this endpoint.  Please reconfigure \
         your API token to ensure you can make this request."
    )]
    Unauthorized,

    #[error(
        "It looks like you are not in the Machine Images Beta, and therefore cannot \
         upload images yet.  Please stay tuned, or open a support ticket to request access."
    )]
    NotInBeta,

    #[error("Upload failed with status {status}; response was {}", describe_body(.body))]
    Failed { status: u16, body: Option<Value> },

    #[error("Upload failed: API response did not include an upload ticket (`upload_to` and `image`)")]
    MalformedResponse,

    #[error("Upload failed: {0:#}")]
    Transport(#[from] anyhow::Error),
}

impl UploadError {
    pub fn exit_code(&self) -> i32 {
        match self {
            UploadError::NoFile(_) | UploadError::TooLarge(_) => EXIT_USAGE,
            UploadError::NotInBeta => EXIT_NOT_IN_BETA,
            UploadError::Unauthorized
            | UploadError::Failed { .. }
            | UploadError::MalformedResponse
            | UploadError::Transport(_) => EXIT_UPLOAD,
        }
    }
}

/// Render a response body the way it should appear in a failure message:
/// bare text for JSON strings, compact JSON otherwise.
pub fn describe_body(body: &Option<Value>) -> String {
    match body {
        None => "(empty)".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

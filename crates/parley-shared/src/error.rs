use thiserror::Error;

/// Errors produced by the attachment envelope codec.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AttachmentError {
    /// The envelope is missing the `data:` prefix or the `;base64,` separator.
    #[error("Malformed attachment envelope")]
    Malformed,

    /// The payload section is not valid base64.
    #[error("Invalid base64 payload: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    /// The decoded payload would exceed the configured size cap.
    #[error("Attachment too large: ~{estimated} bytes (max {max})")]
    TooLarge { estimated: usize, max: usize },
}

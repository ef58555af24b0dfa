/// Application name
pub const APP_NAME: &str = "Parley";

/// Prefix of the attachment envelope (data-URL form)
pub const ENVELOPE_PREFIX: &str = "data:";

/// Separator between the media-type tag and the base64 payload
pub const ENVELOPE_SEPARATOR: &str = ";base64,";

/// Default maximum decoded attachment size in bytes (10 MiB)
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 10 * 1024 * 1024;

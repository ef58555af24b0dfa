//! Attachment envelope codec.
//!
//! Binary payloads cross the text-oriented wire as a self-describing
//! data-URL: `data:<media-type>;base64,<payload>`. The envelope exists only
//! in transit; stores always hold the decoded bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::constants::{ENVELOPE_PREFIX, ENVELOPE_SEPARATOR};
use crate::error::AttachmentError;
use crate::types::MessageKind;

/// Encode raw bytes and their media type into an envelope string.
pub fn encode(bytes: &[u8], mime_type: &str) -> String {
    format!(
        "{ENVELOPE_PREFIX}{mime_type}{ENVELOPE_SEPARATOR}{}",
        STANDARD.encode(bytes)
    )
}

/// Decode an envelope back into `(bytes, media type)`.
///
/// Exact inverse of [`encode`] for every byte sequence, including the empty
/// one. Fails if the prefix or separator is missing, or the payload is not
/// valid base64.
pub fn decode(envelope: &str) -> Result<(Vec<u8>, String), AttachmentError> {
    let rest = envelope
        .strip_prefix(ENVELOPE_PREFIX)
        .ok_or(AttachmentError::Malformed)?;
    let (mime_type, payload) = rest
        .split_once(ENVELOPE_SEPARATOR)
        .ok_or(AttachmentError::Malformed)?;

    let bytes = STANDARD.decode(payload)?;
    Ok((bytes, mime_type.to_string()))
}

/// Decode with a cap on the decoded size.
///
/// The cap is checked against the base64 length estimate *before* any
/// allocation, so an adversarial envelope cannot force a large buffer.
pub fn decode_with_limit(
    envelope: &str,
    max_bytes: usize,
) -> Result<(Vec<u8>, String), AttachmentError> {
    let payload_len = envelope
        .strip_prefix(ENVELOPE_PREFIX)
        .and_then(|rest| rest.split_once(ENVELOPE_SEPARATOR))
        .map(|(_, payload)| payload.len())
        .ok_or(AttachmentError::Malformed)?;

    let estimated = base64::decoded_len_estimate(payload_len);
    if estimated > max_bytes {
        return Err(AttachmentError::TooLarge {
            estimated,
            max: max_bytes,
        });
    }

    decode(envelope)
}

/// Classify a media type into the message kind used on the wire.
///
/// `Image` iff the type has the `image/` prefix; everything else is a
/// generic file.
pub fn classify(mime_type: &str) -> MessageKind {
    if mime_type.starts_with("image/") {
        MessageKind::Image
    } else {
        MessageKind::File
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let bytes = b"\x89PNG\r\n\x1a\n binary \x00\xff payload";
        let envelope = encode(bytes, "image/png");
        assert!(envelope.starts_with("data:image/png;base64,"));

        let (decoded, mime) = decode(&envelope).unwrap();
        assert_eq!(decoded, bytes);
        assert_eq!(mime, "image/png");
    }

    #[test]
    fn roundtrip_empty_payload() {
        let envelope = encode(b"", "application/octet-stream");
        let (decoded, mime) = decode(&envelope).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(mime, "application/octet-stream");
    }

    #[test]
    fn decode_rejects_missing_prefix() {
        assert_eq!(
            decode("image/png;base64,AAAA"),
            Err(AttachmentError::Malformed)
        );
    }

    #[test]
    fn decode_rejects_missing_separator() {
        assert_eq!(decode("data:image/png"), Err(AttachmentError::Malformed));
        assert_eq!(
            decode("data:image/png,AAAA"),
            Err(AttachmentError::Malformed)
        );
    }

    #[test]
    fn decode_rejects_bad_base64() {
        let result = decode("data:image/png;base64,not base64!!");
        assert!(matches!(result, Err(AttachmentError::InvalidBase64(_))));
    }

    #[test]
    fn limit_rejects_before_decoding() {
        let envelope = encode(&[0u8; 1024], "application/pdf");
        let result = decode_with_limit(&envelope, 512);
        assert!(matches!(result, Err(AttachmentError::TooLarge { .. })));

        // Under the cap the decode succeeds.
        let (bytes, _) = decode_with_limit(&envelope, 2048).unwrap();
        assert_eq!(bytes.len(), 1024);
    }

    #[test]
    fn classify_by_prefix() {
        assert_eq!(classify("image/png"), MessageKind::Image);
        assert_eq!(classify("image/svg+xml"), MessageKind::Image);
        assert_eq!(classify("application/pdf"), MessageKind::File);
        assert_eq!(classify("text/plain"), MessageKind::File);
    }
}

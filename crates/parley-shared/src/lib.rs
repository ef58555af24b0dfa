//! # parley-shared
//!
//! Types shared between the Parley chat server and clients: user and
//! connection identifiers, the attachment envelope codec, and the JSON wire
//! protocol spoken over the real-time channel.

pub mod attachment;
pub mod constants;
pub mod protocol;
pub mod types;

mod error;

pub use error::AttachmentError;

// Error types for the Ogg container engine

use thiserror::Error;

/// Errors reported while reading or writing an Ogg bitstream.
///
/// Most read-side errors describe a single damaged or missing page and leave
/// the reader usable; see [`OggError::is_recoverable`].
#[derive(Error, Debug)]
pub enum OggError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes at `offset` are not an `OggS` capture pattern.
    #[error("lost sync at byte offset {offset}: capture pattern not found")]
    Sync { offset: u64 },

    #[error("unsupported Ogg page version {version} at byte offset {offset}")]
    UnsupportedVersion { version: u8, offset: u64 },

    #[error("checksum mismatch on page {sequence} of stream {serial:08X}: stored {stored:08X}, computed {computed:08X}")]
    Checksum {
        serial: u32,
        sequence: u32,
        stored: u32,
        computed: u32,
    },

    /// A page ended before its header, segment table or payload was complete.
    #[error("truncated page: needed {needed} bytes, only {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("page {sequence} of stream {serial:08X} continues a packet that was never started")]
    MissingContinuation { serial: u32, sequence: u32 },

    #[error("page {sequence} of stream {serial:08X} starts a new packet while {discarded} bytes of the previous one were pending")]
    UnexpectedDiscontinuity {
        serial: u32,
        sequence: u32,
        discarded: usize,
    },

    /// The stream ended (end-of-stream page or end of input) mid-packet.
    #[error("stream {serial:08X} ended with {discarded} bytes of an unterminated packet")]
    UnterminatedPacket { serial: u32, discarded: usize },

    #[error("page for unknown stream {serial:08X} without a begin-of-stream flag")]
    OrphanStream { serial: u32 },

    #[error("begin-of-stream page for stream {serial:08X}, which is already active")]
    DuplicateBeginOfStream { serial: u32 },

    #[error("page loss in stream {serial:08X}: expected sequence {expected}, found {found}")]
    PageLoss {
        serial: u32,
        expected: u32,
        found: u32,
    },

    #[error("stream {serial:08X} was already closed by an end-of-stream packet")]
    StreamReopened { serial: u32 },
}

impl OggError {
    /// Whether reading can continue past this error.
    ///
    /// `UnsupportedVersion`, `Truncated` and I/O errors end the physical
    /// stream; `StreamReopened` is final for its serial but other streams keep
    /// flowing, so it counts as recoverable here.
    pub fn is_recoverable(&self) -> bool {
        !matches!(
            self,
            OggError::Io(_) | OggError::UnsupportedVersion { .. } | OggError::Truncated { .. }
        )
    }

    /// Serial number of the logical stream the error belongs to, if any.
    pub fn serial(&self) -> Option<u32> {
        match self {
            OggError::Checksum { serial, .. }
            | OggError::MissingContinuation { serial, .. }
            | OggError::UnexpectedDiscontinuity { serial, .. }
            | OggError::UnterminatedPacket { serial, .. }
            | OggError::OrphanStream { serial }
            | OggError::DuplicateBeginOfStream { serial }
            | OggError::PageLoss { serial, .. }
            | OggError::StreamReopened { serial } => Some(*serial),
            OggError::Io(_)
            | OggError::Sync { .. }
            | OggError::UnsupportedVersion { .. }
            | OggError::Truncated { .. } => None,
        }
    }
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, OggError>;

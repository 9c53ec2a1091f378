//! Error types shared by every enveil context.
//!
//! Channel errors are an abandonment signal, never surfaced to the user.
//! Codec errors mean the other context sent something we do not understand;
//! the message is dropped. Armor errors are degradations: callers fall back to
//! passing raw text through.

use thiserror::Error;

/// Errors raised by [`crate::Port`] and [`crate::PortHub`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The port was disconnected (locally or by the remote side).
    ///
    /// Nothing was delivered.
    #[error("channel closed: {name}")]
    ChannelClosed {
        /// Name of the closed port.
        name: String,
    },

    /// Another live port already uses this name.
    #[error("port name already in use: {name}")]
    NameInUse {
        /// Conflicting port name.
        name: String,
    },

    /// The accepting side of the hub is gone.
    #[error("no listener accepts connections")]
    NoListener,

    /// Message could not be encoded for the wire.
    #[error(transparent)]
    Codec(#[from] CodecError),
}

impl PortError {
    /// Returns true if the error means the remote context went away.
    ///
    /// Such errors trigger cleanup and are never shown to the user.
    pub fn is_abandonment(&self) -> bool {
        matches!(self, Self::ChannelClosed { .. } | Self::NoListener)
    }
}

/// Wire codec errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Payload was not a valid message.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Payload exceeds the maximum message size.
    #[error("message too large: {size} bytes (max {max})")]
    TooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Maximum accepted size in bytes.
        max: usize,
    },
}

/// Armored block extraction errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ArmorError {
    /// No `-----BEGIN PGP MESSAGE-----` line.
    #[error("no armored message header found")]
    MissingBegin,

    /// Header present but no matching end line.
    #[error("armored message is not terminated")]
    MissingEnd,

    /// Nothing between header and footer.
    #[error("armored message has an empty body")]
    EmptyBody,
}

/// Inbound event dispatch errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// No handler registered for this event name.
    #[error("no handler registered for event '{event}'")]
    Unhandled {
        /// Event name that was dispatched.
        event: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_channel_is_abandonment() {
        assert!(PortError::ChannelClosed { name: "frame-1".into() }.is_abandonment());
        assert!(PortError::NoListener.is_abandonment());
    }

    #[test]
    fn naming_and_codec_errors_are_not_abandonment() {
        assert!(!PortError::NameInUse { name: "frame-1".into() }.is_abandonment());
        assert!(!PortError::Codec(CodecError::Encode("boom".into())).is_abandonment());
    }
}

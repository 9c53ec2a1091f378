//! Frame identity.

use std::fmt;

use enveil_core::{FRAME_PORT_PREFIX, env::Environment};
use sha2::{Digest, Sha256};

/// Bytes of the digest kept in the id.
const ID_LEN: usize = 8;

/// Content-derived frame id: hex of the first 8 bytes of
/// `SHA-256(element key || 16 random bytes)`.
///
/// The random salt keeps two frames on equal-looking elements apart; the
/// element key keeps ids readable in logs next to the element they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameId(String);

impl FrameId {
    /// Derive a fresh id for the element identified by `element_key`.
    pub fn generate<E: Environment>(element_key: &str, env: &E) -> Self {
        let mut salt = [0u8; 16];
        env.random_bytes(&mut salt);
        Self::from_parts(element_key, &salt)
    }

    /// Derive the id from an element key and salt.
    pub fn from_parts(element_key: &str, salt: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(element_key.as_bytes());
        hasher.update(salt);
        let digest = hasher.finalize();
        Self(hex::encode(&digest[..ID_LEN]))
    }

    /// Hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the port this frame opens.
    pub fn port_name(&self) -> String {
        format!("{FRAME_PORT_PREFIX}{}", self.0)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_is_sixteen_hex_chars() {
        let id = FrameId::from_parts("compose-1", &[7; 16]);
        assert_eq!(id.as_str().len(), 16);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn salt_separates_equal_elements() {
        let a = FrameId::from_parts("compose-1", &[1; 16]);
        let b = FrameId::from_parts("compose-1", &[2; 16]);
        assert_ne!(a, b);
        assert_eq!(a, FrameId::from_parts("compose-1", &[1; 16]));
    }

    #[test]
    fn port_name_is_prefixed() {
        let id = FrameId::from_parts("compose-1", &[0; 16]);
        assert_eq!(id.port_name(), format!("frame-{id}"));
    }
}

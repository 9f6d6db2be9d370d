use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 20 random bytes render as 40 hex characters, 160 bits of entropy.
const HANDLE_BYTES: usize = 20;

/// Opaque identifier for an exported function or a pending reply.
///
/// Handles travel as text on the wire. They are minted from the OS CSPRNG,
/// so uniqueness within a peer holds without coordination, and a handle is
/// never reused for the lifetime of a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Handle(String);

impl Handle {
    /// Mint a fresh handle from the OS random source.
    pub fn generate() -> Self {
        let mut bytes = [0u8; HANDLE_BYTES];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Handle(bytes.iter().map(|b| format!("{:02x}", b)).collect())
    }

    /// Wrap existing text as a handle. Intended for wire decoding and for
    /// tests that need to reference a handle they did not mint.
    pub fn from_text(text: impl Into<String>) -> Self {
        Handle(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_handles_are_forty_hex_chars() {
        let handle = Handle::generate();
        assert_eq!(handle.as_str().len(), 40);
        assert!(handle.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_handles_do_not_collide() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            assert!(seen.insert(Handle::generate()));
        }
    }

    #[test]
    fn serializes_as_bare_text() {
        let handle = Handle::from_text("00ff");
        let json = serde_json::to_string(&handle).unwrap();
        assert_eq!(json, "\"00ff\"");

        let back: Handle = serde_json::from_str(&json).unwrap();
        assert_eq!(back, handle);
    }
}

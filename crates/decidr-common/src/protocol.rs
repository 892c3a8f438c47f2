//! Relay wire framing.
//!
//! The relay itself never looks inside payloads. The only structure it
//! understands is the session-targeted frame an Admin uses to address one of
//! its clients:
//!
//! ```text
//! <peer-id>\n<payload>
//! ```
//!
//! The payload is opaque and may itself contain newlines; only the first
//! newline separates the id.

use serde::{Deserialize, Serialize};

/// Separator between the target id and the payload.
pub const TARGET_SEPARATOR: u8 = b'\n';

/// Build a targeted frame `"<peer_id>\n<payload>"`.
pub fn encode_targeted(peer_id: &str, payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(peer_id.len() + 1 + payload.len());
    frame.extend_from_slice(peer_id.as_bytes());
    frame.push(TARGET_SEPARATOR);
    frame.extend_from_slice(payload);
    frame
}

/// Split a targeted frame into `(peer_id, payload)`.
///
/// Returns `None` when there is no separator, the id is empty, or the id is
/// not valid UTF-8.
pub fn split_targeted(frame: &[u8]) -> Option<(&str, &[u8])> {
    let pos = frame.iter().position(|b| *b == TARGET_SEPARATOR)?;
    if pos == 0 {
        return None;
    }
    let id = std::str::from_utf8(&frame[..pos]).ok()?;
    Some((id, &frame[pos + 1..]))
}

/// Body of the relay's `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthReport {
    pub admins: usize,
    pub clients: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_then_split() {
        let frame = encode_targeted("client-1", b"opaque\nbytes");
        let (id, payload) = split_targeted(&frame).unwrap();
        assert_eq!(id, "client-1");
        assert_eq!(payload, b"opaque\nbytes");
    }

    #[test]
    fn test_split_empty_payload() {
        let (id, payload) = split_targeted(b"client-1\n").unwrap();
        assert_eq!(id, "client-1");
        assert!(payload.is_empty());
    }

    #[test]
    fn test_split_rejects_missing_target() {
        assert!(split_targeted(b"no separator here").is_none());
        assert!(split_targeted(b"\npayload").is_none());
        assert!(split_targeted(b"").is_none());
    }

    #[test]
    fn test_split_rejects_non_utf8_id() {
        assert!(split_targeted(&[0xff, 0xfe, b'\n', 1, 2]).is_none());
    }
}

//! Handshake roles and their message ordering.
//!
//! NK is a one round-trip pattern: exactly two messages, one in each
//! direction. The two roles must run the opposite ordering or the exchange
//! deadlocks (both sides sending first, or both waiting).

use std::fmt;

use crate::noise::CipherState;

/// Handshake role. Client identities initiate, Admin identities respond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Initiator,
    Responder,
}

impl Role {
    pub fn is_initiator(self) -> bool {
        matches!(self, Role::Initiator)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Initiator => f.write_str("initiator"),
            Role::Responder => f.write_str("responder"),
        }
    }
}

/// One step of the handshake from a single party's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Write the next handshake message and transmit it.
    Send,
    /// Receive the next handshake message and process it.
    Receive,
}

const INITIATOR_STEPS: [Step; 2] = [Step::Send, Step::Receive];
const RESPONDER_STEPS: [Step; 2] = [Step::Receive, Step::Send];

/// Ordered steps for `role` under the NK pattern.
pub fn steps_for(role: Role) -> &'static [Step] {
    match role {
        Role::Initiator => &INITIATOR_STEPS,
        Role::Responder => &RESPONDER_STEPS,
    }
}

/// Map the core's split output onto `(send, receive)` for `role`.
///
/// The core hands out the pair in transcript order: `first` protects
/// initiator-to-responder traffic, `second` protects responder-to-initiator
/// traffic, no matter which side asks. The responder therefore sends with
/// `second` and receives with `first`.
pub fn cipher_states_for(
    role: Role,
    first: CipherState,
    second: CipherState,
) -> (CipherState, CipherState) {
    match role {
        Role::Initiator => (first, second),
        Role::Responder => (second, first),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initiator_sends_first() {
        assert_eq!(steps_for(Role::Initiator), &[Step::Send, Step::Receive]);
    }

    #[test]
    fn test_responder_receives_first() {
        assert_eq!(steps_for(Role::Responder), &[Step::Receive, Step::Send]);
    }

    #[test]
    fn test_orderings_are_mirrored() {
        let initiator = steps_for(Role::Initiator);
        let responder = steps_for(Role::Responder);
        assert_eq!(initiator.len(), responder.len());
        for (i, r) in initiator.iter().zip(responder) {
            assert_ne!(i, r, "both parties would block on the same step");
        }
    }

    #[test]
    fn test_cipher_state_assignment_is_complementary() {
        let i2r = [1u8; 32];
        let r2i = [2u8; 32];

        let (mut init_send, mut init_recv) = cipher_states_for(
            Role::Initiator,
            CipherState::new(i2r),
            CipherState::new(r2i),
        );
        let (mut resp_send, mut resp_recv) = cipher_states_for(
            Role::Responder,
            CipherState::new(i2r),
            CipherState::new(r2i),
        );

        let ct = init_send.encrypt(b"to admin").unwrap();
        assert_eq!(resp_recv.decrypt(&ct).unwrap(), b"to admin");

        let ct = resp_send.encrypt(b"to client").unwrap();
        assert_eq!(init_recv.decrypt(&ct).unwrap(), b"to client");
    }
}

//! Fiat-Shamir challenge derivation.
//!
//! The challenge value c is not drawn and stored per challenge; it is derived
//! deterministically from a domain-separated Merlin transcript over
//! (group, challenge id, username, Y, R). The server re-derives c at
//! verification time from the record it stored, so nothing beyond that record
//! has to be held in mutable state. The high-entropy challenge id is what
//! makes each transcript unique: without it, every challenge issued against
//! the same commitment would share one c, and a recorded (R, s) pair could be
//! redeemed again under a fresh challenge id.

use crypto_bigint::{Encoding, U2048};
use merlin::Transcript as MerlinTranscript;

use crate::group::{GroupElement, GroupParams, Scalar, ELEMENT_BYTES};

/// Protocol label for transcript initialization.
const PROTOCOL_LABEL: &[u8] = b"schnorr-login v1";

/// Domain separation tag for challenge generation.
const CHALLENGE_DST: &[u8] = b"challenge";

/// Byte length of derived challenges (256 bits, far below q's 2047).
const CHALLENGE_BYTES: usize = 32;

/// Transcript wrapper binding a challenge to one login attempt.
pub struct ChallengeTranscript(MerlinTranscript);

impl ChallengeTranscript {
    /// Creates a new transcript for the Schnorr login protocol.
    pub fn new() -> Self {
        Self(MerlinTranscript::new(PROTOCOL_LABEL))
    }

    /// Appends the group description (name, p, g).
    pub fn append_group(&mut self, group: &GroupParams) {
        self.0.append_message(b"group", group.name().as_bytes());
        self.0.append_message(b"p", &group.p().to_be_bytes());
        self.0
            .append_message(b"g", &group.generator().inner().to_be_bytes());
    }

    /// Appends the single-use challenge identifier.
    ///
    /// This is the per-challenge freshness input; every issued challenge gets
    /// a distinct c even for an identical (username, Y, R) triple.
    pub fn append_challenge_id(&mut self, challenge_id: &str) {
        self.0
            .append_message(b"challenge-id", challenge_id.as_bytes());
    }

    /// Appends the username the challenge is issued for.
    pub fn append_principal(&mut self, username: &str) {
        self.0.append_message(b"username", username.as_bytes());
    }

    /// Appends the registered public key Y.
    pub fn append_statement(&mut self, public_key: &GroupElement) {
        self.0.append_message(b"y", &public_key.inner().to_be_bytes());
    }

    /// Appends the client's commitment R.
    pub fn append_commitment(&mut self, commitment: &GroupElement) {
        self.0.append_message(b"r", &commitment.inner().to_be_bytes());
    }

    /// Squeezes out the challenge scalar c in [0, q).
    ///
    /// A 256-bit output is always canonical mod the 2047-bit q, so no
    /// reduction is needed.
    pub fn challenge_scalar(&mut self) -> Scalar {
        let mut buf = [0u8; CHALLENGE_BYTES];
        self.0.challenge_bytes(CHALLENGE_DST, &mut buf);

        let mut wide = [0u8; ELEMENT_BYTES];
        wide[ELEMENT_BYTES - CHALLENGE_BYTES..].copy_from_slice(&buf);
        Scalar::new(U2048::from_be_slice(&wide))
    }
}

impl Default for ChallengeTranscript {
    fn default() -> Self {
        Self::new()
    }
}

/// Derives the challenge for one (challenge id, username, Y, R) binding.
pub fn derive_challenge(
    group: &GroupParams,
    challenge_id: &str,
    username: &str,
    public_key: &GroupElement,
    commitment: &GroupElement,
) -> Scalar {
    let mut transcript = ChallengeTranscript::new();
    transcript.append_group(group);
    transcript.append_challenge_id(challenge_id);
    transcript.append_principal(username);
    transcript.append_statement(public_key);
    transcript.append_commitment(commitment);
    transcript.challenge_scalar()
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;

    use super::*;

    #[test]
    fn derivation_is_deterministic() {
        let group = GroupParams::modp_2048();
        let mut rng = OsRng;
        let y = group.pow_g(&group.random_scalar(&mut rng));
        let r = group.pow_g(&group.random_scalar(&mut rng));

        let c1 = derive_challenge(&group, "id-1", "alice", &y, &r);
        let c2 = derive_challenge(&group, "id-1", "alice", &y, &r);
        assert_eq!(c1, c2);
    }

    #[test]
    fn challenge_binds_every_input() {
        let group = GroupParams::modp_2048();
        let mut rng = OsRng;
        let y = group.pow_g(&group.random_scalar(&mut rng));
        let y2 = group.pow_g(&group.random_scalar(&mut rng));
        let r = group.pow_g(&group.random_scalar(&mut rng));
        let r2 = group.pow_g(&group.random_scalar(&mut rng));

        let base = derive_challenge(&group, "id-1", "alice", &y, &r);
        assert_ne!(base, derive_challenge(&group, "id-2", "alice", &y, &r));
        assert_ne!(base, derive_challenge(&group, "id-1", "bob", &y, &r));
        assert_ne!(base, derive_challenge(&group, "id-1", "alice", &y2, &r));
        assert_ne!(base, derive_challenge(&group, "id-1", "alice", &y, &r2));
    }

    #[test]
    fn challenge_is_canonical() {
        let group = GroupParams::modp_2048();
        let mut rng = OsRng;
        let y = group.pow_g(&group.random_scalar(&mut rng));
        let r = group.pow_g(&group.random_scalar(&mut rng));

        let c = derive_challenge(&group, "id-1", "alice", &y, &r);
        assert!(group.scalar_is_canonical(&c));
        assert!(!c.is_zero());
    }
}

//! Protocol state transitions: register, issue-challenge, verify.

use std::sync::Arc;

use rand_core::{OsRng, RngCore};
use subtle::ConstantTimeEq;
use tracing::debug;

use crate::group::{GroupElement, GroupParams, Scalar};
use crate::protocol::transcript::derive_challenge;
use crate::store::{Challenge, ChallengeStore, Identity, IdentityStore};
use crate::{Error, Result};

/// Byte length of generated challenge identifiers (256 bits of entropy).
const CHALLENGE_ID_BYTES: usize = 32;

/// A freshly issued challenge, as returned to the client.
#[derive(Clone, Debug)]
pub struct IssuedChallenge {
    /// Opaque single-use identifier.
    pub challenge_id: String,
    /// Challenge value c the response must incorporate.
    pub c: Scalar,
    /// Seconds until the challenge expires.
    pub expires_in: u64,
}

/// The only component that touches the identity and challenge stores
/// together.
///
/// Stores are injected so tests can swap in their own implementations. The
/// engine owns no mutable state of its own; clones share the stores.
pub struct ProtocolEngine<I, C> {
    group: Arc<GroupParams>,
    identities: I,
    challenges: C,
    challenge_ttl_secs: u64,
}

impl<I: Clone, C: Clone> Clone for ProtocolEngine<I, C> {
    fn clone(&self) -> Self {
        Self {
            group: Arc::clone(&self.group),
            identities: self.identities.clone(),
            challenges: self.challenges.clone(),
            challenge_ttl_secs: self.challenge_ttl_secs,
        }
    }
}

impl<I, C> ProtocolEngine<I, C>
where
    I: IdentityStore,
    C: ChallengeStore,
{
    /// Creates an engine over the given stores.
    pub fn new(group: Arc<GroupParams>, identities: I, challenges: C, challenge_ttl_secs: u64) -> Self {
        Self {
            group,
            identities,
            challenges,
            challenge_ttl_secs,
        }
    }

    /// The group every submitted element is checked against.
    pub fn group(&self) -> &Arc<GroupParams> {
        &self.group
    }

    /// Registers a username with its public key Y.
    ///
    /// Y must lie in [2, p-2] and in the prime-order subgroup; anything else
    /// is rejected before it can take part in a proof. No token is issued.
    pub async fn register(&self, username: &str, public_key: GroupElement, salt: Vec<u8>) -> Result<()> {
        self.group.validate_element(&public_key)?;

        self.identities
            .register(Identity::new(username.to_string(), public_key, salt))
            .await?;

        debug!(username, "identity registered");
        Ok(())
    }

    /// Issues a single-use challenge for the commitment R.
    ///
    /// The challenge value c is derived from the (challenge id, username,
    /// Y, R) transcript rather than stored; verification re-derives it from
    /// the recorded challenge. Folding the fresh id into the transcript makes
    /// c unique per challenge, so a recorded response is worthless against
    /// any later challenge for the same commitment.
    pub async fn issue_challenge(
        &self,
        username: &str,
        client_r: GroupElement,
    ) -> Result<IssuedChallenge> {
        let identity = self.identities.get(username).await?;
        self.group.validate_element(&client_r)?;

        let mut id_bytes = [0u8; CHALLENGE_ID_BYTES];
        OsRng.fill_bytes(&mut id_bytes);
        let challenge_id = hex::encode(id_bytes);

        let c = derive_challenge(
            &self.group,
            &challenge_id,
            username,
            &identity.public_key,
            &client_r,
        );

        let challenge = Challenge::new(
            challenge_id.clone(),
            username.to_string(),
            client_r,
            self.challenge_ttl_secs,
        );
        self.challenges.put(challenge).await?;

        debug!(username, challenge_id, "challenge issued");
        Ok(IssuedChallenge {
            challenge_id,
            c,
            expires_in: self.challenge_ttl_secs,
        })
    }

    /// Verifies a login proof, consuming the challenge win or lose.
    ///
    /// The challenge is retired before any proof math runs, so a failed
    /// attempt can never be retried against the same id and two racing
    /// attempts can never both succeed. All post-consumption failures
    /// collapse into [`Error::InvalidProof`] to deny an adversary a
    /// fine-grained verification oracle.
    pub async fn verify(
        &self,
        challenge_id: &str,
        s: Scalar,
        client_r: GroupElement,
        username: &str,
    ) -> Result<String> {
        let identity = self.identities.get(username).await?;

        let challenge = match self.challenges.consume_if_valid(challenge_id).await {
            Ok(challenge) => challenge,
            Err(Error::ChallengeNotFound) => return Err(Error::InvalidProof),
            Err(err) => return Err(err),
        };

        if challenge.username != username {
            return Err(Error::InvalidProof);
        }

        // The commitment supplied at verify time must be the one the
        // challenge was bound to; otherwise a recycled id could be replayed
        // against a different R.
        if !bool::from(challenge.client_r.ct_eq(&client_r)) {
            return Err(Error::InvalidProof);
        }

        if !self.group.scalar_is_canonical(&s) {
            return Err(Error::InvalidProof);
        }

        let group = Arc::clone(&self.group);
        let public_key = identity.public_key;
        let owner = username.to_string();
        let consumed_id = challenge.id;

        // 2048-bit exponentiations are CPU-bound; keep them off the async
        // dispatch threads.
        let valid = tokio::task::spawn_blocking(move || {
            let c = derive_challenge(&group, &consumed_id, &owner, &public_key, &client_r);
            let lhs = group.pow_g(&s);
            let rhs = group.mul(&client_r, &group.pow(&public_key, &c));
            bool::from(lhs.ct_eq(&rhs))
        })
        .await
        .map_err(|err| Error::Internal(format!("verification task failed: {err}")))?;

        if !valid {
            debug!(username, challenge_id, "proof rejected");
            return Err(Error::InvalidProof);
        }

        debug!(username, challenge_id, "proof verified");
        Ok(username.to_string())
    }
}

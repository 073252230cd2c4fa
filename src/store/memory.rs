//! In-memory store implementations backed by `tokio::sync::RwLock`.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use tokio::sync::RwLock;

use super::{unix_now, Challenge, ChallengeStore, Identity, IdentityStore};
use crate::{Error, Result};

const MAX_TOTAL_IDENTITIES: usize = 10_000;
const MAX_TOTAL_CHALLENGES: usize = 50_000;

/// Thread-safe in-memory identity registry.
///
/// Clones share the underlying map.
#[derive(Clone, Default)]
pub struct MemoryIdentityStore {
    identities: Arc<RwLock<HashMap<String, Identity>>>,
}

impl MemoryIdentityStore {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn register(&self, identity: Identity) -> Result<()> {
        let mut identities = self.identities.write().await;

        if identities.len() >= MAX_TOTAL_IDENTITIES {
            return Err(Error::Internal(format!(
                "identity capacity reached ({MAX_TOTAL_IDENTITIES})"
            )));
        }

        if identities.contains_key(&identity.username) {
            return Err(Error::DuplicateIdentity(identity.username));
        }

        identities.insert(identity.username.clone(), identity);
        Ok(())
    }

    async fn get(&self, username: &str) -> Result<Identity> {
        let identities = self.identities.read().await;
        identities
            .get(username)
            .cloned()
            .ok_or_else(|| Error::UnknownUser(username.to_string()))
    }

    async fn len(&self) -> usize {
        self.identities.read().await.len()
    }
}

/// Thread-safe in-memory challenge table with TTL and consume-once semantics.
///
/// Clones share the underlying map.
#[derive(Clone, Default)]
pub struct MemoryChallengeStore {
    challenges: Arc<RwLock<HashMap<String, Challenge>>>,
}

impl MemoryChallengeStore {
    /// Creates an empty challenge table.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChallengeStore for MemoryChallengeStore {
    async fn put(&self, challenge: Challenge) -> Result<()> {
        let mut challenges = self.challenges.write().await;

        if challenges.len() >= MAX_TOTAL_CHALLENGES {
            return Err(Error::Internal(format!(
                "challenge capacity reached ({MAX_TOTAL_CHALLENGES})"
            )));
        }

        challenges.insert(challenge.id.clone(), challenge);
        Ok(())
    }

    async fn consume_if_valid(&self, challenge_id: &str) -> Result<Challenge> {
        // A single write lock covers the read and the flip, so two racing
        // verify calls cannot both observe consumed == false.
        let mut challenges = self.challenges.write().await;

        let challenge = challenges
            .get_mut(challenge_id)
            .ok_or(Error::ChallengeNotFound)?;

        if challenge.consumed {
            return Err(Error::ChallengeReplayed);
        }

        if challenge.is_expired(unix_now()) {
            challenges.remove(challenge_id);
            return Err(Error::ChallengeExpired);
        }

        challenge.consumed = true;
        Ok(challenge.clone())
    }

    async fn sweep_expired(&self) -> usize {
        let mut challenges = self.challenges.write().await;
        let now = unix_now();

        let before = challenges.len();
        challenges.retain(|_, challenge| !challenge.is_expired(now));
        before - challenges.len()
    }

    async fn len(&self) -> usize {
        self.challenges.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use rand_core::OsRng;
    use crate::group::GroupParams;

    use super::*;

    fn test_element() -> crate::group::GroupElement {
        let group = GroupParams::modp_2048();
        let mut rng = OsRng;
        group.pow_g(&group.random_scalar(&mut rng))
    }

    #[tokio::test]
    async fn duplicate_registration_is_rejected() {
        let store = MemoryIdentityStore::new();
        let identity = Identity::new("alice".into(), test_element(), b"salt".to_vec());
        let original_key = identity.public_key.clone();

        store.register(identity).await.unwrap();

        let second = Identity::new("alice".into(), test_element(), b"other".to_vec());
        let err = store.register(second).await.unwrap_err();
        assert!(matches!(err, Error::DuplicateIdentity(_)));

        // The originally stored key is unchanged.
        let stored = store.get("alice").await.unwrap();
        assert_eq!(stored.public_key, original_key);
    }

    #[tokio::test]
    async fn missing_identity_is_unknown_user() {
        let store = MemoryIdentityStore::new();
        let err = store.get("nobody").await.unwrap_err();
        assert!(matches!(err, Error::UnknownUser(_)));
    }

    #[tokio::test]
    async fn consume_flips_exactly_once() {
        let store = MemoryChallengeStore::new();
        let challenge = Challenge::new("id-1".into(), "alice".into(), test_element(), 300);
        store.put(challenge).await.unwrap();

        let consumed = store.consume_if_valid("id-1").await.unwrap();
        assert!(consumed.consumed);

        let err = store.consume_if_valid("id-1").await.unwrap_err();
        assert!(matches!(err, Error::ChallengeReplayed));
    }

    #[tokio::test]
    async fn expired_challenge_is_reported_and_dropped() {
        let store = MemoryChallengeStore::new();
        let challenge = Challenge::new("id-1".into(), "alice".into(), test_element(), 0);
        store.put(challenge).await.unwrap();

        let err = store.consume_if_valid("id-1").await.unwrap_err();
        assert!(matches!(err, Error::ChallengeExpired));

        let err = store.consume_if_valid("id-1").await.unwrap_err();
        assert!(matches!(err, Error::ChallengeNotFound));
    }

    #[tokio::test]
    async fn sweep_evicts_consumed_and_unconsumed_alike() {
        let store = MemoryChallengeStore::new();
        store
            .put(Challenge::new("gone".into(), "a".into(), test_element(), 0))
            .await
            .unwrap();
        store
            .put(Challenge::new("kept".into(), "b".into(), test_element(), 300))
            .await
            .unwrap();

        assert_eq!(store.sweep_expired().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.consume_if_valid("kept").await.is_ok());
    }
}

//! Durable identity records and short-lived challenge records.
//!
//! The protocol engine is generic over both store traits so tests can
//! substitute their own implementations; the bundled [`memory`] versions back
//! the server process.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;

use crate::group::GroupElement;
use crate::Result;

/// In-memory store implementations.
pub mod memory;

pub use memory::{MemoryChallengeStore, MemoryIdentityStore};

/// Seconds since the UNIX epoch.
pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| unreachable!("System time is after UNIX_EPOCH"))
        .as_secs()
}

/// A registered identity. Created once; immutable afterwards.
#[derive(Clone, Debug)]
pub struct Identity {
    /// Unique username the identity is keyed by.
    pub username: String,
    /// Registered public key Y = g^x mod p.
    pub public_key: GroupElement,
    /// Opaque client-side salt, stored verbatim.
    pub salt: Vec<u8>,
    /// Unix timestamp of registration.
    pub created_at: u64,
}

impl Identity {
    /// Creates an identity record stamped with the current time.
    pub fn new(username: String, public_key: GroupElement, salt: Vec<u8>) -> Self {
        Self {
            username,
            public_key,
            salt,
            created_at: unix_now(),
        }
    }
}

/// A single-use login challenge bound to one commitment.
#[derive(Clone, Debug)]
pub struct Challenge {
    /// High-entropy opaque identifier.
    pub id: String,
    /// Username the challenge was issued for.
    pub username: String,
    /// The commitment R the client opened the attempt with.
    pub client_r: GroupElement,
    /// Unix timestamp when the challenge was created.
    pub created_at: u64,
    /// Unix timestamp when the challenge expires.
    pub expires_at: u64,
    /// Flipped exactly once, by the first verification attempt.
    pub consumed: bool,
}

impl Challenge {
    /// Creates a challenge record expiring `ttl_secs` from now.
    pub fn new(id: String, username: String, client_r: GroupElement, ttl_secs: u64) -> Self {
        let created_at = unix_now();
        Self {
            id,
            username,
            client_r,
            created_at,
            expires_at: created_at.saturating_add(ttl_secs),
            consumed: false,
        }
    }

    /// Checks if the challenge has expired.
    pub fn is_expired(&self, now: u64) -> bool {
        now >= self.expires_at
    }
}

/// Durable mapping from username to registered identity.
#[async_trait]
pub trait IdentityStore: Send + Sync + 'static {
    /// Persists a new identity, failing with
    /// [`crate::Error::DuplicateIdentity`] if the username is taken.
    async fn register(&self, identity: Identity) -> Result<()>;

    /// Fetches an identity, failing with [`crate::Error::UnknownUser`] if
    /// absent.
    async fn get(&self, username: &str) -> Result<Identity>;

    /// Number of registered identities.
    async fn len(&self) -> usize;
}

/// Short-lived, single-use challenge records.
#[async_trait]
pub trait ChallengeStore: Send + Sync + 'static {
    /// Inserts a freshly issued challenge.
    async fn put(&self, challenge: Challenge) -> Result<()>;

    /// Atomically reads a challenge and flips its consumed flag in one
    /// indivisible step.
    ///
    /// Fails with [`crate::Error::ChallengeNotFound`] if absent,
    /// [`crate::Error::ChallengeReplayed`] if already consumed, and
    /// [`crate::Error::ChallengeExpired`] past the TTL. This is the mechanism
    /// that bounds every challenge to at most one successful verification,
    /// however many verify calls race on it.
    async fn consume_if_valid(&self, challenge_id: &str) -> Result<Challenge>;

    /// Evicts every record past its expiry, consumed or not, returning the
    /// number removed.
    async fn sweep_expired(&self) -> usize;

    /// Number of live challenge records.
    async fn len(&self) -> usize;
}

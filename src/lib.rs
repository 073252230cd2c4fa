//! Password-less login built on a Schnorr zero-knowledge identification
//! protocol.
//!
//! A client registers a public key `Y = g^x mod p` over the 2048-bit MODP
//! safe-prime group, then proves knowledge of `x` per login: it commits to
//! `R = g^k mod p`, receives a single-use challenge `c`, and answers with
//! `s = (k + c*x) mod q`. The server accepts iff `g^s = R * Y^c (mod p)` and
//! mints an HMAC-signed bearer token, which is the only credential the rest
//! of the system ever sees.
//!
//! The crate splits into the group arithmetic ([`group`]), the store
//! abstractions holding identities and single-use challenges ([`store`]), the
//! protocol engine tying them together ([`protocol`]), token issuance and
//! validation ([`token`]), and the gRPC surface ([`server`]).

/// Modular arithmetic primitives.
pub mod crypto;
/// Error taxonomy.
pub mod error;
/// Discrete-log group parameters and element types.
pub mod group;
/// Protocol engine, transcript, and client-side math.
pub mod protocol;
/// Generated gRPC types.
pub mod proto {
    tonic::include_proto!("schnorr.auth.v1");
}
/// gRPC server, configuration, and rate limiting.
pub mod server;
/// Identity and challenge stores.
pub mod store;
/// Bearer token issuance and validation.
pub mod token;

pub use error::{Error, Result};
pub use group::{GroupElement, GroupParams, Scalar};
pub use protocol::{Credential, IssuedChallenge, LoginAttempt, ProtocolEngine};
pub use store::{Challenge, ChallengeStore, Identity, IdentityStore, MemoryChallengeStore, MemoryIdentityStore};
pub use token::{SigningKey, TokenIssuer, TokenValidator};

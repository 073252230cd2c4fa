/// Client-side credential and login math.
pub mod client;
/// Protocol state transitions and verification checks.
pub mod engine;
/// Merlin transcript for Fiat-Shamir challenge derivation.
pub mod transcript;

pub use client::{Credential, LoginAttempt};
pub use engine::{IssuedChallenge, ProtocolEngine};
pub use transcript::{derive_challenge, ChallengeTranscript};

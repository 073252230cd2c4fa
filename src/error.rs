//! Error taxonomy for the authentication protocol.

/// Main error type for the library.
///
/// Every variant is a client-visible protocol outcome; none is retried
/// internally and none is fatal to the process. Recovery always means the
/// client starts over with a fresh challenge and fresh randomness.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The username is already registered.
    #[error("Username '{0}' is already registered")]
    DuplicateIdentity(String),

    /// A public key or commitment failed the range or subgroup check.
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    /// No identity is registered under the given username.
    #[error("User '{0}' not found")]
    UnknownUser(String),

    /// No challenge exists with the given identifier.
    ///
    /// Store-internal; the protocol engine reports it to clients as
    /// [`Error::InvalidProof`] so absent and failed challenges are
    /// indistinguishable.
    #[error("Challenge not found")]
    ChallengeNotFound,

    /// The challenge passed its expiry before verification.
    #[error("Challenge expired")]
    ChallengeExpired,

    /// The challenge was already consumed by an earlier verification attempt.
    #[error("Challenge already used")]
    ChallengeReplayed,

    /// The proof failed verification.
    ///
    /// Deliberately carries no detail about which sub-check failed.
    #[error("Proof verification failed")]
    InvalidProof,

    /// The token is structurally invalid.
    #[error("Malformed token: {0}")]
    TokenMalformed(String),

    /// The token signature does not match.
    #[error("Invalid token signature")]
    TokenInvalidSignature,

    /// The token passed its expiry timestamp.
    #[error("Token expired")]
    TokenExpired,

    /// Unexpected runtime failure (worker pool, serialization).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl From<Error> for tonic::Status {
    fn from(err: Error) -> Self {
        let message = err.to_string();
        match err {
            Error::DuplicateIdentity(_) => tonic::Status::already_exists(message),
            Error::InvalidPublicKey(_) => tonic::Status::invalid_argument(message),
            Error::UnknownUser(_) => tonic::Status::not_found(message),
            Error::ChallengeNotFound
            | Error::ChallengeExpired
            | Error::ChallengeReplayed
            | Error::InvalidProof
            | Error::TokenMalformed(_)
            | Error::TokenInvalidSignature
            | Error::TokenExpired => tonic::Status::unauthenticated(message),
            Error::Internal(_) => tonic::Status::internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failures_map_to_unauthenticated() {
        for err in [
            Error::ChallengeExpired,
            Error::ChallengeReplayed,
            Error::InvalidProof,
            Error::TokenExpired,
        ] {
            let status = tonic::Status::from(err);
            assert_eq!(status.code(), tonic::Code::Unauthenticated);
        }
    }

    #[test]
    fn registration_failures_keep_distinct_codes() {
        let dup = tonic::Status::from(Error::DuplicateIdentity("alice".into()));
        assert_eq!(dup.code(), tonic::Code::AlreadyExists);

        let bad_key = tonic::Status::from(Error::InvalidPublicKey("out of range".into()));
        assert_eq!(bad_key.code(), tonic::Code::InvalidArgument);

        let unknown = tonic::Status::from(Error::UnknownUser("bob".into()));
        assert_eq!(unknown.code(), tonic::Code::NotFound);
    }
}

//! Prover-side arithmetic: key generation, commitments, and responses.
//!
//! The server never runs this code on behalf of a user; it exists for the
//! bundled client binary and for exercising the verifier in tests.

use rand_core::CryptoRngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::group::{GroupElement, GroupParams, Scalar};

/// A long-lived login credential: the secret exponent x and its public key
/// Y = g^x mod p.
///
/// The secret is zeroized when the credential is dropped and is never
/// serialized anywhere.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential {
    x: Scalar,
    #[zeroize(skip)]
    public_key: GroupElement,
}

impl Credential {
    /// Generates a fresh credential with a uniform secret.
    pub fn generate<R: CryptoRngCore>(group: &GroupParams, rng: &mut R) -> Self {
        let x = group.random_scalar(rng);
        Self::from_secret(group, x)
    }

    /// Builds a credential from an existing secret exponent.
    pub fn from_secret(group: &GroupParams, x: Scalar) -> Self {
        let public_key = group.pow_g(&x);
        Self { x, public_key }
    }

    /// The public key Y registered with the server.
    pub fn public_key(&self) -> &GroupElement {
        &self.public_key
    }

    pub(crate) fn secret(&self) -> &Scalar {
        &self.x
    }
}

/// One in-flight login: the nonce k and its commitment R = g^k mod p.
///
/// The nonce must be fresh per attempt; reusing k across challenges leaks the
/// secret exponent.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct LoginAttempt {
    k: Scalar,
    #[zeroize(skip)]
    commitment: GroupElement,
}

impl LoginAttempt {
    /// Starts a login attempt with a fresh random nonce.
    pub fn begin<R: CryptoRngCore>(group: &GroupParams, rng: &mut R) -> Self {
        let k = group.random_scalar(rng);
        Self::from_nonce(group, k)
    }

    /// Starts a login attempt from a caller-supplied nonce.
    pub fn from_nonce(group: &GroupParams, k: Scalar) -> Self {
        let commitment = group.pow_g(&k);
        Self { k, commitment }
    }

    /// The commitment R sent with the challenge request.
    pub fn commitment(&self) -> &GroupElement {
        &self.commitment
    }

    /// Computes the response s = (k + c*x) mod q for the server's challenge.
    pub fn respond(&self, group: &GroupParams, credential: &Credential, challenge: &Scalar) -> Scalar {
        let cx = group.scalar_mul(challenge, credential.secret());
        group.scalar_add(&self.k, &cx)
    }
}

//! Bearer token issuance and validation.
//!
//! Tokens are the sole capability this core hands to the rest of the system:
//! every other subsystem presents one and receives back a username or a
//! rejection. The format is deliberately simple and opaque to callers:
//! `hex(claims JSON) "." hex(HMAC-SHA256 tag)`. There is no server-side
//! revocation list; expiry is a timestamp comparison and nothing else.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::store::unix_now;
use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Byte length of randomly generated signing keys.
const SIGNING_KEY_BYTES: usize = 32;

/// Claim set carried by every token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Username the token was issued to.
    pub sub: String,
    /// Unix timestamp of issuance.
    pub iat: u64,
    /// Unix timestamp after which the token is rejected.
    pub exp: u64,
}

/// Secret key shared by issuer and validator. Wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SigningKey(Vec<u8>);

impl SigningKey {
    /// Generates a fresh random key.
    pub fn random() -> Self {
        let mut bytes = vec![0u8; SIGNING_KEY_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Loads a key from its hex encoding.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes = hex::decode(hex_str)
            .map_err(|_| Error::Internal("token secret is not valid hex".to_string()))?;
        if bytes.is_empty() {
            return Err(Error::Internal("token secret is empty".to_string()));
        }
        Ok(Self(bytes))
    }

    fn mac(&self) -> HmacSha256 {
        HmacSha256::new_from_slice(&self.0)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"))
    }
}

/// A freshly minted token, as returned to the client.
#[derive(Clone, Debug)]
pub struct IssuedToken {
    pub token: String,
    /// Seconds until expiry.
    pub expires_in: u64,
}

/// Mints signed bearer tokens.
#[derive(Clone)]
pub struct TokenIssuer {
    key: Arc<SigningKey>,
    lifetime_secs: u64,
}

impl TokenIssuer {
    pub fn new(key: Arc<SigningKey>, lifetime_secs: u64) -> Self {
        Self { key, lifetime_secs }
    }

    /// Issues a token for the subject. Never fails for a valid username.
    pub fn issue(&self, username: &str) -> Result<IssuedToken> {
        let iat = unix_now();
        let claims = Claims {
            sub: username.to_string(),
            iat,
            exp: iat.saturating_add(self.lifetime_secs),
        };

        let payload = serde_json::to_vec(&claims)
            .map_err(|err| Error::Internal(format!("claims serialization failed: {err}")))?;

        let mut mac = self.key.mac();
        mac.update(&payload);
        let tag = mac.finalize().into_bytes();

        Ok(IssuedToken {
            token: format!("{}.{}", hex::encode(payload), hex::encode(tag)),
            expires_in: self.lifetime_secs,
        })
    }
}

/// Checks signed bearer tokens and extracts the subject.
#[derive(Clone)]
pub struct TokenValidator {
    key: Arc<SigningKey>,
}

impl TokenValidator {
    pub fn new(key: Arc<SigningKey>) -> Self {
        Self { key }
    }

    /// Returns the username a valid token was issued to.
    ///
    /// The signature is checked before any byte of the payload is trusted.
    pub fn validate(&self, token: &str) -> Result<String> {
        let (payload_hex, tag_hex) = token
            .split_once('.')
            .ok_or_else(|| Error::TokenMalformed("missing signature separator".to_string()))?;

        let payload = hex::decode(payload_hex)
            .map_err(|_| Error::TokenMalformed("payload is not valid hex".to_string()))?;
        let tag = hex::decode(tag_hex)
            .map_err(|_| Error::TokenMalformed("signature is not valid hex".to_string()))?;

        let mut mac = self.key.mac();
        mac.update(&payload);
        mac.verify_slice(&tag)
            .map_err(|_| Error::TokenInvalidSignature)?;

        let claims: Claims = serde_json::from_slice(&payload)
            .map_err(|err| Error::TokenMalformed(format!("invalid claims: {err}")))?;

        if unix_now() >= claims.exp {
            return Err(Error::TokenExpired);
        }

        Ok(claims.sub)
    }
}

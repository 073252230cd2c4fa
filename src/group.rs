//! The discrete-log group all protocol arithmetic happens in.
//!
//! Parameters are the standardized 2048-bit MODP safe-prime group (RFC 3526
//! group 14): a safe prime `p`, the prime subgroup order `q = (p - 1) / 2`,
//! and the generator `g = 2` of the order-`q` subgroup of quadratic residues.
//! They are selected once at process start and never mutated; every other
//! component borrows them for range and subgroup checks.

use crypto_bigint::{Encoding, NonZero, Random, U2048, Zero};
use rand_core::CryptoRngCore;
use subtle::{Choice, ConstantTimeEq};
use zeroize::Zeroize;

use crate::crypto::field::{mod_mul, mod_pow};
use crate::{Error, Result};

/// Fixed-width byte length of serialized elements and scalars.
pub const ELEMENT_BYTES: usize = 256;

/// An element of the multiplicative group mod p.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct GroupElement(U2048);

/// An exponent reduced mod q.
///
/// Secret scalars (private keys, nonces) are wiped on drop.
#[derive(Clone, Debug, Eq, PartialEq, Zeroize)]
#[zeroize(drop)]
pub struct Scalar(U2048);

impl ConstantTimeEq for GroupElement {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0.ct_eq(&other.0)
    }
}

impl GroupElement {
    pub fn new(value: U2048) -> Self {
        Self(value)
    }

    pub fn inner(&self) -> &U2048 {
        &self.0
    }

    /// Parses an element from big-endian hex.
    ///
    /// Accepts variable-length input (odd lengths and `0x` prefixes included)
    /// since reference clients send unpadded `hex(n)` strings. Magnitude and
    /// subgroup membership are checked separately by
    /// [`GroupParams::validate_element`].
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let value = parse_hex_2048(hex_str)
            .map_err(|reason| Error::InvalidPublicKey(reason.to_string()))?;
        Ok(Self(value))
    }

    /// Renders the element as fixed-width big-endian hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl Scalar {
    pub fn new(value: U2048) -> Self {
        Self(value)
    }

    pub fn from_u64(value: u64) -> Self {
        Self(U2048::from_u64(value))
    }

    pub fn inner(&self) -> &U2048 {
        &self.0
    }

    /// Parses a scalar from big-endian hex.
    ///
    /// Parse failures carry no detail; the error is the undifferentiated
    /// [`Error::InvalidProof`].
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let value = parse_hex_2048(hex_str).map_err(|_| Error::InvalidProof)?;
        Ok(Self(value))
    }

    /// Renders the scalar as fixed-width big-endian hex.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }

    pub fn is_zero(&self) -> bool {
        bool::from(self.0.is_zero())
    }
}

/// Immutable description of the discrete-log group (p, q, g).
#[derive(Clone, Debug)]
pub struct GroupParams {
    p: U2048,
    q: U2048,
    g: U2048,
}

impl GroupParams {
    /// The standardized 2048-bit MODP safe-prime group with g = 2.
    pub fn modp_2048() -> Self {
        Self {
            p: MODP_2048_P,
            q: MODP_2048_Q,
            g: U2048::from_u8(2),
        }
    }

    /// Identifies the group in transcripts and logs.
    pub fn name(&self) -> &'static str {
        "MODP-2048"
    }

    pub fn p(&self) -> &U2048 {
        &self.p
    }

    pub fn q(&self) -> &U2048 {
        &self.q
    }

    pub fn generator(&self) -> GroupElement {
        GroupElement(self.g)
    }

    /// Checks an untrusted element: it must lie in [2, p-2] and in the
    /// order-q subgroup (`e^q mod p = 1`). Rejecting anything else blocks
    /// small-subgroup and invalid-element inputs before they reach a proof.
    pub fn validate_element(&self, element: &GroupElement) -> Result<()> {
        let two = U2048::from_u8(2);
        let p_minus_2 = self.p.wrapping_sub(&two);

        if element.0 < two || element.0 > p_minus_2 {
            return Err(Error::InvalidPublicKey(
                "element out of range [2, p-2]".to_string(),
            ));
        }

        let residue = mod_pow(&element.0, &self.q, &self.p)
            .unwrap_or_else(|_| unreachable!("MODP modulus p is odd and non-zero"));
        if !bool::from(residue.ct_eq(&U2048::ONE)) {
            return Err(Error::InvalidPublicKey(
                "element is not in the prime-order subgroup".to_string(),
            ));
        }

        Ok(())
    }

    /// Computes `base^exp mod p`.
    pub fn pow(&self, base: &GroupElement, exp: &Scalar) -> GroupElement {
        GroupElement(
            mod_pow(&base.0, &exp.0, &self.p)
                .unwrap_or_else(|_| unreachable!("MODP modulus p is odd and non-zero")),
        )
    }

    /// Computes `g^exp mod p`.
    pub fn pow_g(&self, exp: &Scalar) -> GroupElement {
        GroupElement(
            mod_pow(&self.g, &exp.0, &self.p)
                .unwrap_or_else(|_| unreachable!("MODP modulus p is odd and non-zero")),
        )
    }

    /// Computes `a * b mod p`.
    pub fn mul(&self, a: &GroupElement, b: &GroupElement) -> GroupElement {
        GroupElement(
            mod_mul(&a.0, &b.0, &self.p)
                .unwrap_or_else(|_| unreachable!("MODP modulus p is odd and non-zero")),
        )
    }

    /// Draws a uniform non-zero scalar in [1, q).
    pub fn random_scalar<R: CryptoRngCore>(&self, rng: &mut R) -> Scalar {
        let non_zero_q: Option<NonZero<U2048>> = NonZero::new(self.q).into();
        let non_zero_q = non_zero_q.unwrap_or_else(|| unreachable!("MODP q is non-zero"));

        loop {
            let value = U2048::random(rng);
            let reduced = value.rem(&non_zero_q);

            if !bool::from(reduced.is_zero()) {
                return Scalar(reduced);
            }
        }
    }

    /// Whether a response scalar is in the canonical range [0, q).
    pub fn scalar_is_canonical(&self, scalar: &Scalar) -> bool {
        scalar.0 < self.q
    }

    /// Computes `a + b mod q`. Both inputs must already be reduced.
    pub fn scalar_add(&self, a: &Scalar, b: &Scalar) -> Scalar {
        Scalar(a.0.add_mod(&b.0, &self.q))
    }

    /// Computes `a * b mod q`.
    pub fn scalar_mul(&self, a: &Scalar, b: &Scalar) -> Scalar {
        Scalar(
            mod_mul(&a.0, &b.0, &self.q)
                .unwrap_or_else(|_| unreachable!("MODP q is odd and non-zero")),
        )
    }
}

fn parse_hex_2048(hex_str: &str) -> core::result::Result<U2048, &'static str> {
    let trimmed = hex_str.trim();
    let trimmed = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    if trimmed.is_empty() {
        return Err("empty hex value");
    }

    // Reference clients emit `hex(n)` without padding, so odd lengths happen.
    let padded;
    let even = if trimmed.len() % 2 == 0 {
        trimmed
    } else {
        padded = format!("0{trimmed}");
        &padded
    };

    let bytes = hex::decode(even).map_err(|_| "invalid hex encoding")?;
    if bytes.len() > ELEMENT_BYTES {
        return Err("value exceeds 2048 bits");
    }

    let mut buf = [0u8; ELEMENT_BYTES];
    buf[ELEMENT_BYTES - bytes.len()..].copy_from_slice(&bytes);
    Ok(U2048::from_be_slice(&buf))
}

/// RFC 3526 group 14 prime.
const MODP_2048_P: U2048 = U2048::from_be_hex(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1\
     29024E088A67CC74020BBEA63B139B22514A08798E3404DD\
     EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245\
     E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED\
     EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3D\
     C2007CB8A163BF0598DA48361C55D39A69163FA8FD24CF5F\
     83655D23DCA3AD961C62F356208552BB9ED529077096966D\
     670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B\
     E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9\
     DE2BCBF6955817183995497CEA956AE515D2261898FA0510\
     15728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

/// q = (p - 1) / 2, itself prime because p is a safe prime.
const MODP_2048_Q: U2048 = U2048::from_be_hex(
    "7FFFFFFFFFFFFFFFE487ED5110B4611A62633145C06E0E68\
     948127044533E63A0105DF531D89CD9128A5043CC71A026E\
     F7CA8CD9E69D218D98158536F92F8A1BA7F09AB6B6A8E122\
     F242DABB312F3F637A262174D31BF6B585FFAE5B7A035BF6\
     F71C35FDAD44CFD2D74F9208BE258FF324943328F6722D9E\
     E1003E5C50B1DF82CC6D241B0E2AE9CD348B1FD47E9267AF\
     C1B2AE91EE51D6CB0E3179AB1042A95DCF6A9483B84B4B36\
     B3861AA7255E4C0278BA3604650C10BE19482F23171B671D\
     F1CF3B960C074301CD93C1D17603D147DAE2AEF837A62964\
     EF15E5FB4AAC0B8C1CCAA4BE754AB5728AE9130C4C7D0288\
     0AB9472D455655347FFFFFFFFFFFFFFF",
);

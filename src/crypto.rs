//! Seed handling and X25519 keypair derivation.
use rand::{rngs::OsRng, RngCore as _};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Size of a user seed in bytes.
pub const SEED_SIZE: usize = 32;

/// Size of an X25519 public key in bytes.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// A long-lived user seed from which the transaction encryption keypair is
/// derived.
///
/// Constructed once per client, either from caller input or from the OS
/// CSPRNG. The backing bytes are wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Seed([u8; SEED_SIZE]);

impl Seed {
    /// Generate a fresh seed from the OS CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SEED_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_SIZE] {
        &self.0
    }
}

impl From<[u8; SEED_SIZE]> for Seed {
    fn from(bytes: [u8; SEED_SIZE]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Seed {
    type Error = CryptoError;

    fn try_from(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SEED_SIZE] = bytes.try_into().map_err(|_| CryptoError::MalformedSeed)?;
        Ok(Self(bytes))
    }
}

/// An X25519 keypair deterministically derived from a [`Seed`].
///
/// The private scalar is clamped per RFC 7748; the public key is the
/// base-point multiple of the clamped scalar. Immutable for the client's
/// lifetime.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Derive the keypair for the given seed. Calling this twice with the
    /// same seed yields identical bytes.
    pub fn from_seed(seed: &Seed) -> Self {
        let secret = StaticSecret::from(*seed.as_bytes());
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// The public half as raw bytes.
    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// X25519 shared secret with the given public key.
    pub(crate) fn diffie_hellman(&self, their_public: &[u8; PUBLIC_KEY_SIZE]) -> [u8; 32] {
        self.secret
            .diffie_hellman(&PublicKey::from(*their_public))
            .to_bytes()
    }
}

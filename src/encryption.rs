//! Transaction encryption: per-transaction key derivation and the
//! encryption envelope.
//!
//! Every contract input is sealed with AES-SIV under a key derived from the
//! user's long-term X25519 keypair, the chain's consensus I/O exchange
//! public key and a fresh 32-byte nonce. The sealed bytes are framed as
//! `nonce(32) || user_pubkey(32) || ciphertext` so the chain (and later the
//! user, when browsing history) can re-derive the key.
use std::sync::Arc;

use aes_siv::{siv::Aes128Siv, KeyInit as _};
use base64::prelude::*;
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore as _};
use serde_json::Value;
use sha2::Sha256;
use tokio::sync::OnceCell;

use crate::{
    crypto::{KeyPair, Seed, PUBLIC_KEY_SIZE},
    error::{CryptoError, Error},
    transport::RestClient,
};

/// Size of the random nonce at the head of the envelope.
pub const NONCE_SIZE: usize = 32;

/// Length of the envelope prefix: nonce plus sender public key.
pub const ENVELOPE_PREFIX_SIZE: usize = NONCE_SIZE + PUBLIC_KEY_SIZE;

/// HKDF-SHA256 salt fixed by the chain. Must be used verbatim or derived
/// transaction keys will not match the enclave's.
pub const HKDF_SALT: [u8; 32] = [
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x4b, 0xea, 0xd8, 0xdf, 0x69,
    0x99, 0x08, 0x52, 0xc2, 0x02, 0xdb, 0x0e, 0x00, 0x97, 0xc1, 0xa1, 0x2e, 0xa6, 0x37, 0xd7,
    0xe9, 0x6d,
];

/// The associated-data list passed to AES-SIV contains exactly one element,
/// the empty byte string. The enclave seals with the same list; any other
/// shape fails authentication.
const EMPTY_AD: &[u8] = b"";

/// Crypto helper injected into the clients.
///
/// The concrete implementation is [`EncryptionUtils`]; a trait object is
/// used so callers can swap in their own key handling.
#[async_trait::async_trait]
pub trait SecretUtils: Send + Sync {
    /// The user's X25519 public key, as embedded in outbound envelopes.
    fn get_pubkey(&self) -> [u8; PUBLIC_KEY_SIZE];

    /// Seal `msg` for the contract with the given code hash and frame the
    /// result in the encryption envelope.
    async fn encrypt(&self, contract_code_hash: &str, msg: &Value) -> Result<Vec<u8>, Error>;

    /// Open a ciphertext sealed under the transaction key for `nonce`.
    async fn decrypt(&self, ciphertext: &[u8], nonce: &[u8; NONCE_SIZE])
        -> Result<Vec<u8>, Error>;
}

/// Split an envelope into nonce, sender public key and ciphertext.
pub fn split_envelope(
    envelope: &[u8],
) -> Result<([u8; NONCE_SIZE], [u8; PUBLIC_KEY_SIZE], &[u8]), Error> {
    if envelope.len() < ENVELOPE_PREFIX_SIZE {
        return Err(CryptoError::EnvelopeTooShort.into());
    }
    let nonce = envelope[..NONCE_SIZE]
        .try_into()
        .expect("prefix length checked");
    let pubkey = envelope[NONCE_SIZE..ENVELOPE_PREFIX_SIZE]
        .try_into()
        .expect("prefix length checked");
    Ok((nonce, pubkey, &envelope[ENVELOPE_PREFIX_SIZE..]))
}

/// Default [`SecretUtils`] implementation backed by the chain's
/// registration endpoint.
pub struct EncryptionUtils {
    transport: Arc<RestClient>,
    seed: Seed,
    keypair: KeyPair,
    io_pubkey: OnceCell<[u8; PUBLIC_KEY_SIZE]>,
}

impl EncryptionUtils {
    /// Create the helper, generating a fresh seed when none is given.
    pub fn new(transport: Arc<RestClient>, seed: Option<Seed>) -> Self {
        let seed = seed.unwrap_or_else(Seed::generate);
        let keypair = KeyPair::from_seed(&seed);
        Self {
            transport,
            seed,
            keypair,
            io_pubkey: OnceCell::new(),
        }
    }

    /// Create the helper with an already-known consensus I/O public key,
    /// skipping the registration query entirely.
    pub fn with_io_pubkey(
        transport: Arc<RestClient>,
        seed: Option<Seed>,
        io_pubkey: [u8; PUBLIC_KEY_SIZE],
    ) -> Self {
        let utils = Self::new(transport, seed);
        utils.io_pubkey.set(io_pubkey).expect("cell starts empty");
        utils
    }

    /// The seed backing this helper. Persist it to be able to decrypt
    /// historical transactions later.
    pub fn seed(&self) -> &Seed {
        &self.seed
    }

    /// The chain's X25519 I/O exchange public key, fetched once and cached
    /// for the client's lifetime. Concurrent callers share a single
    /// in-flight request.
    pub async fn consensus_io_pubkey(&self) -> Result<[u8; PUBLIC_KEY_SIZE], Error> {
        self.io_pubkey
            .get_or_try_init(|| async {
                let response = self.transport.get("/reg/consensus-io-exch-pubkey").await?;
                let encoded = response
                    .pointer("/result/ioExchPubkey")
                    .and_then(Value::as_str)
                    .ok_or_else(|| Error::Schema("missing result.ioExchPubkey".to_string()))?;
                let bytes = BASE64_STANDARD
                    .decode(encoded)
                    .map_err(|_| Error::Schema("ioExchPubkey is not base64".to_string()))?;
                let pubkey: [u8; PUBLIC_KEY_SIZE] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Crypto(CryptoError::MalformedPublicKey))?;
                Ok(pubkey)
            })
            .await
            .copied()
    }

    /// Derive the per-transaction AES-SIV key for `nonce`:
    /// `HKDF-SHA256(salt, X25519(user_priv, io_pubkey) || nonce)`.
    pub(crate) async fn tx_encryption_key(
        &self,
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<[u8; 32], Error> {
        let io_pubkey = self.consensus_io_pubkey().await?;
        let shared = self.keypair.diffie_hellman(&io_pubkey);

        let mut ikm = [0u8; 64];
        ikm[..32].copy_from_slice(&shared);
        ikm[32..].copy_from_slice(nonce);

        let hk = Hkdf::<Sha256>::new(Some(&HKDF_SALT), &ikm);
        let mut key = [0u8; 32];
        hk.expand(&[], &mut key)
            .map_err(|_| CryptoError::KeyDerivationFunctionFailure)?;
        Ok(key)
    }
}

#[async_trait::async_trait]
impl SecretUtils for EncryptionUtils {
    fn get_pubkey(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.keypair.public_bytes()
    }

    async fn encrypt(&self, contract_code_hash: &str, msg: &Value) -> Result<Vec<u8>, Error> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);
        let key = self.tx_encryption_key(&nonce).await?;

        // The plaintext is the contract's code hash followed by the compact
        // JSON encoding of the message.
        let mut plaintext = contract_code_hash.as_bytes().to_vec();
        plaintext.extend_from_slice(msg.to_string().as_bytes());

        let mut cipher =
            Aes128Siv::new_from_slice(&key).map_err(|_| CryptoError::MalformedKey)?;
        let ciphertext = cipher
            .encrypt([EMPTY_AD], &plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut envelope = Vec::with_capacity(ENVELOPE_PREFIX_SIZE + ciphertext.len());
        envelope.extend_from_slice(&nonce);
        envelope.extend_from_slice(&self.keypair.public_bytes());
        envelope.extend_from_slice(&ciphertext);
        Ok(envelope)
    }

    async fn decrypt(
        &self,
        ciphertext: &[u8],
        nonce: &[u8; NONCE_SIZE],
    ) -> Result<Vec<u8>, Error> {
        if ciphertext.is_empty() {
            return Ok(Vec::new());
        }
        let key = self.tx_encryption_key(nonce).await?;
        let mut cipher =
            Aes128Siv::new_from_slice(&key).map_err(|_| CryptoError::MalformedKey)?;
        cipher
            .decrypt([EMPTY_AD], ciphertext)
            .map_err(|_| Error::Crypto(CryptoError::DecryptionFailed))
    }
}

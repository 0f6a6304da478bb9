//! Client SDK for CosmWasm chains whose contract I/O is end-to-end
//! encrypted between the user and the chain's trusted-execution enclave.
//!
//! Contract inputs are sealed with AES-SIV under per-transaction keys
//! derived via X25519 + HKDF-SHA256 from a long-lived user seed and the
//! chain's published I/O exchange public key. The SDK injects the sealed
//! envelopes into outbound instantiate/execute/query calls and transparently
//! decrypts query results, transaction data, wasm log attributes and error
//! messages on the way back, including when browsing historical
//! transactions.
//!
//! Signing keys never enter the SDK; a [`signer::Signer`] is injected, and
//! the crypto helper itself is swappable through the
//! [`encryption::SecretUtils`] trait object.
#![deny(rust_2018_idioms, unreachable_pub)]
#![forbid(unsafe_code)]

pub mod client;
pub mod codehash;
pub mod crypto;
pub mod decrypt;
pub mod encryption;
pub mod error;
pub mod fee;
pub mod signer;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::{CosmWasmClient, ExecuteResult, InstantiateResult, SigningClient, UploadResult};
pub use crypto::{KeyPair, Seed};
pub use encryption::{EncryptionUtils, SecretUtils};
pub use error::{CryptoError, Error};
pub use fee::{FeeOverrides, FeeTable};
pub use signer::{OfflineSigner, SignResponse, Signer};
pub use transport::RestClient;
pub use types::BroadcastMode;

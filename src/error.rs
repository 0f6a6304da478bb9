//! Error types surfaced by the client.

/// Errors produced by cryptographic operations.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum CryptoError {
    #[error("malformed seed")]
    MalformedSeed,

    #[error("malformed consensus io public key")]
    MalformedPublicKey,

    #[error("encryption envelope shorter than 64 bytes")]
    EnvelopeTooShort,

    #[error("key derivation function failure")]
    KeyDerivationFunctionFailure,

    #[error("malformed encryption key")]
    MalformedKey,

    #[error("unable to encrypt message")]
    EncryptionFailed,

    #[error("unable to decrypt message or authenticate data")]
    DecryptionFailed,
}

/// Errors emitted by the client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The chain was unreachable or answered with something that is not a
    /// recognizable REST response.
    #[error("transport error: {0}")]
    Transport(String),

    /// A non-2xx response carrying the server's error message.
    ///
    /// The display form appends the HTTP status so that encrypted error
    /// fragments embedded in the body can be matched by the documented
    /// `(HTTP 500)` pattern.
    #[error("{body} (HTTP {status})")]
    Server { status: u16, body: String },

    /// The response parsed as JSON but did not have the expected structure.
    #[error("unexpected response from chain: {0}")]
    Schema(String),

    /// A cryptographic operation failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    /// A contract lookup came back empty.
    #[error("contract not found: {0}")]
    ContractNotFound(String),

    /// An embedded encrypted error fragment could not be decrypted; both the
    /// original error and the decryption failure are preserved.
    #[error("failed to decrypt error ({decrypt_error}); original error: {original}")]
    DecryptErrorWrapped {
        original: String,
        decrypt_error: String,
    },

    /// A signer error occured.
    #[error(transparent)]
    Signer(#[from] anyhow::Error),

    /// A broadcast transaction was rejected or reverted on chain.
    ///
    /// `raw_log` has already had any embedded encrypted fragment decrypted.
    #[error("transaction {txhash} failed (code {code}): {raw_log}")]
    TxFailed {
        txhash: String,
        code: u32,
        raw_log: String,
    },
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Transport(e.to_string())
    }
}

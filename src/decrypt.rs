//! Decryption of inbound chain responses.
//!
//! Two entry points: the post-send primitives (`decrypt_data`,
//! `decrypt_logs`, `decrypt_raw_log`) for responses whose nonce is still at
//! hand, and [`decrypt_txs_response`] for historical transactions, where the
//! nonce is recovered from the envelope embedded in the transaction itself.
use base64::prelude::*;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::{
    encryption::{split_envelope, SecretUtils, NONCE_SIZE},
    error::Error,
    types::{Log, Msg, TxsResponse},
};

/// Matches the encrypted fragment inside a failed execute/instantiate log.
pub(crate) static EXEC_ERROR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"contract failed: encrypted: (.+?): failed to execute message; message index: 0")
        .expect("static regex is valid")
});

/// Matches the encrypted fragment inside a failed smart-query error.
pub(crate) static QUERY_ERROR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"contract failed: encrypted: (.+?) \(HTTP 500\)").expect("static regex is valid")
});

/// Decrypt a transaction's hex `data` field.
///
/// The chain double-encodes: the sealed plaintext is itself a base64
/// string, so the opened bytes are decoded once more.
pub async fn decrypt_data(
    enigma: &dyn SecretUtils,
    data_hex: &str,
    nonce: &[u8; NONCE_SIZE],
) -> Result<Vec<u8>, Error> {
    let ciphertext =
        hex::decode(data_hex).map_err(|_| Error::Schema("tx data is not hex".to_string()))?;
    let opened = enigma.decrypt(&ciphertext, nonce).await?;
    let encoded = String::from_utf8(opened)
        .map_err(|_| Error::Schema("decrypted tx data is not UTF-8".to_string()))?;
    BASE64_STANDARD
        .decode(encoded.trim())
        .map_err(|_| Error::Schema("decrypted tx data is not base64".to_string()))
}

/// Best-effort decryption of wasm event attributes.
///
/// Each `key` and `value` is independently base64-decoded and opened; a
/// field that fails either step is left unchanged and never aborts the
/// walk.
pub async fn decrypt_logs(enigma: &dyn SecretUtils, logs: &mut [Log], nonce: &[u8; NONCE_SIZE]) {
    for log in logs.iter_mut() {
        for event in &mut log.events {
            if event.type_ != "wasm" {
                continue;
            }
            for attribute in &mut event.attributes {
                decrypt_attribute_field(enigma, &mut attribute.key, nonce).await;
                decrypt_attribute_field(enigma, &mut attribute.value, nonce).await;
            }
        }
    }
}

async fn decrypt_attribute_field(
    enigma: &dyn SecretUtils,
    field: &mut String,
    nonce: &[u8; NONCE_SIZE],
) {
    match open_base64_fragment(enigma, field, nonce).await {
        Ok(plaintext) => *field = plaintext,
        Err(err) => debug!(%err, "leaving undecodable log attribute unchanged"),
    }
}

/// Replace the encrypted fragment inside a failed-execution `raw_log`.
///
/// Logs without a recognizable fragment pass through unchanged; a fragment
/// that is present but cannot be opened is a hard failure carrying both
/// messages.
pub async fn decrypt_raw_log(
    enigma: &dyn SecretUtils,
    raw_log: &str,
    nonce: &[u8; NONCE_SIZE],
) -> Result<String, Error> {
    let captures = match EXEC_ERROR_RE.captures(raw_log) {
        Some(captures) => captures,
        None => return Ok(raw_log.to_string()),
    };
    let fragment = captures.get(1).expect("regex has one capture group");

    let plaintext = open_base64_fragment(enigma, fragment.as_str(), nonce)
        .await
        .map_err(|e| Error::DecryptErrorWrapped {
            original: raw_log.to_string(),
            decrypt_error: e.to_string(),
        })?;

    let mut out = String::with_capacity(raw_log.len());
    out.push_str(&raw_log[..fragment.start()]);
    out.push_str(&plaintext);
    out.push_str(&raw_log[fragment.end()..]);
    Ok(out)
}

/// Base64-decode, open and UTF-8 decode a single encrypted fragment.
pub(crate) async fn open_base64_fragment(
    enigma: &dyn SecretUtils,
    fragment: &str,
    nonce: &[u8; NONCE_SIZE],
) -> Result<String, Error> {
    let ciphertext = BASE64_STANDARD
        .decode(fragment)
        .map_err(|_| Error::Schema("encrypted fragment is not base64".to_string()))?;
    let plaintext = enigma.decrypt(&ciphertext, nonce).await?;
    String::from_utf8(plaintext)
        .map_err(|_| Error::Schema("decrypted fragment is not UTF-8".to_string()))
}

/// Decrypt a historical transaction in place.
///
/// Applies only to transactions whose single message is a wasm execute or
/// instantiate. The nonce and sender key are recovered from the embedded
/// envelope; envelopes sealed by another party leave the transaction
/// untouched.
pub async fn decrypt_txs_response(
    enigma: &dyn SecretUtils,
    tx: &mut TxsResponse,
) -> Result<(), Error> {
    if tx.tx.value.msg.len() != 1 {
        return Ok(());
    }

    let field = match &mut tx.tx.value.msg[0] {
        Msg::ExecuteContract(msg) => &mut msg.msg,
        Msg::InstantiateContract(msg) => &mut msg.init_msg,
        _ => return Ok(()),
    };
    let encoded = match field.as_str() {
        Some(encoded) => encoded,
        None => return Ok(()),
    };

    let envelope = BASE64_STANDARD
        .decode(encoded)
        .map_err(|_| Error::Schema("message envelope is not base64".to_string()))?;
    let (nonce, pubkey, ciphertext) = split_envelope(&envelope)?;
    if pubkey != enigma.get_pubkey() {
        return Ok(());
    }

    // Restore the original plaintext message, stripping the code-hash
    // prefix.
    let plaintext = enigma.decrypt(ciphertext, &nonce).await?;
    let text = String::from_utf8(plaintext)
        .map_err(|_| Error::Schema("decrypted message is not UTF-8".to_string()))?;
    if text.len() < 64 {
        return Err(Error::Schema(
            "decrypted message is shorter than its code-hash prefix".to_string(),
        ));
    }
    let payload: Value = serde_json::from_str(&text[64..])
        .map_err(|_| Error::Schema("decrypted message is not JSON".to_string()))?;
    *field = payload;

    if let Some(data) = &tx.data {
        let plain = decrypt_data(enigma, data, &nonce).await?;
        tx.data = Some(String::from_utf8(plain).map_err(|_| {
            Error::Schema("decrypted tx data is not UTF-8".to_string())
        })?);
    }
    if let Some(logs) = &mut tx.logs {
        decrypt_logs(enigma, logs, &nonce).await;
    }
    tx.raw_log = decrypt_raw_log(enigma, &tx.raw_log, &nonce).await?;

    Ok(())
}

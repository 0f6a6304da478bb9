//! Cache of contract code hashes.
//!
//! Every plaintext sent to a contract is prefixed by the contract's code
//! hash, so the hash is needed for each instantiate, execute and query.
//! Code hashes are immutable on chain; entries are added and never
//! invalidated.
use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tokio::sync::Mutex;

use crate::{error::Error, transport::RestClient};

pub struct CodeHashCache {
    transport: Arc<RestClient>,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    by_code_id: HashMap<u64, String>,
    by_contract: HashMap<String, String>,
}

impl CodeHashCache {
    pub fn new(transport: Arc<RestClient>) -> Self {
        Self {
            transport,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Code hash for a numeric code id, as lowercase hex.
    pub async fn by_code_id(&self, code_id: u64) -> Result<String, Error> {
        let mut inner = self.inner.lock().await;
        if let Some(hash) = inner.by_code_id.get(&code_id) {
            return Ok(hash.clone());
        }

        let response = self
            .transport
            .get(&format!("/wasm/code/{code_id}/hash"))
            .await?;
        let hash = normalize(
            extract_hash(&response)
                .ok_or_else(|| Error::Schema(format!("missing code hash for code id {code_id}")))?,
        )?;
        inner.by_code_id.insert(code_id, hash.clone());
        Ok(hash)
    }

    /// Code hash for a contract address, as lowercase hex.
    pub async fn by_contract(&self, address: &str) -> Result<String, Error> {
        let mut inner = self.inner.lock().await;
        if let Some(hash) = inner.by_contract.get(address) {
            return Ok(hash.clone());
        }

        let response = self
            .transport
            .get(&format!("/wasm/contract/{address}/code-hash"))
            .await
            .map_err(|e| match e {
                Error::Server { ref body, .. } if body.starts_with("not found: contract") => {
                    Error::ContractNotFound(address.to_string())
                }
                other => other,
            })?;
        let hash = normalize(
            extract_hash(&response).ok_or_else(|| Error::ContractNotFound(address.to_string()))?,
        )?;
        inner.by_contract.insert(address.to_string(), hash.clone());
        Ok(hash)
    }
}

/// The LCD either returns the hash as a bare JSON string or wrapped in a
/// `result` field.
fn extract_hash(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => map.get("result").and_then(Value::as_str),
        _ => None,
    }
}

fn normalize(hash: &str) -> Result<String, Error> {
    let hash = hash.trim().trim_start_matches("0x").to_lowercase();
    if hash.len() != 64 || !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(Error::Schema(format!("malformed code hash {hash:?}")));
    }
    Ok(hash)
}

//! Chain clients: read-only queries and the signing client.
use std::sync::Arc;

use base64::prelude::*;
use serde_json::Value;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::{
    codehash::CodeHashCache,
    decrypt,
    encryption::{split_envelope, SecretUtils, NONCE_SIZE},
    error::Error,
    fee::{FeeOverrides, FeeTable},
    signer::Signer,
    transport::RestClient,
    types::{
        as_u64, first_attribute_value, AccountNonce, BroadcastMode, Coin, Log, Msg,
        MsgExecuteContract, MsgInstantiateContract, MsgSend, MsgStoreCode, PostTxResponse, StdFee,
        StdSignDoc, StdTx, TxsResponse,
    },
};

/// Read-only client for a CosmWasm chain with encrypted contract I/O.
pub struct CosmWasmClient {
    transport: Arc<RestClient>,
    enigma: Arc<dyn SecretUtils>,
    code_hashes: CodeHashCache,
    chain_id: OnceCell<String>,
}

impl CosmWasmClient {
    /// Create a client over the given transport, with the crypto helper
    /// injected as a trait object.
    pub fn new(transport: Arc<RestClient>, enigma: Arc<dyn SecretUtils>) -> Self {
        Self {
            code_hashes: CodeHashCache::new(transport.clone()),
            transport,
            enigma,
            chain_id: OnceCell::new(),
        }
    }

    /// The chain id, fetched once from `/node_info` and cached.
    pub async fn chain_id(&self) -> Result<String, Error> {
        self.chain_id
            .get_or_try_init(|| async {
                let response = self.transport.get("/node_info").await?;
                response
                    .pointer("/node_info/network")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| Error::Schema("missing node_info.network".to_string()))
            })
            .await
            .cloned()
    }

    /// Account number and sequence for an address, as needed for sign
    /// bytes.
    pub async fn get_nonce(&self, address: &str) -> Result<AccountNonce, Error> {
        let response = self
            .transport
            .get(&format!("/auth/accounts/{address}"))
            .await?;
        let value = response
            .pointer("/result/value")
            .ok_or_else(|| Error::Schema("missing result.value in account response".to_string()))?;
        let exists = value
            .get("address")
            .and_then(Value::as_str)
            .is_some_and(|a| !a.is_empty());
        if !exists {
            return Err(Error::Schema(format!(
                "account {address} does not exist on chain; send it funds first"
            )));
        }
        let account_number = value
            .get("account_number")
            .and_then(as_u64)
            .ok_or_else(|| Error::Schema("missing account_number".to_string()))?;
        let sequence = value.get("sequence").and_then(as_u64).unwrap_or(0);
        Ok(AccountNonce {
            account_number,
            sequence,
        })
    }

    /// Raw account object, or `None` when the chain does not know the
    /// address.
    pub async fn get_account(&self, address: &str) -> Result<Option<Value>, Error> {
        let response = self
            .transport
            .get(&format!("/auth/accounts/{address}"))
            .await?;
        let value = response
            .pointer("/result/value")
            .cloned()
            .unwrap_or(Value::Null);
        let exists = value
            .get("address")
            .and_then(Value::as_str)
            .is_some_and(|a| !a.is_empty());
        Ok(exists.then_some(value))
    }

    /// Block at the given height, or the latest one.
    pub async fn get_block(&self, height: Option<u64>) -> Result<Value, Error> {
        let path = match height {
            Some(height) => format!("/blocks/{height}"),
            None => "/blocks/latest".to_string(),
        };
        self.transport.get(&path).await
    }

    /// A transaction by hash, decrypted where it is ours; `None` when the
    /// chain does not know it.
    pub async fn get_tx(&self, hash: &str) -> Result<Option<TxsResponse>, Error> {
        let response = match self.transport.get(&format!("/txs/{hash}")).await {
            Ok(response) => response,
            Err(Error::Server { status: 404, .. }) => return Ok(None),
            Err(e) => return Err(e),
        };
        let mut tx: TxsResponse = serde_json::from_value(response)
            .map_err(|e| Error::Schema(format!("tx response: {e}")))?;
        decrypt::decrypt_txs_response(self.enigma.as_ref(), &mut tx).await?;
        Ok(Some(tx))
    }

    /// Search transactions; `query` is the raw LCD query string, e.g.
    /// `message.contract_address=secret1...`. Our own transactions come
    /// back decrypted.
    pub async fn search_tx(&self, query: &str) -> Result<Vec<TxsResponse>, Error> {
        let response = self.transport.get(&format!("/txs?{query}")).await?;
        let txs = response
            .get("txs")
            .cloned()
            .ok_or_else(|| Error::Schema("missing txs in search response".to_string()))?;
        let mut txs: Vec<TxsResponse> = serde_json::from_value(txs)
            .map_err(|e| Error::Schema(format!("tx search response: {e}")))?;
        for tx in &mut txs {
            decrypt::decrypt_txs_response(self.enigma.as_ref(), tx).await?;
        }
        Ok(txs)
    }

    pub async fn get_code_hash_by_code_id(&self, code_id: u64) -> Result<String, Error> {
        self.code_hashes.by_code_id(code_id).await
    }

    pub async fn get_code_hash_by_contract(&self, address: &str) -> Result<String, Error> {
        self.code_hashes.by_contract(address).await
    }

    /// The chain's master registration certificates, passed through
    /// unvalidated.
    pub async fn get_master_certs(&self) -> Result<Value, Error> {
        self.transport.get("/register/master-cert").await
    }

    /// Encrypted smart query against a contract.
    pub async fn query_contract_smart(
        &self,
        contract: &str,
        query: &Value,
    ) -> Result<Value, Error> {
        let code_hash = self.code_hashes.by_contract(contract).await?;
        let envelope = self.enigma.encrypt(&code_hash, query).await?;
        let (nonce, _, _) = split_envelope(&envelope)?;

        // The query path carries the envelope base64-encoded, with the
        // resulting ASCII string hex-encoded.
        let encoded = hex::encode(BASE64_STANDARD.encode(&envelope));
        let path = format!("/wasm/contract/{contract}/query/{encoded}");
        debug!(contract, "smart query");

        let response = match self.transport.get(&path).await {
            Ok(response) => response,
            Err(err) => return Err(self.decrypt_query_error(err, &nonce).await),
        };

        let smart = response
            .pointer("/result/smart")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Schema("missing result.smart".to_string()))?;

        // The chain wraps smart-query results in a second base64 layer, so
        // the opened plaintext is itself base64.
        let ciphertext = BASE64_STANDARD
            .decode(smart)
            .map_err(|_| Error::Schema("smart query result is not base64".to_string()))?;
        let opened = self.enigma.decrypt(&ciphertext, &nonce).await?;
        let once = String::from_utf8(opened)
            .map_err(|_| Error::Schema("decrypted smart query result is not UTF-8".to_string()))?;
        let payload = BASE64_STANDARD
            .decode(once.trim())
            .map_err(|_| Error::Schema("decrypted smart query result is not base64".to_string()))?;
        let text = String::from_utf8(payload)
            .map_err(|_| Error::Schema("smart query payload is not UTF-8".to_string()))?;
        serde_json::from_str(&text)
            .map_err(|_| Error::Schema("smart query payload is not JSON".to_string()))
    }

    /// Rewrite an encrypted fragment inside a smart-query error, keeping
    /// the error untouched when no fragment is present.
    async fn decrypt_query_error(&self, err: Error, nonce: &[u8; NONCE_SIZE]) -> Error {
        let message = err.to_string();
        let captures = match decrypt::QUERY_ERROR_RE.captures(&message) {
            Some(captures) => captures,
            None => return err,
        };
        let fragment = captures
            .get(1)
            .expect("regex has one capture group")
            .as_str();

        match decrypt::open_base64_fragment(self.enigma.as_ref(), fragment, nonce).await {
            Ok(plaintext) => match err {
                Error::Server { status, body } => Error::Server {
                    status,
                    body: body.replacen(fragment, &plaintext, 1),
                },
                other => other,
            },
            Err(decrypt_error) => Error::DecryptErrorWrapped {
                original: message,
                decrypt_error: decrypt_error.to_string(),
            },
        }
    }
}

/// Result of uploading contract code.
#[derive(Clone, Debug)]
pub struct UploadResult {
    pub code_id: u64,
    pub transaction_hash: String,
    pub logs: Vec<Log>,
    pub data: Option<String>,
}

/// Result of instantiating a contract.
#[derive(Clone, Debug)]
pub struct InstantiateResult {
    pub contract_address: String,
    pub transaction_hash: String,
    pub logs: Vec<Log>,
    /// The envelope nonce, needed to decrypt this transaction later.
    pub nonce: [u8; NONCE_SIZE],
}

/// Result of executing a contract.
#[derive(Clone, Debug)]
pub struct ExecuteResult {
    /// Decrypted and decoded result data.
    pub data: Vec<u8>,
    pub transaction_hash: String,
    pub logs: Vec<Log>,
    /// The envelope nonce, needed to decrypt this transaction later.
    pub nonce: [u8; NONCE_SIZE],
}

/// A client that can also sign and broadcast transactions.
///
/// Derefs to [`CosmWasmClient`] for the read-only surface.
pub struct SigningClient {
    client: CosmWasmClient,
    transport: Arc<RestClient>,
    enigma: Arc<dyn SecretUtils>,
    sender: String,
    signer: Signer,
    fees: FeeTable,
    broadcast_mode: BroadcastMode,
}

impl std::ops::Deref for SigningClient {
    type Target = CosmWasmClient;

    fn deref(&self) -> &CosmWasmClient {
        &self.client
    }
}

impl SigningClient {
    pub fn new(
        transport: Arc<RestClient>,
        sender: impl Into<String>,
        signer: Signer,
        enigma: Arc<dyn SecretUtils>,
        fees: Option<FeeOverrides>,
        broadcast_mode: BroadcastMode,
    ) -> Self {
        let client = CosmWasmClient::new(transport.clone(), enigma.clone());
        Self {
            client,
            transport,
            enigma,
            sender: sender.into(),
            signer,
            fees: fees.map(FeeTable::with_overrides).unwrap_or_default(),
            broadcast_mode,
        }
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Upload WASM bytecode and return the assigned code id.
    pub async fn upload(
        &self,
        wasm: &[u8],
        source: &str,
        builder: &str,
        memo: &str,
    ) -> Result<UploadResult, Error> {
        let msg = Msg::StoreCode(MsgStoreCode {
            builder: builder.to_string(),
            sender: self.sender.clone(),
            source: source.to_string(),
            wasm_byte_code: BASE64_STANDARD.encode(wasm),
        });

        let result = self
            .broadcast(vec![msg], self.fees.upload.clone(), memo, None)
            .await?;
        let logs = result.logs.unwrap_or_default();
        let code_id = first_attribute_value(&logs, "message", "code_id")
            .and_then(|value| value.parse().ok())
            .ok_or_else(|| Error::Schema("missing code_id in upload logs".to_string()))?;
        info!(code_id, "uploaded contract code");
        Ok(UploadResult {
            code_id,
            transaction_hash: result.txhash,
            logs,
            data: result.data,
        })
    }

    /// Instantiate a contract with an encrypted init message.
    pub async fn instantiate(
        &self,
        code_id: u64,
        init_msg: &Value,
        label: &str,
        memo: &str,
        transfer: &[Coin],
    ) -> Result<InstantiateResult, Error> {
        let code_hash = self.client.get_code_hash_by_code_id(code_id).await?;
        let envelope = self.enigma.encrypt(&code_hash, init_msg).await?;
        // The nonce must be fixed before sign bytes are built; it is the
        // only way to decrypt the mined transaction's output.
        let (nonce, _, _) = split_envelope(&envelope)?;

        let msg = Msg::InstantiateContract(MsgInstantiateContract {
            callback_code_hash: String::new(),
            callback_sig: None,
            code_id: code_id.to_string(),
            init_funds: transfer.to_vec(),
            init_msg: Value::String(BASE64_STANDARD.encode(&envelope)),
            label: label.to_string(),
            sender: self.sender.clone(),
        });

        let result = self
            .broadcast(vec![msg], self.fees.init.clone(), memo, Some(nonce))
            .await?;
        let mut logs = result.logs.unwrap_or_default();
        decrypt::decrypt_logs(self.enigma.as_ref(), &mut logs, &nonce).await;
        let contract_address = first_attribute_value(&logs, "message", "contract_address")
            .map(str::to_string)
            .ok_or_else(|| {
                Error::Schema("missing contract_address in instantiate logs".to_string())
            })?;
        info!(%contract_address, label, "instantiated contract");
        Ok(InstantiateResult {
            contract_address,
            transaction_hash: result.txhash,
            logs,
            nonce,
        })
    }

    /// Execute a contract with an encrypted message.
    pub async fn execute(
        &self,
        contract: &str,
        msg: &Value,
        memo: &str,
        transfer: &[Coin],
    ) -> Result<ExecuteResult, Error> {
        let code_hash = self.client.get_code_hash_by_contract(contract).await?;
        let envelope = self.enigma.encrypt(&code_hash, msg).await?;
        let (nonce, _, _) = split_envelope(&envelope)?;

        let wire_msg = Msg::ExecuteContract(MsgExecuteContract {
            callback_code_hash: String::new(),
            callback_sig: None,
            contract: contract.to_string(),
            msg: Value::String(BASE64_STANDARD.encode(&envelope)),
            sender: self.sender.clone(),
            sent_funds: transfer.to_vec(),
        });

        let result = self
            .broadcast(vec![wire_msg], self.fees.exec.clone(), memo, Some(nonce))
            .await?;

        let data = match &result.data {
            Some(data_hex) => {
                decrypt::decrypt_data(self.enigma.as_ref(), data_hex, &nonce).await?
            }
            None => Vec::new(),
        };
        let mut logs = result.logs.unwrap_or_default();
        decrypt::decrypt_logs(self.enigma.as_ref(), &mut logs, &nonce).await;
        Ok(ExecuteResult {
            data,
            transaction_hash: result.txhash,
            logs,
            nonce,
        })
    }

    /// Plain bank send.
    pub async fn send_tokens(
        &self,
        recipient: &str,
        amount: &[Coin],
        memo: &str,
    ) -> Result<PostTxResponse, Error> {
        let msg = Msg::Send(MsgSend {
            amount: amount.to_vec(),
            from_address: self.sender.clone(),
            to_address: recipient.to_string(),
        });
        self.sign_and_broadcast(vec![msg], self.fees.send.clone(), memo)
            .await
    }

    /// Sign the given messages and broadcast them.
    pub async fn sign_and_broadcast(
        &self,
        msgs: Vec<Msg>,
        fee: StdFee,
        memo: &str,
    ) -> Result<PostTxResponse, Error> {
        self.broadcast(msgs, fee, memo, None).await
    }

    async fn broadcast(
        &self,
        msgs: Vec<Msg>,
        fee: StdFee,
        memo: &str,
        nonce: Option<[u8; NONCE_SIZE]>,
    ) -> Result<PostTxResponse, Error> {
        let chain_id = self.client.chain_id().await?;
        let account = self.client.get_nonce(&self.sender).await?;

        let doc = StdSignDoc {
            account_number: account.account_number.to_string(),
            chain_id,
            fee,
            memo: memo.to_string(),
            msgs,
            sequence: account.sequence.to_string(),
        };
        let response = self.signer.sign(doc).await?;
        let tx = StdTx {
            fee: response.signed.fee,
            memo: response.signed.memo,
            msg: response.signed.msgs,
            signatures: vec![response.signature],
        };

        let result = self.transport.post_tx(&tx, self.broadcast_mode).await?;
        let code = result.code.unwrap_or(0);
        if code != 0 {
            // Surface a human-readable error: an encrypted fragment in the
            // log is decrypted with the envelope nonce before returning.
            let mut raw_log = result.raw_log.clone().unwrap_or_default();
            if let Some(nonce) = &nonce {
                raw_log = decrypt::decrypt_raw_log(self.enigma.as_ref(), &raw_log, nonce).await?;
            }
            info!(txhash = %result.txhash, code, "transaction failed");
            return Err(Error::TxFailed {
                txhash: result.txhash,
                code,
                raw_log,
            });
        }
        Ok(result)
    }
}

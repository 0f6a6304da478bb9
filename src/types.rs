//! Wire types for the amino JSON REST interface.
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single coin amount.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub amount: String,
    pub denom: String,
}

impl Coin {
    pub fn new(amount: u128, denom: &str) -> Self {
        Self {
            amount: amount.to_string(),
            denom: denom.to_string(),
        }
    }
}

/// Transaction fee and gas limit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<Coin>,
    pub gas: String,
}

impl StdFee {
    pub fn new(amount: u128, gas: u64, denom: &str) -> Self {
        Self {
            amount: vec![Coin::new(amount, denom)],
            gas: gas.to_string(),
        }
    }
}

/// Amino-encoded public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PubKey {
    #[serde(rename = "type")]
    pub type_: String,
    /// Base64 of the compressed key bytes.
    pub value: String,
}

/// A single signature over the sign bytes of a [`StdSignDoc`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdSignature {
    pub pub_key: PubKey,
    /// Base64 of the raw 64-byte signature.
    pub signature: String,
}

/// Bank send message body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MsgSend {
    pub amount: Vec<Coin>,
    pub from_address: String,
    pub to_address: String,
}

/// Contract code upload message body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MsgStoreCode {
    pub builder: String,
    pub sender: String,
    pub source: String,
    /// Base64 of the WASM bytecode.
    pub wasm_byte_code: String,
}

/// Contract instantiation message body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MsgInstantiateContract {
    /// Always empty when originating from the user.
    pub callback_code_hash: String,
    /// Always null when originating from the user.
    pub callback_sig: Option<Value>,
    pub code_id: String,
    pub init_funds: Vec<Coin>,
    /// Base64 encryption envelope on the wire; replaced by the plaintext
    /// JSON object when a historical transaction is decrypted.
    pub init_msg: Value,
    pub label: String,
    pub sender: String,
}

/// Contract execution message body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MsgExecuteContract {
    /// Always empty when originating from the user.
    pub callback_code_hash: String,
    /// Always null when originating from the user.
    pub callback_sig: Option<Value>,
    pub contract: String,
    /// Base64 encryption envelope on the wire; replaced by the plaintext
    /// JSON object when a historical transaction is decrypted.
    pub msg: Value,
    pub sender: String,
    pub sent_funds: Vec<Coin>,
}

/// Transaction messages, discriminated by the amino `type` tag.
///
/// Kinds this client does not interpret are kept verbatim in `Other`, so
/// foreign transactions survive a decode/encode round trip unchanged.
#[derive(Clone, Debug)]
pub enum Msg {
    Send(MsgSend),
    StoreCode(MsgStoreCode),
    InstantiateContract(MsgInstantiateContract),
    ExecuteContract(MsgExecuteContract),
    Other(Value),
}

const MSG_SEND: &str = "cosmos-sdk/MsgSend";
const MSG_STORE_CODE: &str = "wasm/MsgStoreCode";
const MSG_INSTANTIATE: &str = "wasm/MsgInstantiateContract";
const MSG_EXECUTE: &str = "wasm/MsgExecuteContract";

impl Serialize for Msg {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        fn tagged<S: serde::Serializer, T: Serialize>(
            serializer: S,
            tag: &'static str,
            value: &T,
        ) -> Result<S::Ok, S::Error> {
            use serde::ser::SerializeStruct as _;
            let mut s = serializer.serialize_struct("Msg", 2)?;
            s.serialize_field("type", tag)?;
            s.serialize_field("value", value)?;
            s.end()
        }

        match self {
            Msg::Send(msg) => tagged(serializer, MSG_SEND, msg),
            Msg::StoreCode(msg) => tagged(serializer, MSG_STORE_CODE, msg),
            Msg::InstantiateContract(msg) => tagged(serializer, MSG_INSTANTIATE, msg),
            Msg::ExecuteContract(msg) => tagged(serializer, MSG_EXECUTE, msg),
            Msg::Other(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Msg {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;

        let raw = Value::deserialize(deserializer)?;
        let tag = raw
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string);
        let body = raw.get("value").cloned().unwrap_or(Value::Null);
        let msg = match tag.as_deref() {
            Some(MSG_SEND) => Msg::Send(serde_json::from_value(body).map_err(D::Error::custom)?),
            Some(MSG_STORE_CODE) => {
                Msg::StoreCode(serde_json::from_value(body).map_err(D::Error::custom)?)
            }
            Some(MSG_INSTANTIATE) => {
                Msg::InstantiateContract(serde_json::from_value(body).map_err(D::Error::custom)?)
            }
            Some(MSG_EXECUTE) => {
                Msg::ExecuteContract(serde_json::from_value(body).map_err(D::Error::custom)?)
            }
            _ => Msg::Other(raw),
        };
        Ok(msg)
    }
}

/// The amino transaction envelope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StdTx {
    pub fee: StdFee,
    pub memo: String,
    pub msg: Vec<Msg>,
    pub signatures: Vec<StdSignature>,
}

/// A [`StdTx`] wrapped in its amino `type`/`value` envelope, as returned by
/// the transaction query endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WrappedStdTx {
    #[serde(rename = "type")]
    pub type_: String,
    pub value: StdTx,
}

/// The document covered by a transaction signature.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StdSignDoc {
    pub account_number: String,
    pub chain_id: String,
    pub fee: StdFee,
    pub memo: String,
    pub msgs: Vec<Msg>,
    pub sequence: String,
}

impl StdSignDoc {
    /// Canonical sign bytes.
    ///
    /// Amino requires every JSON object to have lexicographically sorted
    /// keys; round-tripping through `serde_json::Value` sorts all nested
    /// maps regardless of struct field order.
    pub fn sign_bytes(&self) -> Vec<u8> {
        let value = serde_json::to_value(self).expect("sign doc is always serializable");
        value.to_string().into_bytes()
    }
}

/// How long a broadcast waits before returning.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BroadcastMode {
    /// Wait for the transaction to be committed in a block.
    #[default]
    Block,
    /// Wait for the CheckTx result only.
    Sync,
    /// Return immediately.
    Async,
}

/// A single event attribute.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub key: String,
    pub value: String,
}

/// A log event emitted during execution. Contract output appears in events
/// with type `wasm`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub type_: String,
    pub attributes: Vec<Attribute>,
}

/// Per-message execution log.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Log {
    #[serde(default)]
    pub msg_index: Option<u64>,
    #[serde(default)]
    pub log: Option<String>,
    #[serde(default)]
    pub events: Vec<Event>,
}

/// Find the first attribute with the given key inside events of the given
/// type, across all logs.
pub fn first_attribute_value<'a>(
    logs: &'a [Log],
    event_type: &str,
    key: &str,
) -> Option<&'a str> {
    logs.iter()
        .flat_map(|log| &log.events)
        .filter(|event| event.type_ == event_type)
        .flat_map(|event| &event.attributes)
        .find(|attr| attr.key == key)
        .map(|attr| attr.value.as_str())
}

/// A transaction as returned by the `/txs` search endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TxsResponse {
    pub height: String,
    pub txhash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    #[serde(default)]
    pub raw_log: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logs: Option<Vec<Log>>,
    /// Hex-encoded result data; rewritten to the decoded plaintext when the
    /// transaction is decrypted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
    pub tx: WrappedStdTx,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Result of broadcasting a transaction.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PostTxResponse {
    pub txhash: String,
    #[serde(default)]
    pub height: Option<String>,
    #[serde(default)]
    pub code: Option<u32>,
    #[serde(default)]
    pub raw_log: Option<String>,
    #[serde(default)]
    pub logs: Option<Vec<Log>>,
    #[serde(default)]
    pub data: Option<String>,
}

/// Account number and sequence needed to build sign bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccountNonce {
    pub account_number: u64,
    pub sequence: u64,
}

/// The LCD encodes some integers as JSON strings and some as numbers,
/// depending on the endpoint version.
pub(crate) fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn msg_tag_round_trip() {
        let msg = Msg::ExecuteContract(MsgExecuteContract {
            callback_code_hash: String::new(),
            callback_sig: None,
            contract: "secret1l92u46n0d33mhkknwm7zpg0twlqqxg826990re".to_string(),
            msg: Value::String("AAAA".to_string()),
            sender: "secret1h9qkg7rqf9cmvlmm87r3z2mhsvzvphmjqkwlqv".to_string(),
            sent_funds: vec![],
        });

        let encoded = serde_json::to_value(&msg).unwrap();
        assert_eq!(encoded["type"], "wasm/MsgExecuteContract");
        assert_eq!(encoded["value"]["callback_code_hash"], "");
        assert_eq!(encoded["value"]["callback_sig"], Value::Null);

        let decoded: Msg = serde_json::from_value(encoded).unwrap();
        assert!(matches!(decoded, Msg::ExecuteContract(_)));
    }

    #[test]
    fn unknown_msg_kept_verbatim() {
        let raw = serde_json::json!({
            "type": "cosmos-sdk/MsgDelegate",
            "value": {"delegator_address": "secret1...", "amount": {"denom": "ucosm", "amount": "1"}},
        });
        let decoded: Msg = serde_json::from_value(raw.clone()).unwrap();
        match &decoded {
            Msg::Other(value) => assert_eq!(value, &raw),
            other => panic!("expected Other, got {other:?}"),
        }
        assert_eq!(serde_json::to_value(&decoded).unwrap(), raw);
    }

    #[test]
    fn sign_bytes_sorted_keys() {
        let doc = StdSignDoc {
            account_number: "7".to_string(),
            chain_id: "testing".to_string(),
            fee: StdFee::new(5000, 200_000, "ucosm"),
            memo: String::new(),
            msgs: vec![Msg::Send(MsgSend {
                amount: vec![Coin::new(1, "ucosm")],
                from_address: "a".to_string(),
                to_address: "b".to_string(),
            })],
            sequence: "3".to_string(),
        };
        let bytes = String::from_utf8(doc.sign_bytes()).unwrap();
        assert!(bytes.starts_with(r#"{"account_number":"7","chain_id":"testing""#));
        // Nested coin objects are sorted too.
        assert!(bytes.contains(r#"{"amount":"1","denom":"ucosm"}"#));
    }

    #[test]
    fn broadcast_mode_wire_names() {
        assert_eq!(
            serde_json::to_string(&BroadcastMode::Block).unwrap(),
            r#""block""#
        );
        assert_eq!(
            serde_json::to_string(&BroadcastMode::Sync).unwrap(),
            r#""sync""#
        );
        assert_eq!(
            serde_json::to_string(&BroadcastMode::Async).unwrap(),
            r#""async""#
        );
        assert_eq!(BroadcastMode::default(), BroadcastMode::Block);
    }

    #[test]
    fn attribute_lookup() {
        let logs = vec![Log {
            msg_index: Some(0),
            log: None,
            events: vec![
                Event {
                    type_: "message".to_string(),
                    attributes: vec![Attribute {
                        key: "code_id".to_string(),
                        value: "4".to_string(),
                    }],
                },
                Event {
                    type_: "wasm".to_string(),
                    attributes: vec![],
                },
            ],
        }];
        assert_eq!(first_attribute_value(&logs, "message", "code_id"), Some("4"));
        assert_eq!(first_attribute_value(&logs, "message", "missing"), None);
        assert_eq!(first_attribute_value(&logs, "wasm", "code_id"), None);
    }

    #[test]
    fn lcd_integer_forms() {
        assert_eq!(as_u64(&serde_json::json!("42")), Some(42));
        assert_eq!(as_u64(&serde_json::json!(42)), Some(42));
        assert_eq!(as_u64(&serde_json::json!(null)), None);
    }
}

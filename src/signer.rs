//! Transaction signing interfaces.
//!
//! The client never holds signing keys; a [`Signer`] is injected and only
//! sees sign docs or their canonical bytes.
use async_trait::async_trait;

use crate::{
    error::Error,
    types::{StdSignDoc, StdSignature},
};

/// Outcome of signing: the document that was actually signed (an offline
/// signer may amend fee or memo) plus the signature over it.
#[derive(Clone, Debug)]
pub struct SignResponse {
    pub signed: StdSignDoc,
    pub signature: StdSignature,
}

/// A signer that is handed the full sign doc.
#[async_trait]
pub trait OfflineSigner: Send + Sync {
    async fn sign(&self, sign_doc: StdSignDoc) -> anyhow::Result<SignResponse>;
}

/// How transactions get signed.
pub enum Signer {
    /// Raw callback over the canonical sign bytes.
    Callback(Box<dyn Fn(&[u8]) -> anyhow::Result<StdSignature> + Send + Sync>),

    /// A signer that sees and may amend the whole document.
    Offline(Box<dyn OfflineSigner>),
}

impl Signer {
    pub(crate) async fn sign(&self, doc: StdSignDoc) -> Result<SignResponse, Error> {
        match self {
            Signer::Callback(callback) => {
                let signature = callback(&doc.sign_bytes())?;
                Ok(SignResponse {
                    signed: doc,
                    signature,
                })
            }
            Signer::Offline(signer) => Ok(signer.sign(doc).await?),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{PubKey, StdFee};

    fn dummy_signature(payload: &str) -> StdSignature {
        StdSignature {
            pub_key: PubKey {
                type_: "tendermint/PubKeySecp256k1".to_string(),
                value: "AAAA".to_string(),
            },
            signature: payload.to_string(),
        }
    }

    fn sign_doc() -> StdSignDoc {
        StdSignDoc {
            account_number: "1".to_string(),
            chain_id: "testing".to_string(),
            fee: StdFee::new(5000, 200_000, "ucosm"),
            memo: "hi".to_string(),
            msgs: vec![],
            sequence: "0".to_string(),
        }
    }

    #[tokio::test]
    async fn callback_signs_canonical_bytes() {
        let signer = Signer::Callback(Box::new(|bytes: &[u8]| {
            Ok(dummy_signature(&format!("len:{}", bytes.len())))
        }));
        let doc = sign_doc();
        let expected = format!("len:{}", doc.sign_bytes().len());

        let response = signer.sign(doc.clone()).await.unwrap();
        assert_eq!(response.signature.signature, expected);
        assert_eq!(response.signed.memo, doc.memo);
    }

    struct AmendingSigner;

    #[async_trait]
    impl OfflineSigner for AmendingSigner {
        async fn sign(&self, mut sign_doc: StdSignDoc) -> anyhow::Result<SignResponse> {
            sign_doc.memo = "amended".to_string();
            Ok(SignResponse {
                signed: sign_doc,
                signature: dummy_signature("sig"),
            })
        }
    }

    #[tokio::test]
    async fn offline_signer_may_amend_doc() {
        let signer = Signer::Offline(Box::new(AmendingSigner));
        let response = signer.sign(sign_doc()).await.unwrap();
        assert_eq!(response.signed.memo, "amended");
    }
}

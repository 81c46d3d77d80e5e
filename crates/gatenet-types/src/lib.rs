use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Comparison applied by the network against a condition's return value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturnValueTest {
    pub comparator: String,
    pub value: String,
}

/// A single access-control predicate over on-chain state.
///
/// Evaluated entirely by the network; this crate only carries it on the wire.
/// Field names follow the network's camelCase JSON surface.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessControlCondition {
    pub contract_address: String,
    pub standard_contract_type: String,
    pub chain: String,
    pub method: String,
    pub parameters: Vec<String>,
    pub return_value_test: ReturnValueTest,
}

impl AccessControlCondition {
    /// The ":userAddress equals `address`" predicate: only the holder of
    /// `address` may decrypt.
    pub fn current_user_is(chain: &str, address: &str) -> Self {
        Self {
            contract_address: String::new(),
            standard_contract_type: String::new(),
            chain: chain.to_string(),
            method: String::new(),
            parameters: vec![":userAddress".to_string()],
            return_value_test: ReturnValueTest {
                comparator: "=".to_string(),
                value: address.to_string(),
            },
        }
    }
}

/// A signed authorization: a message plus the signature that vouches for it.
///
/// Wallet-derived auth sigs carry an EIP-191 signature over a SIWE message;
/// session sigs carry an Ed25519 signature over a session template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSig {
    /// Hex signature (0x-prefixed for wallet sigs).
    pub sig: String,
    /// How the signature was produced, e.g. "web3.eth.personal.sign".
    pub derived_via: String,
    /// The exact text that was signed.
    pub signed_message: String,
    /// Signing identity: an Ethereum address or a session public key.
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub algo: Option<String>,
}

/// Session signatures keyed by node URL. Each node only accepts the
/// signature minted for it.
pub type SessionSigs = HashMap<String, AuthSig>;

/// What a session is allowed to do with a resource.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Ability {
    #[serde(rename = "access-control-condition-decryption")]
    AccessControlConditionDecryption,
    #[serde(rename = "access-control-condition-signing")]
    AccessControlConditionSigning,
}

impl Ability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ability::AccessControlConditionDecryption => "access-control-condition-decryption",
            Ability::AccessControlConditionSigning => "access-control-condition-signing",
        }
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A resource/ability pair requested for a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAbilityRequest {
    /// Resource identifier, e.g. "gatenet-acc://*" for all conditions.
    pub resource: String,
    pub ability: Ability,
}

impl ResourceAbilityRequest {
    /// Decryption over every access-control resource.
    pub fn decrypt_any() -> Self {
        Self {
            resource: "gatenet-acc://*".to_string(),
            ability: Ability::AccessControlConditionDecryption,
        }
    }
}

/// Result of an encrypt call: opaque ciphertext plus the SHA-256 of the
/// plaintext, both passed back verbatim at decrypt time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptResponse {
    /// Base64 ciphertext, opaque to the client.
    pub ciphertext: String,
    /// Lowercase hex SHA-256 of the plaintext.
    pub data_to_encrypt_hash: String,
}

/// Common error types.
#[derive(Debug, thiserror::Error)]
pub enum GatenetError {
    #[error("missing configuration: {0}")]
    MissingConfig(String),
    #[error("invalid private key")]
    InvalidPrivateKey,
    #[error("invalid signature")]
    InvalidSignature,
    #[error("wallet error: {0}")]
    Wallet(String),
    #[error("client is not connected")]
    NotConnected,
    #[error("only {connected} of {required} nodes completed the handshake")]
    HandshakeThreshold { connected: usize, required: usize },
    #[error("only {granted} of {required} nodes granted decryption")]
    DecryptThreshold { granted: usize, required: usize },
    #[error("node {url} rejected the request: {detail}")]
    NodeRejected { url: String, detail: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("contract error: {0}")]
    Contract(String),
    #[error("address owns no capacity token")]
    NoCapacityToken,
    #[error("plaintext hash mismatch: expected {expected}, got {actual}")]
    HashMismatch { expected: String, actual: String },
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_uses_wire_names() {
        let cond = AccessControlCondition::current_user_is("ethereum", "0xabc");
        let json = serde_json::to_value(&cond).unwrap();
        assert_eq!(json["contractAddress"], "");
        assert_eq!(json["standardContractType"], "");
        assert_eq!(json["chain"], "ethereum");
        assert_eq!(json["parameters"][0], ":userAddress");
        assert_eq!(json["returnValueTest"]["comparator"], "=");
        assert_eq!(json["returnValueTest"]["value"], "0xabc");
    }

    #[test]
    fn condition_roundtrip() {
        let cond = AccessControlCondition::current_user_is("ethereum", "0xabc");
        let json = serde_json::to_string(&cond).unwrap();
        let cond2: AccessControlCondition = serde_json::from_str(&json).unwrap();
        assert_eq!(cond, cond2);
    }

    #[test]
    fn auth_sig_omits_missing_algo() {
        let sig = AuthSig {
            sig: "0xdead".into(),
            derived_via: "web3.eth.personal.sign".into(),
            signed_message: "msg".into(),
            address: "0xabc".into(),
            algo: None,
        };
        let json = serde_json::to_value(&sig).unwrap();
        assert!(json.get("algo").is_none());
        assert_eq!(json["derivedVia"], "web3.eth.personal.sign");
        assert_eq!(json["signedMessage"], "msg");
    }

    #[test]
    fn ability_wire_name() {
        let req = ResourceAbilityRequest::decrypt_any();
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["ability"], "access-control-condition-decryption");
        assert_eq!(json["resource"], "gatenet-acc://*");
    }

    #[test]
    fn encrypt_response_roundtrip() {
        let resp = EncryptResponse {
            ciphertext: "AAECAw==".into(),
            data_to_encrypt_hash: "ab".repeat(32),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("dataToEncryptHash"));
        let resp2: EncryptResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(resp, resp2);
    }
}

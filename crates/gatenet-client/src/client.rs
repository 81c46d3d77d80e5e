use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::BoxFuture;
use gatenet_identity::{CapacityDelegation, EthWallet, SessionKeypair};
use gatenet_types::{
    AccessControlCondition, AuthSig, EncryptResponse, GatenetError, ResourceAbilityRequest,
    SessionSigs,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::NodeClientConfig;

/// Parameters handed to the auth callback when a session needs a wallet
/// signature over its SIWE challenge.
#[derive(Clone, Debug)]
pub struct AuthCallbackParams {
    /// The session key URI the wallet is delegating to.
    pub uri: String,
    pub expiration: DateTime<Utc>,
    pub resources: Vec<ResourceAbilityRequest>,
    /// Latest blockhash, to be used as the SIWE nonce.
    pub nonce: String,
}

/// Async callback that produces the wallet [`AuthSig`] binding a session key.
pub type AuthNeededCallback =
    Box<dyn Fn(AuthCallbackParams) -> BoxFuture<'static, Result<AuthSig, GatenetError>> + Send + Sync>;

/// An encrypt call: plaintext plus the conditions gating its decryption.
#[derive(Clone, Debug)]
pub struct EncryptRequest {
    pub data_to_encrypt: Vec<u8>,
    pub access_control_conditions: Vec<AccessControlCondition>,
}

/// A decrypt call: the encrypt output passed back verbatim, plus credentials.
#[derive(Clone, Debug)]
pub struct DecryptRequest {
    pub ciphertext: String,
    pub data_to_encrypt_hash: String,
    pub access_control_conditions: Vec<AccessControlCondition>,
    pub chain: String,
    pub session_sigs: SessionSigs,
}

/// Parameters for a session-signature negotiation.
#[derive(Clone, Debug)]
pub struct GetSessionSigsParams {
    pub chain: String,
    pub expiration: DateTime<Utc>,
    /// Capability auth sigs the session carries, e.g. a capacity delegation.
    pub capability_auth_sigs: Vec<AuthSig>,
    pub resource_ability_requests: Vec<ResourceAbilityRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HandshakeResponse {
    #[allow(dead_code)]
    network_public_key: String,
    latest_blockhash: String,
    #[allow(dead_code)]
    node_version: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EncryptWireRequest<'a> {
    data_to_encrypt: String,
    access_control_conditions: &'a [AccessControlCondition],
    data_to_encrypt_hash: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DecryptWireRequest<'a> {
    ciphertext: &'a str,
    data_to_encrypt_hash: &'a str,
    access_control_conditions: &'a [AccessControlCondition],
    chain: &'a str,
    auth_sig: &'a AuthSig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct DecryptWireResponse {
    decrypted_data: String,
}

/// What each node's session signature covers. The session key signs the
/// serialized template; nodes reject a template minted for another node.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SessionSigningTemplate<'a> {
    pub session_key: String,
    pub resource_ability_requests: &'a [ResourceAbilityRequest],
    pub capabilities: &'a [AuthSig],
    pub issued_at: String,
    pub expiration: String,
    pub node_address: &'a str,
}

/// Client handle for the gatenet node network.
///
/// Every remote call is awaited before the next begins; there is no retry
/// policy and no concurrent fan-out.
pub struct NodeClient {
    http: reqwest::Client,
    config: NodeClientConfig,
    nodes: Vec<String>,
    latest_blockhash: Option<String>,
}

impl NodeClient {
    pub fn new(config: NodeClientConfig) -> Result<Self, GatenetError> {
        let http = reqwest::Client::builder()
            .timeout(config.connect_timeout)
            .build()
            .map_err(|e| GatenetError::Network(e.to_string()))?;
        Ok(Self {
            http,
            config,
            nodes: Vec::new(),
            latest_blockhash: None,
        })
    }

    /// Handshake with every node URL in order. Fails unless at least
    /// `min_nodes` answer.
    pub async fn connect(&mut self) -> Result<(), GatenetError> {
        let urls = self.config.network.node_urls();
        let required = self.config.min_nodes;

        self.nodes.clear();
        for url in urls {
            match self.handshake(&url).await {
                Ok(handshake) => {
                    debug!(url, blockhash = %handshake.latest_blockhash, "handshake ok");
                    self.latest_blockhash = Some(handshake.latest_blockhash);
                    self.nodes.push(url);
                }
                Err(e) => warn!(url, error = %e, "handshake failed"),
            }
        }

        if self.nodes.len() < required {
            let connected = self.nodes.len();
            self.nodes.clear();
            self.latest_blockhash = None;
            return Err(GatenetError::HandshakeThreshold {
                connected,
                required,
            });
        }
        info!(nodes = self.nodes.len(), "connected to gatenet");
        Ok(())
    }

    async fn handshake(&self, url: &str) -> Result<HandshakeResponse, GatenetError> {
        let resp = self
            .http
            .get(format!("{url}/web/handshake"))
            .send()
            .await
            .map_err(|e| GatenetError::Network(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(GatenetError::NodeRejected {
                url: url.to_string(),
                detail: format!("handshake status {}", resp.status()),
            });
        }
        resp.json()
            .await
            .map_err(|e| GatenetError::Serialization(e.to_string()))
    }

    /// Nodes that completed the handshake.
    pub fn connected_nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Latest blockhash reported during the handshake; the SIWE nonce.
    pub fn latest_blockhash(&self) -> Result<&str, GatenetError> {
        self.latest_blockhash
            .as_deref()
            .ok_or(GatenetError::NotConnected)
    }

    fn require_connected(&self) -> Result<(), GatenetError> {
        if self.nodes.is_empty() {
            return Err(GatenetError::NotConnected);
        }
        Ok(())
    }

    /// Encrypt `data_to_encrypt` under the given conditions.
    ///
    /// The plaintext hash is computed locally and cross-checked against the
    /// node's answer; the ciphertext itself is opaque to this client.
    pub async fn encrypt(&self, request: &EncryptRequest) -> Result<EncryptResponse, GatenetError> {
        self.require_connected()?;

        let local_hash = hex::encode(Sha256::digest(&request.data_to_encrypt));
        let wire = EncryptWireRequest {
            data_to_encrypt: BASE64.encode(&request.data_to_encrypt),
            access_control_conditions: &request.access_control_conditions,
            data_to_encrypt_hash: local_hash.clone(),
        };

        let mut last_err = GatenetError::NotConnected;
        for url in &self.nodes {
            match self
                .post_json::<_, EncryptResponse>(url, "/web/encrypt", &wire)
                .await
            {
                Ok(resp) => {
                    if resp.data_to_encrypt_hash != local_hash {
                        return Err(GatenetError::HashMismatch {
                            expected: local_hash,
                            actual: resp.data_to_encrypt_hash,
                        });
                    }
                    return Ok(resp);
                }
                Err(e) => {
                    warn!(url, error = %e, "encrypt failed, trying next node");
                    last_err = e;
                }
            }
        }
        Err(last_err)
    }

    /// Produce the capacity-delegation auth sig: the funded wallet grants
    /// `uses` requests against `capacity_token_id` to the delegatees.
    pub async fn create_capacity_delegation_auth_sig(
        &self,
        wallet: &EthWallet,
        capacity_token_id: &str,
        delegatee_addresses: Vec<String>,
        uses: u64,
    ) -> Result<AuthSig, GatenetError> {
        let nonce = self.latest_blockhash()?.to_string();
        let chain_id = self.config.network.chain_id();
        CapacityDelegation::new(capacity_token_id, delegatee_addresses, uses)?
            .sign(wallet, chain_id, &nonce)
            .await
    }

    /// Negotiate session signatures.
    ///
    /// A fresh Ed25519 session key is generated; `auth_needed` must return a
    /// wallet auth sig over a SIWE challenge naming the session key URI. The
    /// session key then signs one template per connected node.
    pub async fn get_session_sigs(
        &self,
        params: &GetSessionSigsParams,
        auth_needed: &AuthNeededCallback,
    ) -> Result<SessionSigs, GatenetError> {
        self.require_connected()?;
        let nonce = self.latest_blockhash()?.to_string();

        let session = SessionKeypair::generate();
        let wallet_sig = auth_needed(AuthCallbackParams {
            uri: session.session_uri(),
            expiration: params.expiration,
            resources: params.resource_ability_requests.clone(),
            nonce,
        })
        .await?;

        if !wallet_sig.signed_message.contains(&session.session_uri()) {
            return Err(GatenetError::Unauthorized(
                "auth callback did not bind the session key".to_string(),
            ));
        }

        let mut capabilities = params.capability_auth_sigs.clone();
        capabilities.push(wallet_sig);

        let issued_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let expiration = params
            .expiration
            .to_rfc3339_opts(SecondsFormat::Millis, true);

        let mut session_sigs = SessionSigs::new();
        for url in &self.nodes {
            let template = SessionSigningTemplate {
                session_key: session.public_key_hex(),
                resource_ability_requests: &params.resource_ability_requests,
                capabilities: &capabilities,
                issued_at: issued_at.clone(),
                expiration: expiration.clone(),
                node_address: url,
            };
            let template_json = serde_json::to_string(&template)
                .map_err(|e| GatenetError::Serialization(e.to_string()))?;
            session_sigs.insert(url.clone(), session.sign_template(&template_json));
        }
        debug!(nodes = session_sigs.len(), "session signatures minted");
        Ok(session_sigs)
    }

    /// Decrypt a ciphertext. Requires `min_nodes` nodes to grant the request,
    /// and checks the recovered plaintext against `data_to_encrypt_hash`.
    pub async fn decrypt(&self, request: &DecryptRequest) -> Result<Vec<u8>, GatenetError> {
        self.require_connected()?;
        let required = self.config.min_nodes;

        let mut plaintext: Option<Vec<u8>> = None;
        let mut granted = 0usize;
        for url in &self.nodes {
            let Some(auth_sig) = request.session_sigs.get(url) else {
                warn!(url, "no session signature for node, skipping");
                continue;
            };
            let wire = DecryptWireRequest {
                ciphertext: &request.ciphertext,
                data_to_encrypt_hash: &request.data_to_encrypt_hash,
                access_control_conditions: &request.access_control_conditions,
                chain: &request.chain,
                auth_sig,
            };
            match self
                .post_json::<_, DecryptWireResponse>(url, "/web/decrypt", &wire)
                .await
            {
                Ok(resp) => {
                    let data = BASE64
                        .decode(&resp.decrypted_data)
                        .map_err(|e| GatenetError::Serialization(e.to_string()))?;
                    let actual = hex::encode(Sha256::digest(&data));
                    if actual != request.data_to_encrypt_hash {
                        return Err(GatenetError::HashMismatch {
                            expected: request.data_to_encrypt_hash.clone(),
                            actual,
                        });
                    }
                    granted += 1;
                    plaintext.get_or_insert(data);
                }
                Err(e) => warn!(url, error = %e, "node refused decryption"),
            }
        }

        // Hash check above guarantees agreement across granting nodes. Even a
        // zero quorum never turns an all-refused round into a success.
        match plaintext {
            Some(data) if granted >= required => Ok(data),
            _ => Err(GatenetError::DecryptThreshold { granted, required }),
        }
    }

    /// Release the client handle. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.nodes.clear();
        self.latest_blockhash = None;
        info!("disconnected from gatenet");
    }

    async fn post_json<B, T>(&self, url: &str, path: &str, body: &B) -> Result<T, GatenetError>
    where
        B: Serialize,
        T: serde::de::DeserializeOwned,
    {
        let resp = self
            .http
            .post(format!("{url}{path}"))
            .json(body)
            .send()
            .await
            .map_err(|e| GatenetError::Network(e.to_string()))?;

        if resp.status().is_success() {
            resp.json::<T>()
                .await
                .map_err(|e| GatenetError::Serialization(e.to_string()))
        } else {
            let detail = resp
                .json::<serde_json::Value>()
                .await
                .ok()
                .and_then(|v| v["detail"].as_str().map(str::to_string))
                .unwrap_or_else(|| "unknown error".to_string());
            Err(GatenetError::NodeRejected {
                url: url.to_string(),
                detail,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Network;

    fn unconnected_client() -> NodeClient {
        NodeClient::new(NodeClientConfig {
            network: Network::Custom(vec![]),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn encrypt_requires_connection() {
        let client = unconnected_client();
        let request = EncryptRequest {
            data_to_encrypt: b"42".to_vec(),
            access_control_conditions: vec![],
        };
        assert!(matches!(
            client.encrypt(&request).await,
            Err(GatenetError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn decrypt_requires_connection() {
        let client = unconnected_client();
        let request = DecryptRequest {
            ciphertext: String::new(),
            data_to_encrypt_hash: String::new(),
            access_control_conditions: vec![],
            chain: "ethereum".to_string(),
            session_sigs: SessionSigs::new(),
        };
        assert!(matches!(
            client.decrypt(&request).await,
            Err(GatenetError::NotConnected)
        ));
    }

    #[test]
    fn blockhash_requires_connection() {
        let client = unconnected_client();
        assert!(matches!(
            client.latest_blockhash(),
            Err(GatenetError::NotConnected)
        ));
    }

    #[test]
    fn disconnect_is_idempotent() {
        let mut client = unconnected_client();
        client.disconnect();
        client.disconnect();
        assert!(client.connected_nodes().is_empty());
    }

    #[test]
    fn session_template_wire_names() {
        let template = SessionSigningTemplate {
            session_key: "ab".repeat(32),
            resource_ability_requests: &[],
            capabilities: &[],
            issued_at: "2024-01-01T00:00:00.000Z".to_string(),
            expiration: "2024-01-01T00:10:00.000Z".to_string(),
            node_address: "http://127.0.0.1:9700",
        };
        let json = serde_json::to_value(&template).unwrap();
        assert!(json.get("sessionKey").is_some());
        assert!(json.get("resourceAbilityRequests").is_some());
        assert!(json.get("nodeAddress").is_some());
        assert!(json.get("issuedAt").is_some());
    }
}

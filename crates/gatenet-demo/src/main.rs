//! Walkthrough of the gatenet flow: encrypt a message that only a throwaway
//! address may read, delegate rate-limit capacity to it, negotiate session
//! signatures via SIWE, and decrypt the message back.

mod config;

use chrono::{Duration, Utc};
use gatenet_client::{
    AuthNeededCallback, DecryptRequest, EncryptRequest, GetSessionSigsParams, NodeClient,
    NodeClientConfig,
};
use gatenet_contracts::ContractClient;
use gatenet_identity::{EthWallet, SiweMessage};
use gatenet_types::{AccessControlCondition, GatenetError, ResourceAbilityRequest};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::DemoConfig;

const PLAINTEXT: &str = "The answer to life, the universe, and everything is 42.";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match run_example().await {
        Ok(decrypted) => info!(decrypted, "example finished"),
        Err(e) => error!(error = %e, "example failed"),
    }
}

async fn run_example() -> Result<String, GatenetError> {
    // Configuration is validated before anything touches the network.
    let config = DemoConfig::from_env()?;
    let throwaway = EthWallet::random();
    let funded = EthWallet::from_private_key(&config.ethereum_private_key)?;

    let mut client = NodeClient::new(NodeClientConfig {
        network: config.network.clone(),
        ..Default::default()
    })?;
    client.connect().await?;

    let result = run_flow(&client, &config, &throwaway, &funded).await;

    // The handle is released whether the flow succeeded or not.
    client.disconnect();
    result
}

async fn run_flow(
    client: &NodeClient,
    config: &DemoConfig,
    throwaway: &EthWallet,
    funded: &EthWallet,
) -> Result<String, GatenetError> {
    // Only the throwaway address may decrypt.
    let conditions = vec![AccessControlCondition::current_user_is(
        "ethereum",
        &throwaway.address_string(),
    )];

    let encrypted = client
        .encrypt(&EncryptRequest {
            data_to_encrypt: PLAINTEXT.as_bytes().to_vec(),
            access_control_conditions: conditions.clone(),
        })
        .await?;
    info!(ciphertext = %encrypted.ciphertext, "ciphertext");
    info!(hash = %encrypted.data_to_encrypt_hash, "data to encrypt hash");

    // The funded account's newest capacity token backs the delegation.
    let contracts = ContractClient::connect(&config.rpc_url, config.rate_limit_nft_address()?).await?;
    let capacity_token_id = contracts.latest_capacity_token(funded.address()).await?;
    info!(%capacity_token_id, "capacity token id");

    let delegation_sig = client
        .create_capacity_delegation_auth_sig(
            funded,
            &capacity_token_id.to_string(),
            vec![throwaway.address_string()],
            1,
        )
        .await?;

    let params = GetSessionSigsParams {
        chain: "ethereum".to_string(),
        expiration: Utc::now() + Duration::minutes(10),
        capability_auth_sigs: vec![delegation_sig],
        resource_ability_requests: vec![ResourceAbilityRequest::decrypt_any()],
    };
    let callback = siwe_callback(throwaway.clone(), config.network.chain_id());
    let session_sigs = client.get_session_sigs(&params, &callback).await?;

    let decrypted = client
        .decrypt(&DecryptRequest {
            ciphertext: encrypted.ciphertext,
            data_to_encrypt_hash: encrypted.data_to_encrypt_hash,
            access_control_conditions: conditions,
            chain: "ethereum".to_string(),
            session_sigs,
        })
        .await?;

    let decrypted_string =
        String::from_utf8(decrypted).map_err(|e| GatenetError::Serialization(e.to_string()))?;
    info!(decrypted_string, "decrypted string");
    Ok(decrypted_string)
}

/// Auth callback: sign the session's SIWE challenge with `wallet`.
fn siwe_callback(wallet: EthWallet, chain_id: u64) -> AuthNeededCallback {
    Box::new(move |params| {
        let wallet = wallet.clone();
        Box::pin(async move {
            let message = SiweMessage::new(
                "localhost",
                &wallet.address_string(),
                &params.uri,
                chain_id,
                &params.nonce,
            )
            .statement("Authorize this session to decrypt on my behalf.")
            .expiration(params.expiration)
            .resources(
                params
                    .resources
                    .iter()
                    .map(|r| format!("urn:resource:{}:{}", r.ability, r.resource))
                    .collect(),
            );
            wallet.sign_message(&message.to_message_string()).await
        })
    })
}

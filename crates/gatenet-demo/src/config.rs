use alloy::primitives::Address;
use gatenet_client::Network;
use gatenet_types::GatenetError;

const DEFAULT_RPC_URL: &str = "https://ethereum-sepolia-rpc.publicnode.com";

/// Demo configuration, read from the environment before any network call.
#[derive(Clone, Debug)]
pub struct DemoConfig {
    /// Private key of the funded account that owns a capacity token.
    pub ethereum_private_key: String,
    /// EVM JSON-RPC endpoint for the capacity-token lookup.
    pub rpc_url: String,
    pub network: Network,
}

impl DemoConfig {
    pub fn from_env() -> Result<Self, GatenetError> {
        let ethereum_private_key = required_env("ETHEREUM_PRIVATE_KEY")?;
        let rpc_url =
            std::env::var("GATENET_RPC_URL").unwrap_or_else(|_| DEFAULT_RPC_URL.to_string());
        let network = match std::env::var("GATENET_NODES") {
            Ok(nodes) => Network::Custom(
                nodes
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            Err(_) => Network::Testnet,
        };
        Ok(Self {
            ethereum_private_key,
            rpc_url,
            network,
        })
    }

    /// Rate-limit NFT address: env override first, then the network default.
    pub fn rate_limit_nft_address(&self) -> Result<Address, GatenetError> {
        let addr = std::env::var("GATENET_RATE_LIMIT_NFT")
            .ok()
            .or_else(|| self.network.rate_limit_nft_address().map(str::to_string))
            .ok_or_else(|| GatenetError::MissingConfig("GATENET_RATE_LIMIT_NFT".to_string()))?;
        addr.parse()
            .map_err(|_| GatenetError::Contract(format!("invalid contract address: {addr}")))
    }
}

fn required_env(name: &str) -> Result<String, GatenetError> {
    std::env::var(name).map_err(|_| GatenetError::MissingConfig(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_required_env_fails_fast() {
        let err = required_env("GATENET_TEST_UNSET_VARIABLE").unwrap_err();
        assert!(matches!(err, GatenetError::MissingConfig(name) if name.contains("UNSET")));
    }

    #[test]
    fn known_network_contract_address_parses() {
        let config = DemoConfig {
            ethereum_private_key: String::new(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            network: Network::Testnet,
        };
        assert!(config.rate_limit_nft_address().is_ok());
    }

    #[test]
    fn custom_network_without_override_has_no_contract() {
        let config = DemoConfig {
            ethereum_private_key: String::new(),
            rpc_url: DEFAULT_RPC_URL.to_string(),
            network: Network::Custom(vec!["http://127.0.0.1:9700".to_string()]),
        };
        assert!(config.rate_limit_nft_address().is_err());
    }
}

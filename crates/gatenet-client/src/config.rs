use std::time::Duration;

/// Which gatenet deployment to talk to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Network {
    Mainnet,
    Testnet,
    /// Explicit node URLs, e.g. a local devnet.
    Custom(Vec<String>),
}

impl Network {
    /// Node URLs in handshake order.
    pub fn node_urls(&self) -> Vec<String> {
        match self {
            Network::Mainnet => vec![
                "https://node1.gatenet.io".to_string(),
                "https://node2.gatenet.io".to_string(),
                "https://node3.gatenet.io".to_string(),
            ],
            Network::Testnet => vec![
                "https://node1.testnet.gatenet.io".to_string(),
                "https://node2.testnet.gatenet.io".to_string(),
                "https://node3.testnet.gatenet.io".to_string(),
            ],
            Network::Custom(urls) => urls.clone(),
        }
    }

    /// Chain id used in SIWE messages for this deployment.
    pub fn chain_id(&self) -> u64 {
        match self {
            Network::Mainnet => 1,
            Network::Testnet => 11155111,
            Network::Custom(_) => 31337,
        }
    }

    /// Rate-limit NFT contract address, where the deployment has one.
    pub fn rate_limit_nft_address(&self) -> Option<&'static str> {
        match self {
            Network::Mainnet => Some("0x9c7c9b5e8d8a1c0a2f3b4d5e6f708192a3b4c5d6"),
            Network::Testnet => Some("0x1f2e3d4c5b6a798081928374655647382910abcd"),
            Network::Custom(_) => None,
        }
    }
}

/// Node client configuration.
#[derive(Clone, Debug)]
pub struct NodeClientConfig {
    pub network: Network,
    /// Per-request timeout for node HTTP calls.
    pub connect_timeout: Duration,
    /// Minimum nodes that must answer the handshake, and the decrypt quorum.
    pub min_nodes: usize,
    pub debug: bool,
}

impl Default for NodeClientConfig {
    fn default() -> Self {
        Self {
            network: Network::Testnet,
            connect_timeout: Duration::from_secs(30),
            min_nodes: 2,
            debug: false,
        }
    }
}

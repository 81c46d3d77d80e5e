//! Read-side contract access for the rate-limit (capacity) NFT.
//!
//! The demo only needs to discover which capacity token an address owns, so
//! the client here is read-only: no wallet is attached to the provider.

use alloy::primitives::{Address, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::sol;
use gatenet_types::GatenetError;
use tracing::{debug, info};

sol! {
    #[sol(rpc)]
    interface RateLimitNft {
        function balanceOf(address owner) external view returns (uint256);
        function tokenOfOwnerByIndex(address owner, uint256 index) external view returns (uint256);
    }
}

/// Connection to the capacity-token contract on an EVM chain.
#[derive(Debug)]
pub struct ContractClient {
    provider: DynProvider,
    rate_limit_nft: Address,
}

impl ContractClient {
    /// Connect an HTTP provider and verify it answers before any reads.
    pub async fn connect(rpc_url: &str, rate_limit_nft: Address) -> Result<Self, GatenetError> {
        let url = rpc_url
            .parse()
            .map_err(|_| GatenetError::Contract(format!("invalid RPC URL: {rpc_url}")))?;
        let provider = ProviderBuilder::new().connect_http(url).erased();

        let block = provider
            .get_block_number()
            .await
            .map_err(|e| GatenetError::Contract(format!("RPC connectivity check failed: {e}")))?;
        info!(rpc_url, block, "contract provider connected");

        Ok(Self {
            provider,
            rate_limit_nft,
        })
    }

    /// All capacity token ids owned by `owner`, oldest first.
    ///
    /// One `tokenOfOwnerByIndex` read per owned token, awaited in order.
    pub async fn tokens_by_owner(&self, owner: Address) -> Result<Vec<U256>, GatenetError> {
        let contract = RateLimitNft::new(self.rate_limit_nft, self.provider.clone());

        let balance = contract
            .balanceOf(owner)
            .call()
            .await
            .map_err(|e| GatenetError::Contract(e.to_string()))?;
        debug!(%owner, %balance, "capacity token balance");

        let count = balance.to::<u64>();
        let mut tokens = Vec::with_capacity(count as usize);
        for index in 0..count {
            let token_id = contract
                .tokenOfOwnerByIndex(owner, U256::from(index))
                .call()
                .await
                .map_err(|e| GatenetError::Contract(e.to_string()))?;
            tokens.push(token_id);
        }
        Ok(tokens)
    }

    /// The most recently minted capacity token for `owner`.
    pub async fn latest_capacity_token(&self, owner: Address) -> Result<U256, GatenetError> {
        let tokens = self.tokens_by_owner(owner).await?;
        newest_token(&tokens)
    }
}

/// Token enumeration is mint-ordered, so the newest grant is the last entry.
fn newest_token(tokens: &[U256]) -> Result<U256, GatenetError> {
    tokens.last().copied().ok_or(GatenetError::NoCapacityToken)
}

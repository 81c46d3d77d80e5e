//! Capacity delegation: a funded wallet grants a session limited use of its
//! rate-limit allowance by signing a SIWE message that carries the grant as a
//! recap resource.

use alloy::primitives::Address;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use gatenet_types::{AuthSig, GatenetError};
use serde::{Deserialize, Serialize};

use crate::{recover_address, EthWallet, SiweMessage};

const RECAP_PREFIX: &str = "urn:recap:";
const DELEGATION_URI: &str = "gatenet:capability:delegation";
const DELEGATION_STATEMENT: &str =
    "I am delegating limited use of my rate-limit capacity to the listed addresses.";

/// The grant embedded in a delegation's recap resource.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationPayload {
    pub capacity_token_id: String,
    pub delegatee_addresses: Vec<String>,
    pub uses: u64,
    pub expiration: DateTime<Utc>,
}

impl DelegationPayload {
    /// Whether `address` may consume this grant. An empty delegatee list
    /// delegates to any holder of the signature.
    pub fn permits(&self, address: &str) -> bool {
        self.delegatee_addresses.is_empty()
            || self
                .delegatee_addresses
                .iter()
                .any(|a| a.eq_ignore_ascii_case(address))
    }
}

/// Builder for a capacity-delegation authorization.
#[derive(Clone, Debug)]
pub struct CapacityDelegation {
    payload: DelegationPayload,
}

impl CapacityDelegation {
    /// A grant of `uses` requests against `capacity_token_id`, valid for
    /// seven days unless [`Self::expiration`] overrides it.
    pub fn new(
        capacity_token_id: &str,
        delegatee_addresses: Vec<String>,
        uses: u64,
    ) -> Result<Self, GatenetError> {
        if uses == 0 {
            return Err(GatenetError::Unauthorized(
                "delegation must grant at least one use".to_string(),
            ));
        }
        Ok(Self {
            payload: DelegationPayload {
                capacity_token_id: capacity_token_id.to_string(),
                delegatee_addresses,
                uses,
                expiration: Utc::now() + Duration::days(7),
            },
        })
    }

    pub fn expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.payload.expiration = expiration;
        self
    }

    /// The grant encoded as a `urn:recap:` resource.
    pub fn recap_resource(&self) -> Result<String, GatenetError> {
        let json = serde_json::to_string(&self.payload)
            .map_err(|e| GatenetError::Serialization(e.to_string()))?;
        Ok(format!("{RECAP_PREFIX}{}", BASE64.encode(json)))
    }

    /// Sign the delegation with the funded wallet. `nonce` should be the
    /// network's latest blockhash.
    pub async fn sign(
        &self,
        wallet: &EthWallet,
        chain_id: u64,
        nonce: &str,
    ) -> Result<AuthSig, GatenetError> {
        let message = SiweMessage::new(
            "gatenet",
            &wallet.address_string(),
            DELEGATION_URI,
            chain_id,
            nonce,
        )
        .statement(DELEGATION_STATEMENT)
        .expiration(self.payload.expiration)
        .resource(&self.recap_resource()?);

        wallet.sign_message(&message.to_message_string()).await
    }

    /// Check a delegation auth sig: the signature must recover to the claimed
    /// address and the embedded grant must not be expired.
    pub fn verify(auth_sig: &AuthSig) -> Result<DelegationPayload, GatenetError> {
        let recovered = recover_address(&auth_sig.signed_message, &auth_sig.sig)?;
        let claimed = auth_sig
            .address
            .parse::<Address>()
            .map_err(|_| GatenetError::InvalidSignature)?;
        if recovered != claimed {
            return Err(GatenetError::InvalidSignature);
        }

        let payload = Self::extract_payload(&auth_sig.signed_message)?;
        if payload.expiration < Utc::now() {
            return Err(GatenetError::Unauthorized("delegation expired".to_string()));
        }
        Ok(payload)
    }

    fn extract_payload(signed_message: &str) -> Result<DelegationPayload, GatenetError> {
        let recap = signed_message
            .lines()
            .filter_map(|line| line.strip_prefix("- "))
            .find_map(|resource| resource.strip_prefix(RECAP_PREFIX))
            .ok_or_else(|| {
                GatenetError::Unauthorized("no delegation resource in message".to_string())
            })?;
        let json = BASE64
            .decode(recap)
            .map_err(|e| GatenetError::Serialization(e.to_string()))?;
        serde_json::from_slice(&json).map_err(|e| GatenetError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delegation_to(address: &str) -> CapacityDelegation {
        CapacityDelegation::new("42", vec![address.to_string()], 1).unwrap()
    }

    #[tokio::test]
    async fn sign_and_verify() {
        let funded = EthWallet::random();
        let delegatee = EthWallet::random();

        let auth_sig = delegation_to(&delegatee.address_string())
            .sign(&funded, 1, "0xblockhash")
            .await
            .unwrap();

        let payload = CapacityDelegation::verify(&auth_sig).unwrap();
        assert_eq!(payload.capacity_token_id, "42");
        assert_eq!(payload.uses, 1);
        assert!(payload.permits(&delegatee.address_string()));
        assert!(!payload.permits(&funded.address_string()));
    }

    #[tokio::test]
    async fn tampered_message_rejected() {
        let funded = EthWallet::random();
        let mut auth_sig = delegation_to("0x1111111111111111111111111111111111111111")
            .sign(&funded, 1, "0xblockhash")
            .await
            .unwrap();

        auth_sig.signed_message = auth_sig.signed_message.replace("gatenet", "forged");
        assert!(CapacityDelegation::verify(&auth_sig).is_err());
    }

    #[tokio::test]
    async fn expired_delegation_rejected() {
        let funded = EthWallet::random();
        let auth_sig = delegation_to("0x1111111111111111111111111111111111111111")
            .expiration(Utc::now() - Duration::minutes(1))
            .sign(&funded, 1, "0xblockhash")
            .await
            .unwrap();

        assert!(matches!(
            CapacityDelegation::verify(&auth_sig),
            Err(GatenetError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn recap_found_among_other_resources() {
        let funded = EthWallet::random();
        let delegation = delegation_to("0x1111111111111111111111111111111111111111");

        // The recap is the second resource; verification must still find it.
        let message = SiweMessage::new(
            "gatenet",
            &funded.address_string(),
            "gatenet:capability:delegation",
            1,
            "0xblockhash",
        )
        .statement(DELEGATION_STATEMENT)
        .expiration(Utc::now() + Duration::days(1))
        .resource("urn:resource:access-control-condition-decryption:gatenet-acc://*")
        .resource(&delegation.recap_resource().unwrap());

        let auth_sig = funded
            .sign_message(&message.to_message_string())
            .await
            .unwrap();

        let payload = CapacityDelegation::verify(&auth_sig).unwrap();
        assert_eq!(payload.capacity_token_id, "42");
    }

    #[test]
    fn zero_uses_rejected() {
        assert!(CapacityDelegation::new("42", vec![], 0).is_err());
    }

    #[test]
    fn empty_delegatee_list_permits_anyone() {
        let delegation = CapacityDelegation::new("42", vec![], 1).unwrap();
        assert!(delegation
            .payload
            .permits("0x2222222222222222222222222222222222222222"));
    }

    #[test]
    fn permits_is_case_insensitive() {
        let delegation =
            CapacityDelegation::new("42", vec!["0xAbCd000000000000000000000000000000000000".into()], 1)
                .unwrap();
        assert!(delegation
            .payload
            .permits("0xabcd000000000000000000000000000000000000"));
    }
}

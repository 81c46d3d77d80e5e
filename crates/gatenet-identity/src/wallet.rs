use alloy::primitives::{Address, Signature};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use gatenet_types::{AuthSig, GatenetError};

/// An Ethereum wallet backed by a local secp256k1 signer.
#[derive(Clone)]
pub struct EthWallet {
    signer: PrivateKeySigner,
}

impl EthWallet {
    /// Generate a throwaway wallet.
    pub fn random() -> Self {
        Self {
            signer: PrivateKeySigner::random(),
        }
    }

    /// Restore the funded signer from a hex private key.
    pub fn from_private_key(private_key: &str) -> Result<Self, GatenetError> {
        let signer = private_key
            .parse::<PrivateKeySigner>()
            .map_err(|_| GatenetError::InvalidPrivateKey)?;
        Ok(Self { signer })
    }

    /// The wallet's Ethereum address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Checksummed address string, as used in SIWE messages and conditions.
    pub fn address_string(&self) -> String {
        self.signer.address().to_string()
    }

    /// EIP-191 personal-sign over `message`, packaged as an [`AuthSig`].
    pub async fn sign_message(&self, message: &str) -> Result<AuthSig, GatenetError> {
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| GatenetError::Wallet(e.to_string()))?;

        Ok(AuthSig {
            sig: format!("0x{}", hex::encode(signature.as_bytes())),
            derived_via: "web3.eth.personal.sign".to_string(),
            signed_message: message.to_string(),
            address: self.address_string(),
            algo: None,
        })
    }
}

/// Recover the Ethereum address that personal-signed `message`.
pub fn recover_address(message: &str, sig_hex: &str) -> Result<Address, GatenetError> {
    let raw = sig_hex.strip_prefix("0x").unwrap_or(sig_hex);
    let bytes = hex::decode(raw).map_err(|_| GatenetError::InvalidSignature)?;
    let signature =
        Signature::try_from(bytes.as_slice()).map_err(|_| GatenetError::InvalidSignature)?;
    signature
        .recover_address_from_msg(message.as_bytes())
        .map_err(|_| GatenetError::InvalidSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sign_and_recover() {
        let wallet = EthWallet::random();
        let auth_sig = wallet.sign_message("hello gatenet").await.unwrap();

        assert_eq!(auth_sig.derived_via, "web3.eth.personal.sign");
        assert_eq!(auth_sig.address, wallet.address_string());

        let recovered = recover_address(&auth_sig.signed_message, &auth_sig.sig).unwrap();
        assert_eq!(recovered, wallet.address());
    }

    #[tokio::test]
    async fn recover_rejects_wrong_message() {
        let wallet = EthWallet::random();
        let auth_sig = wallet.sign_message("original").await.unwrap();

        let recovered = recover_address("tampered", &auth_sig.sig).unwrap();
        assert_ne!(recovered, wallet.address());
    }

    #[test]
    fn invalid_private_key_is_an_error() {
        assert!(matches!(
            EthWallet::from_private_key("not-a-key"),
            Err(GatenetError::InvalidPrivateKey)
        ));
    }

    #[test]
    fn from_private_key_is_deterministic() {
        let key = "0x0000000000000000000000000000000000000000000000000000000000000001";
        let a = EthWallet::from_private_key(key).unwrap();
        let b = EthWallet::from_private_key(key).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn recover_rejects_garbage() {
        assert!(recover_address("msg", "0xzz").is_err());
        assert!(recover_address("msg", "0x0102").is_err());
    }
}

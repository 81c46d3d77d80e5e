use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use gatenet_types::{AuthSig, GatenetError};

/// `derivedVia` marker for session-key auth sigs.
pub const SESSION_SIG_DERIVATION: &str = "gatenet.session-sig:ed25519";

/// An ephemeral Ed25519 keypair that signs per-node session requests.
///
/// The wallet never signs node traffic directly: it signs one SIWE challenge
/// that names this key's URI, and the session key signs everything after.
pub struct SessionKeypair {
    signing_key: SigningKey,
}

impl SessionKeypair {
    /// Generate a fresh session keypair.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut csprng),
        }
    }

    /// Hex-encoded Ed25519 public key.
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// The URI the wallet delegates to in its SIWE challenge.
    pub fn session_uri(&self) -> String {
        format!("gatenet:session:{}", self.public_key_hex())
    }

    /// Sign a session template, producing the auth sig a node will accept.
    pub fn sign_template(&self, template_json: &str) -> AuthSig {
        let signature = self.signing_key.sign(template_json.as_bytes());
        AuthSig {
            sig: hex::encode(signature.to_bytes()),
            derived_via: SESSION_SIG_DERIVATION.to_string(),
            signed_message: template_json.to_string(),
            address: self.public_key_hex(),
            algo: Some("ed25519".to_string()),
        }
    }
}

/// Verify a session auth sig against the session public key it claims.
pub fn verify_session_sig(auth_sig: &AuthSig) -> Result<(), GatenetError> {
    let pubkey_bytes: [u8; 32] = hex::decode(&auth_sig.address)
        .map_err(|_| GatenetError::InvalidSignature)?
        .try_into()
        .map_err(|_| GatenetError::InvalidSignature)?;
    let sig_bytes: [u8; 64] = hex::decode(&auth_sig.sig)
        .map_err(|_| GatenetError::InvalidSignature)?
        .try_into()
        .map_err(|_| GatenetError::InvalidSignature)?;

    let verifying_key =
        VerifyingKey::from_bytes(&pubkey_bytes).map_err(|_| GatenetError::InvalidSignature)?;
    let signature = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    verifying_key
        .verify(auth_sig.signed_message.as_bytes(), &signature)
        .map_err(|_| GatenetError::InvalidSignature)
}

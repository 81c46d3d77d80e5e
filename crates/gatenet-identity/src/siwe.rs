//! Sign-in-with-Ethereum (EIP-4361) message construction.
//!
//! Only the message text is built here; verification happens on the network
//! side, or via [`crate::recover_address`] where a local check is wanted.

use chrono::{DateTime, SecondsFormat, Utc};

/// An EIP-4361 message, rendered with [`SiweMessage::to_message_string`].
#[derive(Clone, Debug)]
pub struct SiweMessage {
    pub domain: String,
    pub address: String,
    pub statement: Option<String>,
    pub uri: String,
    pub chain_id: u64,
    /// Typically the network's latest blockhash.
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration: Option<DateTime<Utc>>,
    pub resources: Vec<String>,
}

impl SiweMessage {
    pub fn new(domain: &str, address: &str, uri: &str, chain_id: u64, nonce: &str) -> Self {
        Self {
            domain: domain.to_string(),
            address: address.to_string(),
            statement: None,
            uri: uri.to_string(),
            chain_id,
            nonce: nonce.to_string(),
            issued_at: Utc::now(),
            expiration: None,
            resources: Vec::new(),
        }
    }

    pub fn statement(mut self, statement: &str) -> Self {
        self.statement = Some(statement.to_string());
        self
    }

    pub fn expiration(mut self, expiration: DateTime<Utc>) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn resource(mut self, resource: &str) -> Self {
        self.resources.push(resource.to_string());
        self
    }

    pub fn resources(mut self, resources: Vec<String>) -> Self {
        self.resources = resources;
        self
    }

    /// Render the exact ERC-4361 text layout.
    pub fn to_message_string(&self) -> String {
        let mut lines = Vec::new();
        lines.push(format!(
            "{} wants you to sign in with your Ethereum account:",
            self.domain
        ));
        lines.push(self.address.clone());
        lines.push(String::new());
        if let Some(statement) = &self.statement {
            lines.push(statement.clone());
            lines.push(String::new());
        }
        lines.push(format!("URI: {}", self.uri));
        lines.push("Version: 1".to_string());
        lines.push(format!("Chain ID: {}", self.chain_id));
        lines.push(format!("Nonce: {}", self.nonce));
        lines.push(format!(
            "Issued At: {}",
            self.issued_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
        if let Some(expiration) = &self.expiration {
            lines.push(format!(
                "Expiration Time: {}",
                expiration.to_rfc3339_opts(SecondsFormat::Millis, true)
            ));
        }
        if !self.resources.is_empty() {
            lines.push("Resources:".to_string());
            for resource in &self.resources {
                lines.push(format!("- {resource}"));
            }
        }
        lines.join("\n")
    }
}

mod client;
mod config;

pub use client::{
    AuthCallbackParams, AuthNeededCallback, DecryptRequest, EncryptRequest, GetSessionSigsParams,
    NodeClient,
};
pub use config::{Network, NodeClientConfig};

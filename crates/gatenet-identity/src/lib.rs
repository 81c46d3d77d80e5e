mod session;
mod wallet;
pub mod delegation;
pub mod siwe;

pub use delegation::{CapacityDelegation, DelegationPayload};
pub use session::{verify_session_sig, SessionKeypair, SESSION_SIG_DERIVATION};
pub use siwe::SiweMessage;
pub use wallet::{recover_address, EthWallet};

pub mod eth;
pub mod signer;
pub mod tokens;

pub use eth::EthChainClient;
pub use signer::LocalWalletSigner;

pub mod chain_client;
pub mod token_balances;

pub use chain_client::{ChainClient, PermitRequest, PermitSignature, WalletSigner};
pub use token_balances::{AlchemyBalanceClient, RawTokenBalance, TokenBalanceSource};

pub mod azure_cli;
pub mod cache;
pub mod environment;
pub mod error;
pub mod provider;

pub use azure_cli::AzureCliCredential;
pub use cache::CredentialCache;
pub use environment::EnvironmentCredential;
pub use error::{AuthError, Result};
pub use provider::{default_chain, ChainedTokenProvider, StaticTokenCredential, TokenProvider};

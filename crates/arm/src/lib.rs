pub mod client;
pub mod error;
pub mod traits;
pub mod types;

pub use client::{ArmClient, DEFAULT_API_VERSION, DEFAULT_ENDPOINT};
pub use error::{ArmError, Result};
pub use traits::ResourceApi;
pub use types::*;

pub mod domain;
pub mod error;

pub use domain::*;
pub use error::{validate_container_name, validate_deployment_prefix, CoreError};

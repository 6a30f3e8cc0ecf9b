pub mod credential;
pub mod deployment;
pub mod parameters;
pub mod state;

pub use credential::{Credential, ARM_SCOPE};
pub use deployment::{
    DeploymentMode, DeploymentName, DeploymentRequest, DeploymentResult, OperationHandle, Template,
};
pub use parameters::Parameters;
pub use state::ProvisioningState;

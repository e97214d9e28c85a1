//! LINSTOR controller clients.
//!
//! [`LinstorClient`] is the narrow interface the volume store needs from a
//! storage controller. Two implementations are provided:
//!
//! | Client | Purpose |
//! |---|---|
//! | [`cli::CliClient`] | Drives the `linstor` command line client. |
//! | [`memory::MemoryClient`] | In-process controller for tests and dry runs. |

pub mod cli;
pub mod memory;

use async_trait::async_trait;

use crate::deployment::DeploymentConfig;
use crate::error::LinstorError;
use crate::types::ResourceDefinition;

pub use cli::CliClient;
pub use memory::MemoryClient;

/// Operations the translation layer issues against a LINSTOR controller.
///
/// Implementations report failures as [`LinstorError::Backend`]; callers
/// propagate them without retrying.
#[async_trait]
pub trait LinstorClient: Send + Sync {
    /// Create the resource and volume definitions described by `cfg`, then
    /// place it: auto-placement, diskful `node_list`, diskless `client_list`.
    async fn create_and_assign(&self, cfg: &DeploymentConfig) -> Result<(), LinstorError>;

    /// Delete the resource definition and every resource placed from it.
    async fn delete(&self, cfg: &DeploymentConfig) -> Result<(), LinstorError>;

    /// Place an existing resource on the nodes named in `cfg`.
    async fn assign(&self, cfg: &DeploymentConfig) -> Result<(), LinstorError>;

    /// Remove the resource from `node`.
    async fn unassign(&self, cfg: &DeploymentConfig, node: &str) -> Result<(), LinstorError>;

    /// Every resource definition known to the controller.
    async fn list_resource_definitions(&self) -> Result<Vec<ResourceDefinition>, LinstorError>;

    /// Block device path of the resource on `node`.
    ///
    /// With `diskful` set, a diskless placement is an error.
    async fn dev_path(
        &self,
        cfg: &DeploymentConfig,
        node: &str,
        diskful: bool,
    ) -> Result<String, LinstorError>;
}

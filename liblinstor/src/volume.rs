//! Volume service traits.
//!
//! These are the seams a CSI driver calls into. The controller side uses
//! [`VolumeQuerier`] and [`VolumeProvisioner`], the node side
//! [`VolumeAttacher`] and [`VolumeMounter`]. [`crate::store::VolumeStore`]
//! implements all four against a LINSTOR controller.

use async_trait::async_trait;

use crate::error::LinstorError;
use crate::types::{Assignment, Volume};

/// Read-only volume lookups.
///
/// Absence is not an error: lookups return `Ok(None)`.
#[async_trait]
pub trait VolumeQuerier: Send + Sync {
    /// Every volume created by this driver.
    async fn list_all(&self) -> Result<Vec<Volume>, LinstorError>;

    /// Look a volume up by the name its creator gave it.
    async fn get_by_name(&self, name: &str) -> Result<Option<Volume>, LinstorError>;

    /// Look a volume up by its ID (the backend resource name).
    async fn get_by_id(&self, id: &str) -> Result<Option<Volume>, LinstorError>;
}

/// Volume creation and deletion.
#[async_trait]
pub trait VolumeProvisioner: VolumeQuerier {
    /// A legal, currently unused resource name derived from `suggested`.
    async fn canonicalize_volume_name(&self, suggested: &str) -> String;

    /// Smallest KiB allocation satisfying `required_bytes` within
    /// `limit_bytes` (`0` = unlimited).
    fn allocation_size_kib(
        &self,
        required_bytes: i64,
        limit_bytes: i64,
    ) -> Result<i64, LinstorError>;

    /// Create the backing resource and place its replicas.
    async fn create(&self, volume: &Volume) -> Result<(), LinstorError>;

    /// Delete the backing resource.
    async fn delete(&self, volume: &Volume) -> Result<(), LinstorError>;
}

/// Making volumes available on nodes.
#[async_trait]
pub trait VolumeAttacher: Send + Sync {
    /// Add a diskless client of `volume` on `node`.
    async fn attach(&self, volume: &Volume, node: &str) -> Result<(), LinstorError>;

    /// Remove `volume` from `node`.
    async fn detach(&self, volume: &Volume, node: &str) -> Result<(), LinstorError>;

    /// Whether `node` can currently receive volumes.
    async fn node_available(&self, node: &str) -> Result<bool, LinstorError>;

    /// The device `volume` is reachable through on `node`.
    async fn get_assignment_on_node(
        &self,
        volume: &Volume,
        node: &str,
    ) -> Result<Option<Assignment>, LinstorError>;
}

/// Node-local filesystem handling.
#[async_trait]
pub trait VolumeMounter: Send + Sync {
    /// Format `source` if needed and mount it at `target`.
    ///
    /// Volume parameters may override `fs_type` and extend `options`.
    async fn mount(
        &self,
        volume: &Volume,
        source: &str,
        target: &str,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), LinstorError>;

    /// Unmount `target`.
    async fn unmount(&self, target: &str) -> Result<(), LinstorError>;
}

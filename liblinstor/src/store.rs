//! Volume store: the volume services implemented against LINSTOR.
//!
//! [`VolumeStore`] holds no volume state of its own. Every lookup lists the
//! controller's resource definitions and decodes their annotations, every
//! mutation is a translated [`DeploymentConfig`] handed to the controller
//! client. Calls for different volumes may run concurrently; calls for the
//! same volume are not serialized here.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{Span, debug, info, info_span, warn};

use crate::capacity;
use crate::client::LinstorClient;
use crate::codec;
use crate::config::LinstorConfig;
use crate::deployment::{DeploymentConfig, FS_KEY, FS_OPTS_KEY, MOUNT_OPTS_KEY};
use crate::error::LinstorError;
use crate::filesystem::Filesystem;
use crate::name;
use crate::types::{Assignment, Volume};
use crate::volume::{VolumeAttacher, VolumeMounter, VolumeProvisioner, VolumeQuerier};

/// Filesystem used when neither the volume nor the caller names one.
pub const DEFAULT_FS_TYPE: &str = "ext4";

/// Volume services backed by a LINSTOR controller client `C` and a local
/// filesystem helper `F`.
pub struct VolumeStore<C, F> {
    client: C,
    filesystem: F,
    annotations_key: String,
    fallback_prefix: String,
    /// Source of randomly generated fallback names.
    rng: Mutex<StdRng>,
    /// Parent of every event this store emits.
    span: Span,
}

impl<C, F> VolumeStore<C, F>
where
    C: LinstorClient,
    F: Filesystem,
{
    /// Create a store using the annotation key and fallback prefix from
    /// `config`.
    ///
    /// Events are emitted under a `linstor_csi` span carrying the
    /// annotation key and controllers; use [`Self::with_span`] to supply a
    /// different one.
    ///
    /// Fails with [`LinstorError::Config`] when `config` does not validate,
    /// e.g. a fallback prefix that cannot produce legal names.
    pub fn new(client: C, filesystem: F, config: &LinstorConfig) -> Result<Self, LinstorError> {
        config.validate()?;
        let span = info_span!(
            "linstor_csi",
            component = "client",
            annotations_key = %config.annotations_key,
            controllers = %config.controllers,
        );
        Ok(Self {
            client,
            filesystem,
            annotations_key: config.annotations_key.clone(),
            fallback_prefix: config.fallback_prefix.clone(),
            rng: Mutex::new(StdRng::from_os_rng()),
            span,
        })
    }

    /// Replace the span events are attached to.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    /// Replace the random source used for fallback names.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn filesystem(&self) -> &F {
        &self.filesystem
    }

    /// Translate `volume` with this store's annotation key.
    pub fn deployment_config(&self, volume: &Volume) -> Result<DeploymentConfig, LinstorError> {
        DeploymentConfig::from_volume(volume, &self.annotations_key)
    }

    fn fallback_name(&self) -> String {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        name::fallback_name(&self.fallback_prefix, &mut *rng)
    }

    /// Whether `name` is taken, either as a resource definition name or as
    /// the ID recorded in some volume annotation.
    ///
    /// Stricter than [`VolumeQuerier::get_by_id`]: a definition without our
    /// annotation makes `get_by_id` return `None`, but its name still counts
    /// as taken here since the controller would refuse to create it again.
    async fn name_in_use(&self, name: &str) -> Result<bool, LinstorError> {
        for rd in self.client.list_resource_definitions().await? {
            if rd.name == name {
                return Ok(true);
            }
            if let Some(vol) = codec::decode(&rd, &self.annotations_key)?
                && vol.id == name
            {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait]
impl<C, F> VolumeQuerier for VolumeStore<C, F>
where
    C: LinstorClient,
    F: Filesystem,
{
    async fn list_all(&self) -> Result<Vec<Volume>, LinstorError> {
        let mut volumes = Vec::new();
        for rd in self.client.list_resource_definitions().await? {
            if let Some(vol) = codec::decode(&rd, &self.annotations_key)? {
                volumes.push(vol);
            }
        }
        debug!(parent: &self.span, count = volumes.len(), "listed volumes");
        Ok(volumes)
    }

    async fn get_by_name(&self, name: &str) -> Result<Option<Volume>, LinstorError> {
        debug!(parent: &self.span, csi_volume_name = name, "looking up resource by CSI volume name");

        let renamed = format!("{}{name}", self.fallback_prefix);
        for rd in self.client.list_resource_definitions().await? {
            // Definitions without our annotation belong to someone else.
            let Some(vol) = codec::decode(&rd, &self.annotations_key)? else {
                continue;
            };
            if vol.name == name || vol.name == renamed {
                debug!(parent: &self.span, resource = %rd.name, volume = %vol, "found volume by name");
                return Ok(Some(vol));
            }
        }
        Ok(None)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Volume>, LinstorError> {
        debug!(parent: &self.span, csi_volume_id = id, "looking up resource by CSI volume ID");

        for rd in self.client.list_resource_definitions().await? {
            let vol = codec::decode(&rd, &self.annotations_key)?;
            if rd.name == id {
                return Ok(vol);
            }
            if let Some(vol) = vol
                && vol.id == id
            {
                return Ok(Some(vol));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<C, F> VolumeProvisioner for VolumeStore<C, F>
where
    C: LinstorClient,
    F: Filesystem,
{
    async fn canonicalize_volume_name(&self, suggested: &str) -> String {
        let name = match name::canonicalize(suggested) {
            Ok(name) => name,
            Err(e) => {
                let fallback = self.fallback_name();
                debug!(parent: &self.span, suggested, %fallback, error = %e, "no canonical name, using random name");
                return fallback;
            }
        };

        // Someone else (another user or plugin) may already own this name.
        match self.name_in_use(&name).await {
            Ok(false) => name,
            Ok(true) => {
                let fallback = self.fallback_name();
                info!(parent: &self.span, suggested, canonical = %name, %fallback, "canonical name taken, using random name");
                fallback
            }
            Err(e) => {
                let fallback = self.fallback_name();
                warn!(parent: &self.span, suggested, %fallback, error = %e, "could not check name availability, using random name");
                fallback
            }
        }
    }

    fn allocation_size_kib(
        &self,
        required_bytes: i64,
        limit_bytes: i64,
    ) -> Result<i64, LinstorError> {
        capacity::allocation_size_kib(required_bytes, limit_bytes)
    }

    async fn create(&self, volume: &Volume) -> Result<(), LinstorError> {
        info!(parent: &self.span, volume = ?volume, "creating volume");
        name::validate(&volume.id)?;
        let cfg = self.deployment_config(volume)?;
        self.client.create_and_assign(&cfg).await
    }

    async fn delete(&self, volume: &Volume) -> Result<(), LinstorError> {
        info!(parent: &self.span, volume = ?volume, "deleting volume");
        let cfg = self.deployment_config(volume)?;
        self.client.delete(&cfg).await
    }
}

#[async_trait]
impl<C, F> VolumeAttacher for VolumeStore<C, F>
where
    C: LinstorClient,
    F: Filesystem,
{
    async fn attach(&self, volume: &Volume, node: &str) -> Result<(), LinstorError> {
        info!(parent: &self.span, volume = ?volume, target_node = node, "attaching volume");
        let cfg = self.deployment_config(volume)?.diskless_on(node);
        self.client.assign(&cfg).await
    }

    async fn detach(&self, volume: &Volume, node: &str) -> Result<(), LinstorError> {
        info!(parent: &self.span, volume = ?volume, target_node = node, "detaching volume");
        let cfg = self.deployment_config(volume)?;
        self.client.unassign(&cfg, node).await
    }

    async fn node_available(&self, node: &str) -> Result<bool, LinstorError> {
        // Cluster membership is the controller's business; every node is
        // reported as available.
        debug!(parent: &self.span, node, "node availability requested");
        Ok(true)
    }

    async fn get_assignment_on_node(
        &self,
        volume: &Volume,
        node: &str,
    ) -> Result<Option<Assignment>, LinstorError> {
        debug!(parent: &self.span, volume = ?volume, target_node = node, "getting assignment info");
        let cfg = self.deployment_config(volume)?;
        let path = self.client.dev_path(&cfg, node, false).await?;

        let assignment = Assignment {
            volume: volume.clone(),
            node: node.to_owned(),
            path,
        };
        debug!(parent: &self.span, volume_assignment = ?assignment, "found assignment info");
        Ok(Some(assignment))
    }
}

#[async_trait]
impl<C, F> VolumeMounter for VolumeStore<C, F>
where
    C: LinstorClient,
    F: Filesystem,
{
    async fn mount(
        &self,
        volume: &Volume,
        source: &str,
        target: &str,
        fs_type: &str,
        options: &[String],
    ) -> Result<(), LinstorError> {
        info!(parent: &self.span, volume = ?volume, source, target, "mounting volume");

        // Options from the caller first, then the storage class ones.
        let mut opts: Vec<&str> = options
            .iter()
            .map(String::as_str)
            .filter(|o| !o.is_empty())
            .collect();
        if let Some(extra) = volume.parameters.get(MOUNT_OPTS_KEY)
            && !extra.is_empty()
        {
            opts.push(extra.as_str());
        }
        let mount_opts = opts.join(",");

        // A filesystem named by the volume parameters beats the caller's.
        let fs_type = volume
            .parameter(FS_KEY)
            .filter(|f| !f.is_empty())
            .or(Some(fs_type).filter(|f| !f.is_empty()))
            .unwrap_or(DEFAULT_FS_TYPE);
        let fs_opts = volume
            .parameters
            .get(FS_OPTS_KEY)
            .map(String::as_str)
            .unwrap_or_default();

        debug!(parent: &self.span, fs_type, fs_opts, mount_opts = %mount_opts, "configured mounter");

        self.filesystem.safe_format(source, fs_type, fs_opts).await?;
        self.filesystem
            .mount(source, target, fs_type, &mount_opts)
            .await
    }

    async fn unmount(&self, target: &str) -> Result<(), LinstorError> {
        info!(parent: &self.span, target, "unmounting volume");
        self.filesystem.unmount(target).await
    }
}

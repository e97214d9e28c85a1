//! In-process LINSTOR controller.
//!
//! [`MemoryClient`] keeps resource definitions and their placements in
//! concurrent maps, allocating DRBD minors as definitions are created. It
//! implements enough controller behaviour (duplicate detection,
//! auto-placement over a fixed node set, diskless clients, device paths) to
//! exercise the volume store without a cluster.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, info, instrument};

use super::LinstorClient;
use crate::codec;
use crate::deployment::DeploymentConfig;
use crate::error::LinstorError;
use crate::types::{Property, ResourceDefinition};

/// First DRBD minor handed out.
const FIRST_MINOR: u32 = 1000;

/// How a resource is placed on a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Local replica with backing storage.
    Diskful,
    /// Client attached over the network, no local storage.
    Diskless,
}

#[derive(Debug, Clone)]
struct MemoryResource {
    props: Vec<Property>,
    placements: BTreeMap<String, Placement>,
    minor: u32,
}

/// A LINSTOR controller held entirely in memory.
///
/// # Thread safety
///
/// State lives in a [`DashMap`] keyed by resource name, so concurrent calls
/// for different resources do not contend.
pub struct MemoryClient {
    /// Satellites available for auto-placement, in preference order.
    nodes: Vec<String>,
    resources: DashMap<String, MemoryResource>,
    next_minor: AtomicU32,
}

impl MemoryClient {
    /// Create a controller whose auto-placer chooses from `nodes`.
    pub fn new<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            resources: DashMap::new(),
            next_minor: AtomicU32::new(FIRST_MINOR),
        }
    }

    /// Register a resource definition that was not created through this
    /// crate, e.g. one owned by another tool.
    pub fn define_raw(&self, definition: ResourceDefinition) {
        let minor = self.next_minor.fetch_add(1, Ordering::Relaxed);
        self.resources.insert(
            definition.name,
            MemoryResource {
                props: definition.props,
                placements: BTreeMap::new(),
                minor,
            },
        );
    }

    /// `true` if a resource definition named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.resources.contains_key(name)
    }

    /// Current placements of `name`, keyed by node.
    pub fn placements(&self, name: &str) -> Option<BTreeMap<String, Placement>> {
        self.resources.get(name).map(|r| r.placements.clone())
    }

    /// Apply the placement part of `cfg` to `resource`.
    fn place(&self, resource: &mut MemoryResource, cfg: &DeploymentConfig) -> Result<(), LinstorError> {
        if cfg.auto_place > 0 {
            let wanted = usize::try_from(cfg.auto_place).map_err(LinstorError::backend)?;
            let candidates: Vec<&String> = self
                .nodes
                .iter()
                .filter(|n| !resource.placements.contains_key(*n))
                .take(wanted)
                .collect();
            if candidates.len() < wanted {
                return Err(LinstorError::Backend(format!(
                    "not enough satellites to auto-place {} replicas of {} ({} available)",
                    wanted,
                    cfg.name,
                    candidates.len()
                )));
            }
            for node in candidates {
                resource.placements.insert(node.clone(), Placement::Diskful);
            }
        }

        for node in &cfg.node_list {
            resource.placements.insert(node.clone(), Placement::Diskful);
        }
        for node in &cfg.client_list {
            resource
                .placements
                .entry(node.clone())
                .or_insert(Placement::Diskless);
        }
        Ok(())
    }
}

#[async_trait]
impl LinstorClient for MemoryClient {
    #[instrument(skip(self, cfg), fields(resource = %cfg.name))]
    async fn create_and_assign(&self, cfg: &DeploymentConfig) -> Result<(), LinstorError> {
        let mut resource = MemoryResource {
            props: cfg
                .annotations
                .iter()
                .map(|(k, v)| Property::new(codec::property_key(k), v))
                .collect(),
            placements: BTreeMap::new(),
            minor: 0,
        };
        self.place(&mut resource, cfg)?;

        match self.resources.entry(cfg.name.clone()) {
            Entry::Occupied(_) => Err(LinstorError::Backend(format!(
                "resource definition {} already exists",
                cfg.name
            ))),
            Entry::Vacant(slot) => {
                resource.minor = self.next_minor.fetch_add(1, Ordering::Relaxed);
                info!(minor = resource.minor, nodes = resource.placements.len(), "resource created");
                slot.insert(resource);
                Ok(())
            }
        }
    }

    #[instrument(skip(self, cfg), fields(resource = %cfg.name))]
    async fn delete(&self, cfg: &DeploymentConfig) -> Result<(), LinstorError> {
        if self.resources.remove(&cfg.name).is_none() {
            debug!("resource definition already gone");
        }
        Ok(())
    }

    #[instrument(skip(self, cfg), fields(resource = %cfg.name))]
    async fn assign(&self, cfg: &DeploymentConfig) -> Result<(), LinstorError> {
        let mut resource = self.resources.get_mut(&cfg.name).ok_or_else(|| {
            LinstorError::Backend(format!("resource definition {} not found", cfg.name))
        })?;
        self.place(&mut resource, cfg)
    }

    #[instrument(skip(self, cfg), fields(resource = %cfg.name))]
    async fn unassign(&self, cfg: &DeploymentConfig, node: &str) -> Result<(), LinstorError> {
        let mut resource = self.resources.get_mut(&cfg.name).ok_or_else(|| {
            LinstorError::Backend(format!("resource definition {} not found", cfg.name))
        })?;
        if resource.placements.remove(node).is_none() {
            debug!(node, "resource not placed on node, nothing to unassign");
        }
        Ok(())
    }

    async fn list_resource_definitions(&self) -> Result<Vec<ResourceDefinition>, LinstorError> {
        let mut list: Vec<ResourceDefinition> = self
            .resources
            .iter()
            .map(|entry| ResourceDefinition::new(entry.key().clone(), entry.value().props.clone()))
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(list)
    }

    #[instrument(skip(self, cfg), fields(resource = %cfg.name))]
    async fn dev_path(
        &self,
        cfg: &DeploymentConfig,
        node: &str,
        diskful: bool,
    ) -> Result<String, LinstorError> {
        let resource = self.resources.get(&cfg.name).ok_or_else(|| {
            LinstorError::Backend(format!("resource definition {} not found", cfg.name))
        })?;
        match resource.placements.get(node) {
            None => Err(LinstorError::Backend(format!(
                "resource {} is not deployed on node {node}",
                cfg.name
            ))),
            Some(Placement::Diskless) if diskful => Err(LinstorError::Backend(format!(
                "resource {} is diskless on node {node}",
                cfg.name
            ))),
            Some(_) => Ok(format!("/dev/drbd{}", resource.minor)),
        }
    }
}

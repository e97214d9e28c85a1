//! Volume to resource-deployment translation.
//!
//! [`DeploymentConfig::from_volume`] turns a [`Volume`] and its parameter
//! map into the configuration a LINSTOR controller client needs to create,
//! place, attach or delete the backing resource. The serialized volume rides
//! along as an annotation so it can be recovered later (see [`crate::codec`]).
//!
//! Parameter keys are matched case-insensitively. Keys that are not
//! recognized are ignored rather than rejected, so storage classes written
//! for newer or environment-specific drivers keep working.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::capacity;
use crate::codec;
use crate::error::LinstorError;
use crate::types::Volume;

// ---------------------------------------------------------------------------
// Parameter keys
// ---------------------------------------------------------------------------

pub const NODE_LIST_KEY: &str = "nodelist";
pub const LAYER_LIST_KEY: &str = "layerlist";
pub const CLIENT_LIST_KEY: &str = "clientlist";
pub const REPLICAS_ON_SAME_KEY: &str = "replicasonsame";
pub const REPLICAS_ON_DIFFERENT_KEY: &str = "replicasondifferent";
pub const AUTO_PLACE_KEY: &str = "autoplace";
pub const DO_NOT_PLACE_WITH_REGEX_KEY: &str = "donotplacewithregex";
pub const SIZE_KIB_KEY: &str = "sizekib";
pub const STORAGE_POOL_KEY: &str = "storagepool";
pub const DISKLESS_STORAGE_POOL_KEY: &str = "disklessstoragepool";
pub const ENCRYPTION_KEY: &str = "encryption";
pub const BLOCK_SIZE_KEY: &str = "blocksize";
pub const FORCE_KEY: &str = "force";
pub const FS_KEY: &str = "filesystem";

// Consumed at mount time only, and looked up with their exact spelling.
pub const MOUNT_OPTS_KEY: &str = "mountOpts";
pub const FS_OPTS_KEY: &str = "fsOpts";

/// Backend-facing configuration derived from a [`Volume`].
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DeploymentConfig {
    /// LINSTOR resource name; the volume ID.
    pub name: String,
    /// Volume definition size in KiB.
    pub size_kib: u64,
    /// Nodes that receive a diskful replica.
    pub node_list: Vec<String>,
    /// Nodes that receive a diskless client.
    pub client_list: Vec<String>,
    /// Storage layer stack, top to bottom (e.g. `drbd storage`).
    pub layer_list: Vec<String>,
    /// Auto-placement: replicas must share these node properties.
    pub replicas_on_same: Vec<String>,
    /// Auto-placement: replicas must differ in these node properties.
    pub replicas_on_different: Vec<String>,
    /// Storage pool for diskful replicas.
    pub storage_pool: String,
    /// Storage pool for diskless clients.
    pub diskless_storage_pool: String,
    /// Number of replicas to auto-place; `0` disables auto-placement.
    pub auto_place: u64,
    /// Do not place on nodes already holding resources matching this regex.
    pub do_not_place_with_regex: String,
    /// Whether the volume definition is encrypted.
    pub encryption: bool,
    /// Annotations stored as `Aux/` properties on the resource definition.
    pub annotations: BTreeMap<String, String>,
}

impl DeploymentConfig {
    /// Translate `volume` into a deployment configuration.
    ///
    /// `volume.id` must already be a legal resource name; canonicalization
    /// happens earlier in the creation path. The whole volume, parameters
    /// included, is embedded under `annotations_key`.
    pub fn from_volume(volume: &Volume, annotations_key: &str) -> Result<Self, LinstorError> {
        let mut cfg = Self {
            name: volume.id.clone(),
            size_kib: capacity::deployment_size_kib(volume.size_bytes),
            ..Default::default()
        };

        for (key, value) in &volume.parameters {
            cfg.apply_parameter(key, value)?;
        }

        cfg.annotations
            .insert(annotations_key.to_owned(), codec::encode(volume)?);
        Ok(cfg)
    }

    fn apply_parameter(&mut self, key: &str, value: &str) -> Result<(), LinstorError> {
        match key.to_ascii_lowercase().as_str() {
            NODE_LIST_KEY => self.node_list = split_list(value),
            LAYER_LIST_KEY => self.layer_list = split_list(value),
            CLIENT_LIST_KEY => self.client_list = split_list(value),
            REPLICAS_ON_SAME_KEY => self.replicas_on_same = split_list(value),
            REPLICAS_ON_DIFFERENT_KEY => self.replicas_on_different = split_list(value),
            STORAGE_POOL_KEY => self.storage_pool = value.to_owned(),
            DISKLESS_STORAGE_POOL_KEY => self.diskless_storage_pool = value.to_owned(),
            AUTO_PLACE_KEY => self.auto_place = parse_auto_place(key, value)?,
            DO_NOT_PLACE_WITH_REGEX_KEY => self.do_not_place_with_regex = value.to_owned(),
            ENCRYPTION_KEY => self.encryption = value.eq_ignore_ascii_case("true"),
            // Recognized elsewhere or not at all; never an error.
            _ => {}
        }
        Ok(())
    }

    /// Reshape the configuration so that applying it only adds a diskless
    /// client on `node`: no diskful nodes, no auto-placement.
    pub fn diskless_on(mut self, node: &str) -> Self {
        self.node_list.clear();
        self.auto_place = 0;
        self.client_list = vec![node.to_owned()];
        self
    }
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_owned).collect()
}

fn parse_auto_place(key: &str, value: &str) -> Result<u64, LinstorError> {
    if value.is_empty() {
        return Ok(0);
    }
    value.parse().map_err(|e| LinstorError::InvalidParameter {
        key: key.to_owned(),
        value: value.to_owned(),
        reason: format!("unable to parse as an unsigned integer: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::DEFAULT_ANNOTATIONS_KEY;
    use crate::types::{Property, ResourceDefinition};

    fn translate(vol: &Volume) -> Result<DeploymentConfig, LinstorError> {
        DeploymentConfig::from_volume(vol, DEFAULT_ANNOTATIONS_KEY)
    }

    #[test]
    fn bare_volume() {
        let vol = Volume::new("pvc-1", "pvc-1", 1024 * 1024);
        let cfg = translate(&vol).unwrap();
        assert_eq!(cfg.name, "pvc-1");
        assert_eq!(cfg.size_kib, 1025);
        assert_eq!(cfg.auto_place, 0);
        assert!(!cfg.encryption);
        assert!(cfg.node_list.is_empty());
        assert_eq!(cfg.annotations.len(), 1);
    }

    #[test]
    fn all_recognized_parameters() {
        let vol = Volume::new("res", "vol", 4096)
            .with_parameter("NodeList", "node-a node-b")
            .with_parameter("layerList", "drbd storage")
            .with_parameter("clientlist", "node-c")
            .with_parameter("replicasOnSame", "zone rack")
            .with_parameter("replicasOnDifferent", "room")
            .with_parameter("storagePool", "thin")
            .with_parameter("disklessStoragePool", "DfltDisklessStorPool")
            .with_parameter("autoPlace", "2")
            .with_parameter("doNotPlaceWithRegex", "^db-.*")
            .with_parameter("Encryption", "TRUE");

        let cfg = translate(&vol).unwrap();
        assert_eq!(cfg.node_list, ["node-a", "node-b"]);
        assert_eq!(cfg.layer_list, ["drbd", "storage"]);
        assert_eq!(cfg.client_list, ["node-c"]);
        assert_eq!(cfg.replicas_on_same, ["zone", "rack"]);
        assert_eq!(cfg.replicas_on_different, ["room"]);
        assert_eq!(cfg.storage_pool, "thin");
        assert_eq!(cfg.diskless_storage_pool, "DfltDisklessStorPool");
        assert_eq!(cfg.auto_place, 2);
        assert_eq!(cfg.do_not_place_with_regex, "^db-.*");
        assert!(cfg.encryption);
    }

    #[test]
    fn list_tokens_ignore_repeated_spaces() {
        let vol = Volume::new("res", "vol", 0).with_parameter("nodelist", " a  b ");
        assert_eq!(translate(&vol).unwrap().node_list, ["a", "b"]);
    }

    #[test]
    fn unknown_parameters_are_ignored() {
        let vol = Volume::new("res", "vol", 0)
            .with_parameter("csi.storage.k8s.io/fstype", "ext4")
            .with_parameter("sizekib", "not-a-number")
            .with_parameter("force", "yes");
        let cfg = translate(&vol).unwrap();
        assert_eq!(
            cfg,
            DeploymentConfig {
                name: "res".into(),
                size_kib: 1,
                annotations: cfg.annotations.clone(),
                ..Default::default()
            }
        );
    }

    #[test]
    fn empty_auto_place_defaults_to_zero() {
        let vol = Volume::new("res", "vol", 0).with_parameter("autoplace", "");
        assert_eq!(translate(&vol).unwrap().auto_place, 0);
    }

    #[test]
    fn non_numeric_auto_place_is_rejected() {
        for bad in ["three", "-1", "2.5"] {
            let vol = Volume::new("res", "vol", 0).with_parameter("AutoPlace", bad);
            match translate(&vol) {
                Err(LinstorError::InvalidParameter { key, value, .. }) => {
                    assert_eq!(key, "AutoPlace");
                    assert_eq!(value, bad);
                }
                other => panic!("expected InvalidParameter, got {other:?}"),
            }
        }
    }

    #[test]
    fn encryption_requires_true() {
        for (value, expected) in [("true", true), ("True", true), ("yes", false), ("1", false)] {
            let vol = Volume::new("res", "vol", 0).with_parameter("encryption", value);
            assert_eq!(translate(&vol).unwrap().encryption, expected, "{value}");
        }
    }

    #[test]
    fn annotation_roundtrips_through_codec() {
        let vol = Volume::new("res", "original name", 123_456)
            .with_parameter("autoplace", "1")
            .with_parameter("fsOpts", "-E nodiscard");
        let cfg = translate(&vol).unwrap();

        let props = cfg
            .annotations
            .iter()
            .map(|(k, v)| Property::new(codec::property_key(k), v))
            .collect();
        let rd = ResourceDefinition::new(cfg.name.clone(), props);
        assert_eq!(
            codec::decode(&rd, DEFAULT_ANNOTATIONS_KEY).unwrap(),
            Some(vol)
        );
    }

    #[test]
    fn diskless_on_clears_placement() {
        let vol = Volume::new("res", "vol", 0)
            .with_parameter("nodelist", "a b")
            .with_parameter("clientlist", "c")
            .with_parameter("autoplace", "2")
            .with_parameter("storagepool", "thin");
        let cfg = translate(&vol).unwrap().diskless_on("node-x");
        assert!(cfg.node_list.is_empty());
        assert_eq!(cfg.auto_place, 0);
        assert_eq!(cfg.client_list, ["node-x"]);
        assert_eq!(cfg.storage_pool, "thin");
    }
}

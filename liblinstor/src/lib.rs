//! # liblinstor: CSI volumes on LINSTOR
//!
//! `liblinstor` is the translation layer between a CSI driver's view of a
//! volume (ID, name, size, free-form parameters) and the resource
//! definitions a [LINSTOR][linstor] controller manages. Volumes are not
//! stored anywhere else: each one is serialized into an auxiliary property
//! of its resource definition and recovered by listing the controller.
//!
//! ## Module overview
//!
//! | Module | Purpose |
//! |---|---|
//! | [`types`] | Data model: `Volume`, `Assignment`, resource definitions. |
//! | [`error`] | [`LinstorError`] enum covering all failure modes. |
//! | [`name`] | Resource name grammar, canonicalization, fallback names. |
//! | [`capacity`] | KiB allocation planning. |
//! | [`deployment`] | Volume parameters to [`DeploymentConfig`]. |
//! | [`codec`] | Volume annotations on resource definitions. |
//! | [`client`] | [`LinstorClient`] trait, CLI and in-memory controllers. |
//! | [`filesystem`] | Format, mount and unmount on the node. |
//! | [`volume`] | Volume service traits. |
//! | [`store`] | [`VolumeStore`], the service traits over a client. |
//! | [`config`] | Layered driver configuration. |
//! | [`logging`] | `tracing` subscriber setup for binaries. |
//!
//! [linstor]: https://linbit.com/linstor/

pub mod capacity;
pub mod client;
pub mod codec;
pub mod config;
pub mod deployment;
pub mod error;
pub mod filesystem;
pub mod logging;
pub mod name;
pub mod store;
pub mod types;
pub mod volume;

pub use client::{CliClient, LinstorClient, MemoryClient};
pub use config::LinstorConfig;
pub use deployment::DeploymentConfig;
pub use error::LinstorError;
pub use filesystem::{Filesystem, HostFilesystem};
pub use store::VolumeStore;
pub use types::*;
pub use volume::{VolumeAttacher, VolumeMounter, VolumeProvisioner, VolumeQuerier};

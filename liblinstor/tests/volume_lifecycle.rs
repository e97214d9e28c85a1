//! Full volume lifecycle through the public API against the in-memory
//! controller.

use async_trait::async_trait;
use liblinstor::{
    Filesystem, LinstorConfig, LinstorError, MemoryClient, Volume, VolumeAttacher, VolumeMounter,
    VolumeProvisioner, VolumeQuerier, VolumeStore,
};

/// Filesystem that accepts everything; mounting is covered by unit tests.
struct NoopFilesystem;

#[async_trait]
impl Filesystem for NoopFilesystem {
    async fn safe_format(&self, _: &str, _: &str, _: &str) -> Result<(), LinstorError> {
        Ok(())
    }

    async fn mount(&self, _: &str, _: &str, _: &str, _: &str) -> Result<(), LinstorError> {
        Ok(())
    }

    async fn unmount(&self, _: &str) -> Result<(), LinstorError> {
        Ok(())
    }
}

#[tokio::test]
async fn provision_attach_mount_and_delete() {
    let config = LinstorConfig::from_yaml("annotations_key: test-annotations\n").unwrap();
    let store = VolumeStore::new(
        MemoryClient::new(["node-a", "node-b", "node-c"]),
        NoopFilesystem,
        &config,
    )
    .unwrap();

    // Provisioning: name, size, create.
    let id = store.canonicalize_volume_name("pvc.0b7e").await;
    assert_eq!(id, "pvc_0b7e");
    let kib = store.allocation_size_kib(10 << 20, 0).unwrap();
    assert_eq!(kib, 10 * 1024);

    let volume = Volume::new(id.clone(), "pvc.0b7e", kib * 1024)
        .with_parameter("autoplace", "2")
        .with_parameter("storagePool", "thin")
        .with_parameter("filesystem", "xfs");
    store.create(&volume).await.unwrap();

    // The same suggestion now collides and gets a random name.
    let second = store.canonicalize_volume_name("pvc.0b7e").await;
    assert_ne!(second, id);
    assert!(second.starts_with("csi-"));

    assert_eq!(store.get_by_name("pvc.0b7e").await.unwrap(), Some(volume.clone()));
    assert_eq!(store.get_by_id(&id).await.unwrap(), Some(volume.clone()));
    assert_eq!(store.list_all().await.unwrap(), vec![volume.clone()]);

    // Node side.
    assert!(store.node_available("node-z").await.unwrap());
    store.attach(&volume, "node-z").await.unwrap();
    let assignment = store
        .get_assignment_on_node(&volume, "node-z")
        .await
        .unwrap()
        .expect("assignment");
    assert_eq!(assignment.node, "node-z");
    store
        .mount(&volume, &assignment.path, "/mnt/pvc", "ext4", &[])
        .await
        .unwrap();
    store.unmount("/mnt/pvc").await.unwrap();
    store.detach(&volume, "node-z").await.unwrap();

    // Teardown.
    store.delete(&volume).await.unwrap();
    assert_eq!(store.get_by_id(&id).await.unwrap(), None);
    assert!(store.list_all().await.unwrap().is_empty());
}

#[tokio::test]
async fn oversized_request_reports_rounded_allocation() {
    let store = VolumeStore::new(
        MemoryClient::new(["node-a"]),
        NoopFilesystem,
        &LinstorConfig::default(),
    )
    .unwrap();
    let err = store.allocation_size_kib(5000, 4096).unwrap_err();
    assert!(err.is_capacity());
    assert_eq!(err.allocated_kib(), Some(5));
}

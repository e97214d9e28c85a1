//! LINSTOR client driven through the `linstor` command line tool.
//!
//! Every operation is translated into one or more invocations of
//! `linstor [--controllers <uris>] <command>`. Listings use the
//! machine-readable (`-m`) JSON output. Argument construction and output
//! parsing are plain functions so they can be checked without a cluster.

use std::process::Output;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, instrument};

use super::LinstorClient;
use crate::codec;
use crate::config::LinstorConfig;
use crate::deployment::DeploymentConfig;
use crate::error::LinstorError;
use crate::types::ResourceDefinition;

/// Resource flag LINSTOR sets on diskless placements.
const DISKLESS_FLAG: &str = "DISKLESS";

/// A [`LinstorClient`] that shells out to the `linstor` binary.
#[derive(Debug, Clone)]
pub struct CliClient {
    program: String,
    controllers: String,
}

impl CliClient {
    /// Client running `program` against `controllers` (comma separated
    /// URIs; empty lets the tool use its own default).
    pub fn new(program: impl Into<String>, controllers: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            controllers: controllers.into(),
        }
    }

    pub fn from_config(config: &LinstorConfig) -> Self {
        Self::new(&config.linstor_bin, &config.controllers)
    }

    fn command(&self, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.program);
        if !self.controllers.is_empty() {
            cmd.arg("--controllers").arg(&self.controllers);
        }
        cmd.args(args);
        cmd
    }

    /// Run one invocation, returning its stdout.
    async fn run(&self, args: &[String]) -> Result<String, LinstorError> {
        debug!(program = %self.program, ?args, "running linstor");
        let output = self.command(args).output().await.map_err(|e| {
            LinstorError::Backend(format!("failed to run {}: {e}", self.program))
        })?;
        check_output(&self.program, args, output)
    }

    async fn run_all(&self, commands: Vec<Vec<String>>) -> Result<(), LinstorError> {
        for args in commands {
            self.run(&args).await?;
        }
        Ok(())
    }
}

fn check_output(program: &str, args: &[String], output: Output) -> Result<String, LinstorError> {
    if !output.status.success() {
        return Err(LinstorError::Backend(format!(
            "`{program} {}` exited with {:?}: {}",
            args.join(" "),
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim(),
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[async_trait]
impl LinstorClient for CliClient {
    #[instrument(skip(self, cfg), fields(resource = %cfg.name))]
    async fn create_and_assign(&self, cfg: &DeploymentConfig) -> Result<(), LinstorError> {
        let mut commands = definition_commands(cfg);
        commands.extend(placement_commands(cfg));
        self.run_all(commands).await
    }

    #[instrument(skip(self, cfg), fields(resource = %cfg.name))]
    async fn delete(&self, cfg: &DeploymentConfig) -> Result<(), LinstorError> {
        self.run(&delete_command(cfg)).await.map(drop)
    }

    #[instrument(skip(self, cfg), fields(resource = %cfg.name))]
    async fn assign(&self, cfg: &DeploymentConfig) -> Result<(), LinstorError> {
        self.run_all(placement_commands(cfg)).await
    }

    #[instrument(skip(self, cfg), fields(resource = %cfg.name))]
    async fn unassign(&self, cfg: &DeploymentConfig, node: &str) -> Result<(), LinstorError> {
        self.run(&unassign_command(cfg, node)).await.map(drop)
    }

    #[instrument(skip(self))]
    async fn list_resource_definitions(&self) -> Result<Vec<ResourceDefinition>, LinstorError> {
        let out = self
            .run(&args(["-m", "resource-definition", "list"]))
            .await?;
        parse_resource_definitions(&out)
    }

    #[instrument(skip(self, cfg), fields(resource = %cfg.name))]
    async fn dev_path(
        &self,
        cfg: &DeploymentConfig,
        node: &str,
        diskful: bool,
    ) -> Result<String, LinstorError> {
        let out = self
            .run(&args([
                "-m",
                "resource",
                "list-volumes",
                "--nodes",
                node,
                "--resources",
                &cfg.name,
            ]))
            .await?;
        parse_dev_path(&out, &cfg.name, node, diskful)
    }
}

// ---------------------------------------------------------------------------
// Argument construction
// ---------------------------------------------------------------------------

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|s| (*s).to_owned()).collect()
}

/// Resource definition, volume definition and annotation properties.
fn definition_commands(cfg: &DeploymentConfig) -> Vec<Vec<String>> {
    let mut rd = args(["resource-definition", "create", &cfg.name]);
    if !cfg.layer_list.is_empty() {
        rd.extend(["--layer-list".to_owned(), cfg.layer_list.join(",")]);
    }

    let mut vd = args(["volume-definition", "create"]);
    if cfg.encryption {
        vd.push("--encrypt".to_owned());
    }
    vd.extend([cfg.name.clone(), format!("{}KiB", cfg.size_kib)]);

    let mut commands = vec![rd, vd];
    for (key, value) in &cfg.annotations {
        commands.push(args([
            "resource-definition",
            "set-property",
            &cfg.name,
            &codec::property_key(key),
            value,
        ]));
    }
    commands
}

/// Auto-placement, explicit diskful nodes and diskless clients.
fn placement_commands(cfg: &DeploymentConfig) -> Vec<Vec<String>> {
    let mut commands = Vec::new();

    if cfg.auto_place > 0 {
        let mut cmd = args(["resource", "create", &cfg.name]);
        cmd.extend(["--auto-place".to_owned(), cfg.auto_place.to_string()]);
        if !cfg.storage_pool.is_empty() {
            cmd.extend(["--storage-pool".to_owned(), cfg.storage_pool.clone()]);
        }
        if !cfg.layer_list.is_empty() {
            cmd.extend(["--layer-list".to_owned(), cfg.layer_list.join(",")]);
        }
        if !cfg.do_not_place_with_regex.is_empty() {
            cmd.extend([
                "--do-not-place-with-regex".to_owned(),
                cfg.do_not_place_with_regex.clone(),
            ]);
        }
        if !cfg.replicas_on_same.is_empty() {
            cmd.push("--replicas-on-same".to_owned());
            cmd.extend(cfg.replicas_on_same.iter().cloned());
        }
        if !cfg.replicas_on_different.is_empty() {
            cmd.push("--replicas-on-different".to_owned());
            cmd.extend(cfg.replicas_on_different.iter().cloned());
        }
        commands.push(cmd);
    }

    for node in &cfg.node_list {
        let mut cmd = args(["resource", "create", node, &cfg.name]);
        if !cfg.storage_pool.is_empty() {
            cmd.extend(["--storage-pool".to_owned(), cfg.storage_pool.clone()]);
        }
        commands.push(cmd);
    }

    for node in &cfg.client_list {
        let mut cmd = args(["resource", "create", node, &cfg.name, "--diskless"]);
        if !cfg.diskless_storage_pool.is_empty() {
            cmd.extend([
                "--storage-pool".to_owned(),
                cfg.diskless_storage_pool.clone(),
            ]);
        }
        commands.push(cmd);
    }

    commands
}

fn delete_command(cfg: &DeploymentConfig) -> Vec<String> {
    args(["resource-definition", "delete", &cfg.name])
}

fn unassign_command(cfg: &DeploymentConfig, node: &str) -> Vec<String> {
    args(["resource", "delete", node, &cfg.name])
}

// ---------------------------------------------------------------------------
// Output parsing
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct DefinitionListing {
    #[serde(default)]
    rsc_dfns: Vec<ResourceDefinition>,
}

#[derive(Debug, Deserialize)]
struct ResourceListing {
    #[serde(default)]
    resources: Vec<ResourceEntry>,
}

#[derive(Debug, Deserialize)]
struct ResourceEntry {
    name: String,
    node_name: String,
    #[serde(default)]
    rsc_flags: Vec<String>,
    #[serde(default)]
    vlms: Vec<VolumeEntry>,
}

#[derive(Debug, Deserialize)]
struct VolumeEntry {
    #[serde(default)]
    device_path: String,
}

fn parse_resource_definitions(json: &str) -> Result<Vec<ResourceDefinition>, LinstorError> {
    let listings: Vec<DefinitionListing> = serde_json::from_str(json)
        .map_err(|e| LinstorError::Backend(format!("unparsable resource-definition list: {e}")))?;
    Ok(listings.into_iter().flat_map(|l| l.rsc_dfns).collect())
}

fn parse_dev_path(
    json: &str,
    resource: &str,
    node: &str,
    diskful: bool,
) -> Result<String, LinstorError> {
    let listings: Vec<ResourceListing> = serde_json::from_str(json)
        .map_err(|e| LinstorError::Backend(format!("unparsable volume list: {e}")))?;

    let entry = listings
        .into_iter()
        .flat_map(|l| l.resources)
        .find(|r| r.name == resource && r.node_name == node)
        .ok_or_else(|| {
            LinstorError::Backend(format!("resource {resource} is not deployed on node {node}"))
        })?;

    if diskful && entry.rsc_flags.iter().any(|f| f == DISKLESS_FLAG) {
        return Err(LinstorError::Backend(format!(
            "resource {resource} is diskless on node {node}"
        )));
    }

    entry
        .vlms
        .into_iter()
        .map(|v| v.device_path)
        .find(|p| !p.is_empty())
        .ok_or_else(|| {
            LinstorError::Backend(format!(
                "no device path reported for {resource} on node {node}"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn full_config() -> DeploymentConfig {
        DeploymentConfig {
            name: "pvc-1".into(),
            size_kib: 1025,
            node_list: vec!["n1".into()],
            client_list: vec!["n3".into()],
            layer_list: vec!["drbd".into(), "storage".into()],
            replicas_on_same: vec!["zone".into()],
            replicas_on_different: vec!["rack".into(), "room".into()],
            storage_pool: "thin".into(),
            diskless_storage_pool: "dless".into(),
            auto_place: 2,
            do_not_place_with_regex: "^db".into(),
            encryption: true,
            annotations: BTreeMap::from([("csi-volume-annotations".into(), "{}".into())]),
        }
    }

    fn joined(commands: &[Vec<String>]) -> Vec<String> {
        commands.iter().map(|c| c.join(" ")).collect()
    }

    #[test]
    fn definition_commands_cover_layers_encryption_and_annotations() {
        assert_eq!(
            joined(&definition_commands(&full_config())),
            [
                "resource-definition create pvc-1 --layer-list drbd,storage",
                "volume-definition create --encrypt pvc-1 1025KiB",
                "resource-definition set-property pvc-1 Aux/csi-volume-annotations {}",
            ]
        );
    }

    #[test]
    fn placement_commands_cover_every_placement_kind() {
        assert_eq!(
            joined(&placement_commands(&full_config())),
            [
                "resource create pvc-1 --auto-place 2 --storage-pool thin --layer-list drbd,storage \
                 --do-not-place-with-regex ^db --replicas-on-same zone --replicas-on-different rack room",
                "resource create n1 pvc-1 --storage-pool thin",
                "resource create n3 pvc-1 --diskless --storage-pool dless",
            ]
        );
    }

    #[test]
    fn attach_only_creates_the_client() {
        let cfg = full_config().diskless_on("n7");
        assert_eq!(
            joined(&placement_commands(&cfg)),
            ["resource create n7 pvc-1 --diskless --storage-pool dless"]
        );
    }

    #[test]
    fn delete_and_unassign_commands() {
        let cfg = full_config();
        assert_eq!(delete_command(&cfg).join(" "), "resource-definition delete pvc-1");
        assert_eq!(unassign_command(&cfg, "n3").join(" "), "resource delete n3 pvc-1");
    }

    #[test]
    fn parses_definition_listing() {
        let json = r#"[{"rsc_dfns":[
            {"rsc_name":"pvc-1","rsc_dfn_props":[{"key":"Aux/csi-volume-annotations","value":"{}"}]},
            {"rsc_name":"other"}
        ]}]"#;
        let list = parse_resource_definitions(json).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].prop("Aux/csi-volume-annotations"), Some("{}"));
        assert!(list[1].props.is_empty());
        assert!(parse_resource_definitions("not json").is_err());
    }

    #[test]
    fn parses_device_path() {
        let json = r#"[{"resources":[
            {"name":"pvc-1","node_name":"n1","vlms":[{"device_path":"/dev/drbd1000"}]},
            {"name":"pvc-1","node_name":"n3","rsc_flags":["DISKLESS"],"vlms":[{"device_path":"/dev/drbd1000"}]}
        ]}]"#;
        assert_eq!(parse_dev_path(json, "pvc-1", "n1", true).unwrap(), "/dev/drbd1000");
        assert_eq!(parse_dev_path(json, "pvc-1", "n3", false).unwrap(), "/dev/drbd1000");
        assert!(parse_dev_path(json, "pvc-1", "n3", true).is_err());
        assert!(parse_dev_path(json, "pvc-1", "n9", false).is_err());
    }

    #[tokio::test]
    async fn missing_binary_is_backend_error() {
        let client = CliClient::new("/nonexistent/linstor-for-test", "");
        let err = client.list_resource_definitions().await.unwrap_err();
        assert!(matches!(err, LinstorError::Backend(_)));
    }
}

//! Volume annotation codec.
//!
//! The full [`Volume`] record is serialized to JSON and stored on the
//! LINSTOR resource definition as an auxiliary property. That property is
//! the only place volume metadata is kept, so listing resource definitions
//! and decoding their annotations is how every lookup works.
//!
//! ```text
//! rsc_dfn_props:
//!   Aux/csi-volume-annotations = {"ID":"pvc-1","Name":"pvc-1","SizeBytes":1073741824,"Parameters":{...}}
//! ```

use crate::error::LinstorError;
use crate::types::{ResourceDefinition, Volume};

/// Default annotation key shared by the encode and decode paths.
pub const DEFAULT_ANNOTATIONS_KEY: &str = "csi-volume-annotations";

/// Namespace LINSTOR uses for user-defined properties.
pub const AUX_PREFIX: &str = "Aux/";

/// Property key under which an annotation with `annotations_key` is stored.
pub fn property_key(annotations_key: &str) -> String {
    format!("{AUX_PREFIX}{annotations_key}")
}

/// Serialize `volume` into its annotation string.
pub fn encode(volume: &Volume) -> Result<String, LinstorError> {
    serde_json::to_string(volume).map_err(LinstorError::internal)
}

/// Recover the [`Volume`] annotated on `resource`.
///
/// Returns `Ok(None)` when the definition carries no annotation: the
/// resource was not created by this driver. An annotation that fails to
/// parse, or parses to a volume without a name, is a
/// [`LinstorError::Codec`].
pub fn decode(
    resource: &ResourceDefinition,
    annotations_key: &str,
) -> Result<Option<Volume>, LinstorError> {
    let Some(raw) = resource.prop(&property_key(annotations_key)) else {
        return Ok(None);
    };

    let volume: Volume = serde_json::from_str(raw).map_err(|e| LinstorError::Codec {
        resource: resource.name.clone(),
        reason: format!("failed to unmarshal annotation: {e}"),
    })?;

    if volume.name.is_empty() {
        return Err(LinstorError::Codec {
            resource: resource.name.clone(),
            reason: "annotation has no volume name".to_owned(),
        });
    }
    Ok(Some(volume))
}

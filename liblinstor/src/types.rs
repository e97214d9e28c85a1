//! Core data model: volumes, assignments and backend resource definitions.
//!
//! [`Volume`] is the record callers hand in and the one recovered from the
//! backend. Its serialized form is what gets stored as an annotation on the
//! LINSTOR resource definition, so the field names on the wire are fixed and
//! must stay readable by every deployed version.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Volume
// ---------------------------------------------------------------------------

/// The canonical volume record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Volume {
    /// Backend-legal resource name; LINSTOR's own lookup key.
    #[serde(rename = "ID", default)]
    pub id: String,
    /// Caller-supplied logical name, kept verbatim.
    #[serde(rename = "Name", default)]
    pub name: String,
    /// Capacity as agreed with the caller, not necessarily the allocation.
    #[serde(rename = "SizeBytes", default)]
    pub size_bytes: i64,
    /// Opaque configuration directives. Keys are matched case-insensitively
    /// by the translator.
    #[serde(rename = "Parameters", default, deserialize_with = "null_as_default")]
    pub parameters: BTreeMap<String, String>,
}

/// Older writers serialize an unset map as `null`.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl Volume {
    /// Create a volume with no parameters.
    pub fn new(id: impl Into<String>, name: impl Into<String>, size_bytes: i64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            size_bytes,
            parameters: BTreeMap::new(),
        }
    }

    /// Builder-style helper to attach a parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Case-insensitive parameter lookup.
    pub fn parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.name)
    }
}

// ---------------------------------------------------------------------------
// Assignment
// ---------------------------------------------------------------------------

/// A volume made available on a specific node.
///
/// Not persisted by this crate; it is recomputed from the backend on demand.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Assignment {
    /// The assigned volume.
    pub volume: Volume,
    /// Node the volume is assigned to.
    pub node: String,
    /// Block device path reported by the backend, e.g. `/dev/drbd1000`.
    pub path: String,
}

// ---------------------------------------------------------------------------
// Backend resource definitions
// ---------------------------------------------------------------------------

/// A single key/value property of a resource definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Property {
    pub key: String,
    pub value: String,
}

impl Property {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A resource definition as listed by the controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceDefinition {
    /// LINSTOR resource name.
    #[serde(rename = "rsc_name")]
    pub name: String,
    /// Properties attached to the definition.
    #[serde(rename = "rsc_dfn_props", default)]
    pub props: Vec<Property>,
}

impl ResourceDefinition {
    pub fn new(name: impl Into<String>, props: Vec<Property>) -> Self {
        Self {
            name: name.into(),
            props,
        }
    }

    /// Value of the property with exactly this key, if any.
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.props
            .iter()
            .find(|p| p.key == key)
            .map(|p| p.value.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_wire_names() {
        let vol = Volume::new("pvc-1", "my volume", 1024).with_parameter("autoplace", "2");
        let json = serde_json::to_value(&vol).expect("serialize");
        assert_eq!(json["ID"], "pvc-1");
        assert_eq!(json["Name"], "my volume");
        assert_eq!(json["SizeBytes"], 1024);
        assert_eq!(json["Parameters"]["autoplace"], "2");
    }

    #[test]
    fn volume_ignores_unknown_fields() {
        let json = r#"{"ID":"a1","Name":"n","SizeBytes":1,"CreatedBy":"x","Readonly":false}"#;
        let vol: Volume = serde_json::from_str(json).expect("deserialize");
        assert_eq!(vol.id, "a1");
        assert!(vol.parameters.is_empty());
    }

    #[test]
    fn parameter_lookup_is_case_insensitive() {
        let vol = Volume::new("a1", "n", 0).with_parameter("FileSystem", "xfs");
        assert_eq!(vol.parameter("filesystem"), Some("xfs"));
        assert_eq!(vol.parameter("fsOpts"), None);
    }

    #[test]
    fn resource_definition_prop() {
        let rd = ResourceDefinition::new("res", vec![Property::new("Aux/k", "v")]);
        assert_eq!(rd.prop("Aux/k"), Some("v"));
        assert_eq!(rd.prop("k"), None);
    }
}

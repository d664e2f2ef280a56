use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Canonical device role values used to pick a template
pub mod device_role {
    pub const LEAF: &str = "leaf";
    pub const SPINE: &str = "spine";
    pub const HOST: &str = "host";
    pub const DEFAULT: &str = "default";
}

/// InventoryEntry is one element of the SimpleInventory files.
/// Hosts and groups use every field; the defaults file ignores `groups`.
/// For a group, `groups` lists its parent groups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InventoryEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub groups: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

/// ResolvedHost is a host with group and defaults inheritance applied.
/// `data` holds every inherited data key; host values win over groups,
/// groups over defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedHost {
    pub name: String,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
    /// Direct groups first, then inherited parents, without duplicates
    pub groups: Vec<String>,
    pub data: BTreeMap<String, Value>,
}

impl ResolvedHost {
    /// The `role` data key, or `default` when unset
    pub fn role(&self) -> String {
        self.data
            .get("role")
            .map(value_to_string)
            .unwrap_or_else(|| device_role::DEFAULT.to_string())
    }
}

/// Render a JSON data value as a filterable string.
/// Strings are used verbatim; other values use their JSON text.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The inventory layer an attribute was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeSource {
    Host,
    Group(String),
    Defaults,
}

impl fmt::Display for AttributeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeSource::Host => f.write_str("host"),
            AttributeSource::Group(name) => write!(f, "group: {}", name),
            AttributeSource::Defaults => f.write_str("defaults"),
        }
    }
}

/// One resolved attribute of a host and every layer that defines it.
/// `defined_in` is in lookup order, so its first entry is `source`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeTrace {
    pub key: String,
    pub value: String,
    pub source: AttributeSource,
    pub defined_in: Vec<AttributeSource>,
}

impl AttributeTrace {
    /// True when a higher layer hides a value set further down
    pub fn is_overridden(&self) -> bool {
        self.defined_in.len() > 1
    }
}

/// Connection parameters resolved for one host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    pub name: String,
    pub address: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub timeout_secs: u64,
}

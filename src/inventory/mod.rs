use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

use crate::filters::{self, DeviceAttributes};
use crate::models::{
    value_to_string, AttributeSource, AttributeTrace, ConnectionTarget, FilterExpression, InventoryEntry,
    ResolvedHost,
};

const DEFAULT_SSH_PORT: u16 = 22;

/// Connection fields traced ahead of the data keys, in display order
const CONNECTION_FIELDS: [&str; 5] = ["hostname", "platform", "port", "username", "password"];

const MASKED: &str = "********";

/// SimpleInventory-style device inventory: hosts, groups and defaults.
///
/// Attribute resolution order (highest priority first):
/// 1. the host entry itself
/// 2. each of the host's groups in declared order, each followed by its parents (depth-first)
/// 3. the defaults entry
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    hosts: BTreeMap<String, InventoryEntry>,
    groups: BTreeMap<String, InventoryEntry>,
    defaults: InventoryEntry,
}

impl Inventory {
    pub fn new(
        hosts: BTreeMap<String, InventoryEntry>,
        groups: BTreeMap<String, InventoryEntry>,
        defaults: InventoryEntry,
    ) -> Result<Self> {
        for name in hosts.keys() {
            validate_host_name(name)?;
        }

        for (name, entry) in hosts.iter().chain(groups.iter()) {
            for group in &entry.groups {
                if !groups.contains_key(group) {
                    bail!("'{}' references unknown group '{}'", name, group);
                }
            }
        }

        Ok(Self { hosts, groups, defaults })
    }

    /// Load the three inventory files. The groups and defaults files may be absent.
    pub fn load(hosts_path: &Path, groups_path: &Path, defaults_path: &Path) -> Result<Self> {
        let hosts: BTreeMap<String, InventoryEntry> = read_json(hosts_path)?
            .with_context(|| format!("Inventory hosts file not found: {}", hosts_path.display()))?;
        let groups: BTreeMap<String, InventoryEntry> = read_json(groups_path)?.unwrap_or_default();
        let defaults: InventoryEntry = read_json(defaults_path)?.unwrap_or_default();

        tracing::debug!(
            "Loaded inventory: {} hosts, {} groups from {}",
            hosts.len(),
            groups.len(),
            hosts_path.display()
        );

        Self::new(hosts, groups, defaults)
            .with_context(|| format!("Invalid inventory in {}", hosts_path.display()))
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Resolve a host by name with inheritance applied
    pub fn host(&self, name: &str) -> Option<ResolvedHost> {
        self.hosts.get(name).map(|entry| self.resolve(name, entry))
    }

    /// All hosts, resolved, in name order
    pub fn hosts(&self) -> Vec<ResolvedHost> {
        self.hosts
            .iter()
            .map(|(name, entry)| self.resolve(name, entry))
            .collect()
    }

    /// Hosts matching the expression (all hosts when absent), in name order
    pub fn filter(&self, expression: Option<&FilterExpression>) -> Vec<ResolvedHost> {
        self.hosts()
            .into_iter()
            .filter(|host| filters::matches_filter(expression, host))
            .collect()
    }

    /// Every attribute the host resolves, with the layer that supplied it.
    /// Connection fields come first, then data keys in name order.
    /// Passwords are masked.
    pub fn trace(&self, name: &str) -> Option<Vec<AttributeTrace>> {
        let entry = self.hosts.get(name)?;
        let layers = self.layers(entry);

        let mut traces = Vec::new();
        for field in CONNECTION_FIELDS {
            let found = layers
                .iter()
                .filter_map(|(source, layer)| connection_field(layer, field).map(|v| (source, v)));
            traces.extend(trace_key(field, found));
        }

        let keys: BTreeSet<&str> = layers
            .iter()
            .flat_map(|(_, layer)| layer.data.keys().map(String::as_str))
            .collect();
        for key in keys {
            let found = layers
                .iter()
                .filter_map(|(source, layer)| layer.data.get(key).map(|v| (source, value_to_string(v))));
            traces.extend(trace_key(key, found));
        }

        Some(traces)
    }

    /// Group names reachable from `direct`, depth-first, each visited once
    fn group_chain<'a>(&'a self, direct: &'a [String]) -> Vec<&'a str> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        for group in direct {
            self.walk_group(group, &mut chain, &mut visited);
        }
        chain
    }

    fn walk_group<'a>(&'a self, name: &'a str, chain: &mut Vec<&'a str>, visited: &mut HashSet<&'a str>) {
        if !visited.insert(name) {
            return;
        }
        let Some(group) = self.groups.get(name) else {
            return;
        };
        chain.push(name);
        for parent in &group.groups {
            self.walk_group(parent, chain, visited);
        }
    }

    /// The host entry, its group chain and the defaults, highest priority first
    fn layers<'a>(&'a self, entry: &'a InventoryEntry) -> Vec<(AttributeSource, &'a InventoryEntry)> {
        let mut layers = vec![(AttributeSource::Host, entry)];
        for group in self.group_chain(&entry.groups) {
            if let Some(layer) = self.groups.get(group) {
                layers.push((AttributeSource::Group(group.to_string()), layer));
            }
        }
        layers.push((AttributeSource::Defaults, &self.defaults));
        layers
    }

    fn resolve(&self, name: &str, entry: &InventoryEntry) -> ResolvedHost {
        let sourced = self.layers(entry);
        let layers: Vec<&InventoryEntry> = sourced.iter().map(|(_, layer)| *layer).collect();

        // Merge data lowest priority first so higher layers overwrite
        let mut data: BTreeMap<String, Value> = BTreeMap::new();
        for layer in layers.iter().rev() {
            for (key, value) in &layer.data {
                data.insert(key.clone(), value.clone());
            }
        }

        ResolvedHost {
            name: name.to_string(),
            hostname: first(&layers, |l| l.hostname.clone()).unwrap_or_else(|| name.to_string()),
            platform: first(&layers, |l| l.platform.clone()),
            port: first(&layers, |l| l.port),
            username: first(&layers, |l| l.username.clone()),
            password: first(&layers, |l| l.password.clone()),
            groups: sourced
                .iter()
                .filter_map(|(source, _)| match source {
                    AttributeSource::Group(group) => Some(group.clone()),
                    _ => None,
                })
                .collect(),
            data,
        }
    }
}

/// Host keys become result hostnames and `<name>.cfg` file names
fn validate_host_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("Host name cannot be empty or whitespace");
    }
    if name.trim() != name {
        bail!("Host name '{}' has leading or trailing whitespace", name);
    }
    if name.contains(['/', '\\']) {
        bail!("Host name '{}' cannot contain a path separator", name);
    }
    Ok(())
}

fn connection_field(entry: &InventoryEntry, field: &str) -> Option<String> {
    match field {
        "hostname" => entry.hostname.clone(),
        "platform" => entry.platform.clone(),
        "port" => entry.port.map(|p| p.to_string()),
        "username" => entry.username.clone(),
        "password" => entry.password.as_ref().map(|_| MASKED.to_string()),
        _ => None,
    }
}

/// The first layer found wins; `None` when no layer defines the key
fn trace_key<'a>(
    key: &str,
    found: impl Iterator<Item = (&'a AttributeSource, String)>,
) -> Option<AttributeTrace> {
    let mut found = found.peekable();
    let (source, value) = found.peek().map(|(s, v)| ((*s).clone(), v.clone()))?;
    Some(AttributeTrace {
        key: key.to_string(),
        value,
        source,
        defined_in: found.map(|(s, _)| s.clone()).collect(),
    })
}

fn first<T>(layers: &[&InventoryEntry], field: impl Fn(&InventoryEntry) -> Option<T>) -> Option<T> {
    layers.iter().find_map(|layer| field(*layer))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read inventory file {}", path.display()))?;
    let parsed = serde_json::from_str(&content)
        .with_context(|| format!("Invalid inventory file {}", path.display()))?;
    Ok(Some(parsed))
}

impl DeviceAttributes for ResolvedHost {
    fn get_attribute(&self, key: &str) -> Option<String> {
        match key {
            "name" => Some(self.name.clone()),
            "hostname" => Some(self.hostname.clone()),
            "platform" => self.platform.clone(),
            "port" => self.port.map(|p| p.to_string()),
            "username" => self.username.clone(),
            "group" | "groups" => self.groups.first().cloned(),
            _ => self.data.get(key).map(value_to_string),
        }
    }

    fn get_attribute_values(&self, key: &str) -> Vec<String> {
        match key {
            "group" | "groups" => self.groups.clone(),
            _ => self.get_attribute(key).into_iter().collect(),
        }
    }
}

impl ResolvedHost {
    /// SSH parameters for this host; credentials must resolve from some layer
    pub fn connection_target(&self, timeout_secs: u64) -> Result<ConnectionTarget> {
        let (Some(username), Some(password)) = (self.username.clone(), self.password.clone()) else {
            bail!("No SSH credentials available for {}", self.name);
        };

        Ok(ConnectionTarget {
            name: self.name.clone(),
            address: self.hostname.clone(),
            port: self.port.unwrap_or(DEFAULT_SSH_PORT),
            username,
            password,
            timeout_secs,
        })
    }
}

use anyhow::{Context as _, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

use crate::errors::ValidationError;
use crate::models::{device_role, DeviceResult, ResolvedHost};

/// Template file for a device role; `None` means the role is not rendered
pub fn template_for_role(role: &str) -> Option<&'static str> {
    match role {
        device_role::LEAF => Some("leaves.j2"),
        device_role::SPINE => Some("spines.j2"),
        device_role::HOST => Some("hosts.j2"),
        device_role::DEFAULT => Some("defaults.j2"),
        _ => None,
    }
}

/// Renderer owns the loaded template set and writes `<output>/<host>.cfg`
pub struct Renderer {
    tera: Tera,
    output_dir: PathBuf,
}

impl Renderer {
    /// Load every `*.j2` file under `templates_dir`
    pub fn new(templates_dir: &Path, output_dir: &Path) -> Result<Self> {
        let glob = format!("{}/**/*.j2", templates_dir.display());
        let mut tera = Tera::new(&glob).map_err(|e| anyhow::anyhow!("Invalid template: {}", e))?;
        tera.autoescape_on(vec![]);

        tracing::debug!(
            "Loaded {} templates from {}",
            tera.get_template_names().count(),
            templates_dir.display()
        );

        Ok(Self {
            tera,
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Render one host's configuration text
    pub fn render(&self, host: &ResolvedHost, template: &str) -> Result<String> {
        let mut context = Context::new();
        context.insert("host", &host_context(host));

        self.tera
            .render(template, &context)
            .map_err(|e| anyhow::anyhow!("Template rendering failed: {}", render_error_chain(&e)))
    }

    /// Render a host and write its config file. Render and IO problems are
    /// reported as a FAILED result so the batch keeps going.
    pub fn render_to_file(&self, host: &ResolvedHost) -> Result<DeviceResult, ValidationError> {
        let role = host.role();
        let Some(template) = template_for_role(&role) else {
            tracing::info!("Skipping host {}: no template mapped for role '{}'", host.name, role);
            return Ok(DeviceResult::skipped(&host.name)?
                .with_message(format!("No template mapped for role '{}'", role)));
        };

        let path = self.output_dir.join(format!("{}.cfg", host.name));
        let outcome = self.render(host, template).and_then(|config| {
            std::fs::write(&path, config).with_context(|| format!("Failed to write {}", path.display()))
        });

        match outcome {
            Ok(()) => {
                tracing::debug!("Rendered {} with {} to {}", host.name, template, path.display());
                Ok(DeviceResult::success(&host.name)?
                    .with_message(format!("Configuration rendered to {}", path.display())))
            }
            Err(e) => {
                tracing::warn!("Render failed for {}: {:#}", host.name, e);
                DeviceResult::failed(&host.name, format!("{:#}", e))
            }
        }
    }
}

/// The `host` object templates see: core fields plus every data key flattened in,
/// so both `{{ host.asn }}` and `{{ host.data.asn }}` work.
fn host_context(host: &ResolvedHost) -> Value {
    let mut obj = Map::new();
    for (key, value) in &host.data {
        obj.insert(key.clone(), value.clone());
    }
    obj.insert("name".to_string(), Value::String(host.name.clone()));
    obj.insert("hostname".to_string(), Value::String(host.hostname.clone()));
    obj.insert(
        "platform".to_string(),
        host.platform.clone().map(Value::String).unwrap_or(Value::Null),
    );
    obj.insert(
        "groups".to_string(),
        Value::Array(host.groups.iter().cloned().map(Value::String).collect()),
    );
    obj.insert(
        "data".to_string(),
        Value::Object(host.data.clone().into_iter().collect()),
    );
    Value::Object(obj)
}

/// Tera hides the useful part of an error in its source chain
fn render_error_chain(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        parts.push(e.to_string());
        source = e.source();
    }
    parts.join(": ")
}

use std::env;
use std::path::{Path, PathBuf};

use crate::errors::PathError;

/// Config holds all application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub project_root: PathBuf,
    pub inventory_hosts: PathBuf,
    pub inventory_groups: PathBuf,
    pub inventory_defaults: PathBuf,
    pub templates_dir: PathBuf,
    pub output_dir: PathBuf,
    pub num_workers: usize,
    pub ssh_timeout_secs: u64,
}

impl Config {
    /// Load configuration from environment variables with defaults.
    /// A `.env` file in the working directory is read first if present.
    pub fn load() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let project_root = env::var("NETAUTO_PROJECT_ROOT")
            .map(PathBuf::from)
            .or_else(|_| env::current_dir())
            .unwrap_or_else(|_| PathBuf::from("."));

        Self {
            inventory_hosts: resolve(&project_root, &get_env("NETAUTO_INVENTORY_HOSTS", "inventory/hosts.json")),
            inventory_groups: resolve(&project_root, &get_env("NETAUTO_INVENTORY_GROUPS", "inventory/groups.json")),
            inventory_defaults: resolve(
                &project_root,
                &get_env("NETAUTO_INVENTORY_DEFAULTS", "inventory/defaults.json"),
            ),
            templates_dir: resolve(&project_root, &get_env("NETAUTO_TEMPLATES_DIR", "templates")),
            output_dir: resolve(&project_root, &get_env("NETAUTO_OUTPUT_DIR", "configs/generated")),
            num_workers: parse_positive(&get_env("NETAUTO_NUM_WORKERS", "20"), 20),
            ssh_timeout_secs: parse_positive(&get_env("NETAUTO_SSH_TIMEOUT", "30"), 30),
            project_root,
        }
    }
}

fn get_env(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Zero and unparsable values fall back to the default
fn parse_positive<T: std::str::FromStr + PartialEq + Default>(value: &str, default: T) -> T {
    value
        .trim()
        .parse()
        .ok()
        .filter(|n| *n != T::default())
        .unwrap_or(default)
}

/// Absolute paths are kept; relative ones are anchored at the project root
fn resolve(root: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        path
    } else {
        root.join(path)
    }
}

/// PathManager resolves the templates and output directories.
/// Precedence: CLI override > environment > default.
#[derive(Debug, Clone)]
pub struct PathManager {
    templates_dir: PathBuf,
    output_dir: PathBuf,
}

impl PathManager {
    pub fn new(config: &Config, templates_override: Option<PathBuf>, output_override: Option<PathBuf>) -> Self {
        Self {
            templates_dir: templates_override.unwrap_or_else(|| config.templates_dir.clone()),
            output_dir: output_override.unwrap_or_else(|| config.output_dir.clone()),
        }
    }

    pub fn templates_dir(&self) -> &Path {
        &self.templates_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// The templates directory must exist and hold at least one `*.j2` file
    pub fn validate_templates_dir(&self) -> Result<(), PathError> {
        let dir = &self.templates_dir;
        if !dir.exists() {
            return Err(PathError::TemplatesNotFound(dir.clone()));
        }
        if !dir.is_dir() {
            return Err(PathError::TemplatesNotDirectory(dir.clone()));
        }
        if list_with_extension(dir, "j2").is_empty() {
            return Err(PathError::NoTemplates(dir.clone()));
        }
        Ok(())
    }

    /// Create the output directory (and parents) if needed and check it is writable
    pub fn ensure_output_dir(&self) -> Result<(), PathError> {
        let dir = &self.output_dir;
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|source| PathError::OutputCreate {
                path: dir.clone(),
                source,
            })?;
        }

        let meta = std::fs::metadata(dir).map_err(|source| PathError::OutputCreate {
            path: dir.clone(),
            source,
        })?;
        if !meta.is_dir() {
            return Err(PathError::OutputNotDirectory(dir.clone()));
        }
        if meta.permissions().readonly() {
            return Err(PathError::OutputNotWritable(dir.clone()));
        }
        Ok(())
    }

    /// Rendered `*.cfg` files in the output directory, sorted by name
    pub fn config_files(&self) -> Result<Vec<PathBuf>, PathError> {
        let files = list_with_extension(&self.output_dir, "cfg");
        if files.is_empty() {
            return Err(PathError::NoConfigs(self.output_dir.clone()));
        }
        Ok(files)
    }

    /// Path of the rendered config for a host
    pub fn config_path(&self, host_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}.cfg", host_name))
    }
}

fn list_with_extension(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some(ext))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(root: &Path) -> Config {
        Config {
            project_root: root.to_path_buf(),
            inventory_hosts: root.join("inventory/hosts.json"),
            inventory_groups: root.join("inventory/groups.json"),
            inventory_defaults: root.join("inventory/defaults.json"),
            templates_dir: root.join("templates"),
            output_dir: root.join("configs/generated"),
            num_workers: 20,
            ssh_timeout_secs: 30,
        }
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive::<u64>("45", 30), 45);
        assert_eq!(parse_positive::<u64>("0", 30), 30);
        assert_eq!(parse_positive::<u64>("-5", 30), 30);
        assert_eq!(parse_positive::<u64>("soon", 30), 30);
        assert_eq!(parse_positive::<usize>(" 8 ", 20), 8);
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let root = Path::new("/srv/lab");
        assert_eq!(resolve(root, "templates"), PathBuf::from("/srv/lab/templates"));
        assert_eq!(resolve(root, "/etc/netauto"), PathBuf::from("/etc/netauto"));
    }

    #[test]
    fn test_defaults_without_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config_in(tmp.path());
        let pm = PathManager::new(&cfg, None, None);
        assert_eq!(pm.templates_dir(), cfg.templates_dir.as_path());
        assert_eq!(pm.output_dir(), cfg.output_dir.as_path());
    }

    #[test]
    fn test_partial_override() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config_in(tmp.path());
        let custom = tmp.path().join("custom-out");
        let pm = PathManager::new(&cfg, None, Some(custom.clone()));
        assert_eq!(pm.templates_dir(), cfg.templates_dir.as_path());
        assert_eq!(pm.output_dir(), custom.as_path());
    }

    #[test]
    fn test_validate_templates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = config_in(tmp.path());
        let pm = PathManager::new(&cfg, None, None);

        assert!(matches!(pm.validate_templates_dir(), Err(PathError::TemplatesNotFound(_))));

        std::fs::create_dir_all(&cfg.templates_dir).unwrap();
        assert!(matches!(pm.validate_templates_dir(), Err(PathError::NoTemplates(_))));

        std::fs::write(cfg.templates_dir.join("README.md"), "x").unwrap();
        assert!(matches!(pm.validate_templates_dir(), Err(PathError::NoTemplates(_))));

        std::fs::write(cfg.templates_dir.join("leaves.j2"), "hostname {{ host.name }}").unwrap();
        assert!(pm.validate_templates_dir().is_ok());
    }

    #[test]
    fn test_templates_path_is_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("templates.txt");
        std::fs::write(&file, "x").unwrap();
        let pm = PathManager::new(&config_in(tmp.path()), Some(file), None);
        assert!(matches!(pm.validate_templates_dir(), Err(PathError::TemplatesNotDirectory(_))));
    }

    #[test]
    fn test_ensure_output_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a/b/c");
        let pm = PathManager::new(&config_in(tmp.path()), None, Some(nested.clone()));
        pm.ensure_output_dir().unwrap();
        assert!(nested.is_dir());
        // idempotent
        pm.ensure_output_dir().unwrap();
    }

    #[test]
    fn test_ensure_output_dir_rejects_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("out");
        std::fs::write(&file, "x").unwrap();
        let pm = PathManager::new(&config_in(tmp.path()), None, Some(file));
        assert!(matches!(pm.ensure_output_dir(), Err(PathError::OutputNotDirectory(_))));
    }

    #[test]
    fn test_config_files() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let pm = PathManager::new(&config_in(tmp.path()), None, Some(out.clone()));

        assert!(matches!(pm.config_files(), Err(PathError::NoConfigs(_))));

        std::fs::write(out.join("s1.cfg"), "").unwrap();
        std::fs::write(out.join("l1.cfg"), "").unwrap();
        std::fs::write(out.join("notes.txt"), "").unwrap();
        assert_eq!(pm.config_files().unwrap(), vec![out.join("l1.cfg"), out.join("s1.cfg")]);
        assert_eq!(pm.config_path("l1"), out.join("l1.cfg"));
    }
}

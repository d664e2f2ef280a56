use std::path::PathBuf;

/// Input validation failures raised eagerly while building filters and results.
/// None of these are retried: they always mean malformed input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid filter syntax: {0}")]
    InvalidFilterSyntax(String),

    #[error("Invalid device result: {0}")]
    InvalidDeviceResult(String),

    #[error("Invalid operation name: {0}")]
    InvalidOperationName(String),
}

/// Problems with the templates or output directories
#[derive(Debug, thiserror::Error)]
pub enum PathError {
    #[error("Templates directory not found: {0}")]
    TemplatesNotFound(PathBuf),

    #[error("Templates path is not a directory: {0}")]
    TemplatesNotDirectory(PathBuf),

    #[error("No templates (*.j2) found in templates directory: {0}")]
    NoTemplates(PathBuf),

    #[error("Cannot create output directory {path}: {source}")]
    OutputCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Output path is not a directory: {0}")]
    OutputNotDirectory(PathBuf),

    #[error("Output directory is not writable: {0}")]
    OutputNotWritable(PathBuf),

    #[error("No configuration files (*.cfg) found in output directory: {0}")]
    NoConfigs(PathBuf),
}

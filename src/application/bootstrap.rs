use crate::infrastructure::config::{ensure_default_configs, load_config, ReconcilerConfig};
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub config: ReconcilerConfig,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    bootstrap_workspace_with(workspace_root, load_config)
}

/// Creates `config/`, writes missing default files and loads them through `load`.
pub fn bootstrap_workspace_with<F>(workspace_root: &Path, load: F) -> Result<BootstrapResult, InfraError>
where
    F: FnOnce(&Path) -> Result<ReconcilerConfig, InfraError>,
{
    let config_dir = workspace_root.join("config");
    fs::create_dir_all(&config_dir)?;

    ensure_default_configs(&config_dir)?;
    let config = load(&config_dir)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        config,
    })
}

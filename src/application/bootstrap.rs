use crate::infrastructure::config::ensure_default_configs;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::storage::initialize_database;
use std::fs;
use std::path::{Path, PathBuf};

const DATABASE_FILE_NAME: &str = "todos.sqlite";

#[derive(Debug)]
pub struct BootstrapResult {
    pub workspace_root: PathBuf,
    pub config_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub database_path: PathBuf,
}

pub fn bootstrap_workspace(workspace_root: &Path) -> Result<BootstrapResult, InfraError> {
    let config_dir = workspace_root.join("config");
    let state_dir = workspace_root.join("state");
    let logs_dir = workspace_root.join("logs");
    let database_path = state_dir.join(DATABASE_FILE_NAME);

    fs::create_dir_all(&config_dir)?;
    fs::create_dir_all(&state_dir)?;
    fs::create_dir_all(&logs_dir)?;

    ensure_default_configs(&config_dir)?;
    initialize_database(&database_path)?;

    Ok(BootstrapResult {
        workspace_root: workspace_root.to_path_buf(),
        config_dir,
        logs_dir,
        database_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::commands::tests::TempWorkspace;

    #[test]
    fn bootstrap_creates_layout_and_is_idempotent() {
        let workspace = TempWorkspace::new();

        let first = bootstrap_workspace(&workspace.path).expect("bootstrap workspace");
        assert!(first.config_dir.join("app.json").exists());
        assert!(first.logs_dir.is_dir());
        assert!(first.database_path.exists());
        assert_eq!(first.database_path.file_name().and_then(|name| name.to_str()), Some("todos.sqlite"));

        let second = bootstrap_workspace(&workspace.path).expect("bootstrap twice");
        assert_eq!(second.database_path, first.database_path);
    }
}

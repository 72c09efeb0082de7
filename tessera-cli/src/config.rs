//! CLI configuration handling.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::cli::ProjectArgs;
use crate::error::{CliError, CliResult};

/// Default config file name (lives in project root)
pub const CONFIG_FILE_NAME: &str = "tessera.toml";

/// Default model file path (relative to project root)
pub const MODELS_FILE_PATH: &str = "tessera/models.toml";

/// Default migrations directory (relative to project root)
pub const MIGRATIONS_DIR: &str = "tessera/migrations";

/// Tessera CLI configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model file configuration
    pub models: ModelsConfig,

    /// Migration configuration
    pub migrations: MigrationsConfig,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Model file configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Path to the TOML model file
    pub path: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            path: MODELS_FILE_PATH.to_string(),
        }
    }
}

/// Migration configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationsConfig {
    /// Directory holding migration records
    pub directory: String,
}

impl Default for MigrationsConfig {
    fn default() -> Self {
        Self {
            directory: MIGRATIONS_DIR.to_string(),
        }
    }
}

/// Configuration resolved against a project root, with CLI overrides applied.
#[derive(Debug, Clone)]
pub struct Project {
    /// Project root (the directory holding the config file)
    pub root: PathBuf,
    /// Parsed configuration
    pub config: Config,
    /// Migrations directory override from the command line
    migrations_override: Option<PathBuf>,
}

impl Project {
    /// Resolve the project from the current directory.
    ///
    /// An explicitly given config file must exist; the default one is
    /// optional.
    pub fn discover(args: &ProjectArgs) -> CliResult<Self> {
        let cwd = std::env::current_dir()?;
        Self::discover_in(&cwd, args)
    }

    /// Resolve the project relative to `cwd`.
    pub fn discover_in(cwd: &Path, args: &ProjectArgs) -> CliResult<Self> {
        let (path, explicit) = match &args.config {
            Some(path) => (cwd.join(path), true),
            None => (cwd.join(CONFIG_FILE_NAME), false),
        };

        let config = if path.exists() {
            tracing::debug!(path = %path.display(), "Loading config");
            Config::load(&path)?
        } else if explicit {
            return Err(CliError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        } else {
            Config::default()
        };

        let root = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.to_path_buf());

        Ok(Self {
            root,
            config,
            migrations_override: args.migrations.as_ref().map(|dir| cwd.join(dir)),
        })
    }

    /// Path to the model file, preferring `models` when given.
    pub fn models_path(&self, models: Option<&Path>) -> PathBuf {
        match models {
            Some(path) => self.root.join(path),
            None => self.root.join(&self.config.models.path),
        }
    }

    /// Path to the migrations directory.
    pub fn migrations_dir(&self) -> PathBuf {
        self.migrations_override
            .clone()
            .unwrap_or_else(|| self.root.join(&self.config.migrations.directory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.models.path, "tessera/models.toml");
        assert_eq!(config.migrations.directory, "tessera/migrations");
    }

    #[test]
    fn test_partial_config() {
        let config: Config = toml::from_str(
            r#"
            [migrations]
            directory = "db/migrations"
            "#,
        )
        .unwrap();
        assert_eq!(config.models.path, MODELS_FILE_PATH);
        assert_eq!(config.migrations.directory, "db/migrations");
    }

    #[test]
    fn test_discover_without_config_file() {
        let dir = TempDir::new().unwrap();
        let project = Project::discover_in(dir.path(), &ProjectArgs::default()).unwrap();
        assert_eq!(project.migrations_dir(), dir.path().join(MIGRATIONS_DIR));
        assert_eq!(project.models_path(None), dir.path().join(MODELS_FILE_PATH));
    }

    #[test]
    fn test_discover_missing_explicit_config() {
        let dir = TempDir::new().unwrap();
        let args = ProjectArgs {
            config: Some("missing.toml".into()),
            migrations: None,
        };
        let err = Project::discover_in(dir.path(), &args).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn test_overrides() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[models]\npath = \"models.toml\"\n",
        )
        .unwrap();
        let args = ProjectArgs {
            config: None,
            migrations: Some("other".into()),
        };

        let project = Project::discover_in(dir.path(), &args).unwrap();
        assert_eq!(project.models_path(None), dir.path().join("models.toml"));
        assert_eq!(
            project.models_path(Some(Path::new("alt.toml"))),
            dir.path().join("alt.toml")
        );
        assert_eq!(project.migrations_dir(), dir.path().join("other"));
    }
}

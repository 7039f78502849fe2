//! Command implementations.

mod info;
mod probe;
mod run;
mod validate;

pub use info::run_info;
pub use probe::run_probe;
pub use run::run_sync;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::SyncerConfig;
use tracing::info;

use crate::error::CliError;

/// Command-line values that replace configuration entries
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub endpoint_url: Option<String>,
    pub max_retries: Option<u32>,
}

/// Load the configuration file, apply overrides and re-validate.
pub fn load_config(path: &Path, overrides: &Overrides) -> Result<SyncerConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()).into());
    }

    let mut config = config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))?;

    if let Some(url) = &overrides.endpoint_url {
        info!(url = %url, "Overriding endpoint URL from CLI");
        config.endpoint.url = Some(url.clone());
    }
    if let Some(max_retries) = overrides.max_retries {
        info!(max_retries, "Overriding retry count from CLI");
        config.delivery.max_retries = max_retries;
    }
    config_loader::ConfigLoader::validate(&config).context("Invalid configuration after overrides")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn config_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_overrides_applied() {
        let file = config_file("[endpoint]\nurl = \"https://a.example.com/c\"\n");
        let overrides = Overrides {
            endpoint_url: Some("https://b.example.com/c".into()),
            max_retries: Some(9),
        };

        let config = load_config(file.path(), &overrides).unwrap();
        assert_eq!(config.endpoint.url.as_deref(), Some("https://b.example.com/c"));
        assert_eq!(config.delivery.max_retries, 9);
    }

    #[test]
    fn test_bad_override_rejected() {
        let file = config_file("[endpoint]\nurl = \"https://a.example.com/c\"\n");
        let overrides = Overrides {
            endpoint_url: Some("not-a-url".into()),
            ..Overrides::default()
        };
        assert!(load_config(file.path(), &overrides).is_err());
    }

    #[test]
    fn test_missing_config() {
        let err = load_config(Path::new("/nonexistent/syncer.toml"), &Overrides::default())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CliError>(),
            Some(CliError::ConfigNotFound { .. })
        ));
    }
}

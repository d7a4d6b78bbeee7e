use crate::core::config::AppConfig;
use anyhow::{Context, Result, bail};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");

/// Writes the example configuration to the default config path.
pub fn setup() -> Result<()> {
    let path = write_example_config(&AppConfig::default_config_path()?)?;
    println!("Created {}", path.display());
    println!("Edit it to change the base currency or refresh interval.");
    Ok(())
}

/// Writes the example configuration to `path`. An existing file is never
/// overwritten.
pub fn write_example_config(path: &Path) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            bail!("Configuration file already exists at {}", path.display())
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to create config file: {}", path.display()));
        }
    };
    file.write_all(EXAMPLE_CONFIG.as_bytes())
        .with_context(|| format!("Failed to write config file to {}", path.display()))?;

    tracing::info!("Created default configuration at {}", path.display());
    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_example_config_written_and_loadable() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("nested").join("config.yaml");

        let written = write_example_config(&path)?;
        assert_eq!(written, path);

        let content = std::fs::read_to_string(&path)?;
        assert!(content.starts_with("# Example configuration file for shopper"));

        let config = AppConfig::load_from_path(&path)?;
        assert_eq!(config.base_currency, "USD");
        assert_eq!(config.refresh_interval_secs, 3600);
        assert!(!config.providers.exchange_rate.base_url.is_empty());
        Ok(())
    }

    #[test]
    fn test_existing_config_is_kept() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(&path, "base_currency: EUR\n")?;

        let err = write_example_config(&path).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(std::fs::read_to_string(&path)?, "base_currency: EUR\n");
        Ok(())
    }
}

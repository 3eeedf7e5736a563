//! Config command handlers

use anyhow::{bail, Context, Result};

use levelforge_core::Config;

use crate::output::{format_bytes, Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            output.print_json(&serde_json::json!({
                "data_dir": config.data_dir,
                "quota_bytes": config.quota_bytes,
                "warn_ratio": config.warn_ratio,
                "database": config.database_path(),
                "legacy_dir": config.legacy_dir(),
            }));
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:    {}", config.data_dir.display());
            println!(
                "  quota_bytes: {}",
                config
                    .quota_bytes
                    .map(|q| format!("{} ({})", q, format_bytes(q)))
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!("  warn_ratio:  {}", config.warn_ratio);
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    config.save().context("Failed to save configuration")?;
    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "quota_bytes" => {
            config.quota_bytes = if value.is_empty() || value == "none" {
                None
            } else {
                let quota: u64 = value
                    .parse()
                    .context("Invalid value for quota_bytes. Use a byte count or 'none'.")?;
                if quota == 0 {
                    bail!("quota_bytes must be greater than zero");
                }
                Some(quota)
            };
        }
        "warn_ratio" => {
            let ratio: f64 = value
                .parse()
                .context("Invalid value for warn_ratio. Use a number in (0, 1].")?;
            if !(ratio > 0.0 && ratio <= 1.0) {
                bail!("warn_ratio must be in (0, 1], got {}", ratio);
            }
            config.warn_ratio = ratio;
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, quota_bytes, warn_ratio",
                key
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_values() {
        let mut config = Config::with_data_dir("/tmp/levelforge-test");

        apply(&mut config, "quota_bytes", "1048576").unwrap();
        assert_eq!(config.quota_bytes, Some(1048576));

        apply(&mut config, "quota_bytes", "none").unwrap();
        assert_eq!(config.quota_bytes, None);

        apply(&mut config, "warn_ratio", "0.5").unwrap();
        assert_eq!(config.warn_ratio, 0.5);

        apply(&mut config, "data_dir", "/srv/levels").unwrap();
        assert_eq!(config.data_dir, std::path::PathBuf::from("/srv/levels"));
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::with_data_dir("/tmp/levelforge-test");

        assert!(apply(&mut config, "quota_bytes", "0").is_err());
        assert!(apply(&mut config, "quota_bytes", "lots").is_err());
        assert!(apply(&mut config, "warn_ratio", "1.5").is_err());
        assert!(apply(&mut config, "sync_url", "ws://x").is_err());
        assert_eq!(config.warn_ratio, levelforge_core::config::DEFAULT_WARN_RATIO);
    }
}

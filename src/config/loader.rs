use super::Config;
use anyhow::{Context, Result};
use directories::UserDirs;
use std::fs;
use std::path::Path;

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let home = UserDirs::new()
            .map(|u| u.home_dir().to_path_buf())
            .context("Could not find home directory")?;
        Self::load_or_init_at(&home.join(".dynadub").join("config.toml"))
    }

    /// Load `config_path`, writing a default file first when it is missing.
    pub fn load_or_init_at(config_path: &Path) -> Result<Self> {
        if let Some(dir) = config_path.parent()
            && !dir.exists()
        {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let mut config = if config_path.exists() {
            let contents =
                fs::read_to_string(config_path).context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            config.config_path = config_path.to_path_buf();
            config
        } else {
            let config = Self {
                config_path: config_path.to_path_buf(),
                ..Self::default()
            };
            config.save()?;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&self.config_path, toml_str).context("Failed to write config file")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_config_is_created_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = Config::load_or_init_at(&path).unwrap();

        assert!(path.exists());
        assert_eq!(config.config_path, path);
        assert_eq!(config.connection.max_attempts, 3);
    }

    #[test]
    fn existing_config_is_parsed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "log_level = \"debug\"\n[tracking]\nclick_throttle_ms = 50\n",
        )
        .unwrap();

        let config = Config::load_or_init_at(&path).unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.tracking.click_throttle_ms, 50);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[connection]\nmax_attempts = 0\n").unwrap();

        assert!(Config::load_or_init_at(&path).is_err());
    }
}

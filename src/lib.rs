use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

pub mod compositor;
pub mod export;
pub mod registry;
pub mod session;
pub mod startup_checks;

pub use compositor::{WatermarkAsset, WatermarkMode, WatermarkSettings};
pub use export::{
    DynExportSink, ExportCoordinator, ExportError, ExportOutcome, ExportReport, ExportSink,
    ExportTarget, ExportedFile, FailurePolicy, LockingPolicy, SingleExports,
};
pub use registry::{Confirm, EntryId, RawFile, Registry, RegistryError};
pub use session::{Session, SessionState};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] toml_edit::de::Error),

    #[error("Invalid noise token pattern: {0}")]
    PatternError(#[from] regex::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub watermark: WatermarkConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WatermarkConfig {
    /// Logo used for tiled and corner placement.
    pub logo: PathBuf,
    /// Optional separate logo for centered placement. Falls back to `logo`.
    #[serde(default)]
    pub centered_logo: Option<PathBuf>,
    #[serde(default)]
    pub mode: WatermarkMode,
    /// Replaces the per-mode default opacity when set.
    #[serde(default)]
    pub opacity: Option<f32>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NamingConfig {
    /// Substrings removed (case-insensitively) from uploaded file names.
    pub noise_tokens: Vec<String>,
    pub fallback_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportConfig {
    pub output_directory: PathBuf,
    pub archive_name: String,
    #[serde(default)]
    pub archive_folder: Option<String>,
    pub single_fallback_prefix: String,
    pub archive_fallback_prefix: String,
    pub jpeg_quality: u8,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub locking: LockingPolicy,
    #[serde(default)]
    pub idle_delay_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "Filigrane".to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            logo: PathBuf::from("static/logo.png"),
            centered_logo: None,
            mode: WatermarkMode::default(),
            opacity: None,
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            noise_tokens: vec!["vite".to_string(), "react".to_string(), "img".to_string()],
            fallback_name: "Image".to_string(),
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("exports"),
            archive_name: "images-alv.zip".to_string(),
            archive_folder: Some("images-alv".to_string()),
            single_fallback_prefix: "image-alv".to_string(),
            archive_fallback_prefix: "image".to_string(),
            jpeg_quality: 90,
            failure_policy: FailurePolicy::default(),
            locking: LockingPolicy::default(),
            idle_delay_ms: 0,
        }
    }
}

impl Config {
    /// Load the configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)?
        } else {
            info!("Config file not found at {:?}, using defaults", path);
            Self::default()
        };

        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config = toml_edit::de::from_str::<Config>(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(opacity) = self.watermark.opacity
            && !(0.0..=1.0).contains(&opacity)
        {
            return Err(ConfigError::Invalid(format!(
                "watermark.opacity must be between 0 and 1, got {}",
                opacity
            )));
        }

        if !(1..=100).contains(&self.export.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "export.jpeg_quality must be between 1 and 100, got {}",
                self.export.jpeg_quality
            )));
        }

        if self.export.archive_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "export.archive_name must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_product_defaults() {
        let config = Config::default();
        assert_eq!(config.export.archive_name, "images-alv.zip");
        assert_eq!(config.export.archive_folder.as_deref(), Some("images-alv"));
        assert_eq!(config.export.jpeg_quality, 90);
        assert_eq!(config.export.failure_policy, FailurePolicy::Skip);
        assert_eq!(config.export.locking, LockingPolicy::PerTarget);
        assert_eq!(config.watermark.mode, WatermarkMode::Tiled);
        assert_eq!(config.naming.fallback_name, "Image");
    }

    #[test]
    fn test_parse_partial_config() {
        let config = Config::from_toml(
            r#"
            [watermark]
            logo = "assets/brand.png"
            centered_logo = "assets/brand-light.png"
            mode = "corner-bottom-right"
            opacity = 0.5

            [export]
            output_directory = "out"
            archive_name = "batch.zip"
            single_fallback_prefix = "photo"
            archive_fallback_prefix = "photo"
            jpeg_quality = 80
            failure_policy = "abort"
            locking = "exclusive"
            "#,
        )
        .unwrap();

        assert_eq!(config.watermark.mode, WatermarkMode::CornerBottomRight);
        assert_eq!(config.watermark.opacity, Some(0.5));
        assert_eq!(
            config.watermark.centered_logo,
            Some(PathBuf::from("assets/brand-light.png"))
        );
        assert_eq!(config.export.failure_policy, FailurePolicy::Abort);
        assert_eq!(config.export.locking, LockingPolicy::Exclusive);
        assert_eq!(config.export.archive_folder, None);
        // Untouched sections keep their defaults
        assert_eq!(config.naming.noise_tokens, vec!["vite", "react", "img"]);
        assert_eq!(config.app.log_level, "info");
    }

    #[test]
    fn test_reject_out_of_range_opacity() {
        let result = Config::from_toml(
            r#"
            [watermark]
            logo = "logo.png"
            opacity = 1.5
            "#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_reject_zero_quality() {
        let mut config = Config::default();
        config.export.jpeg_quality = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load(Path::new("does/not/exist.toml")).unwrap();
        assert_eq!(config.export.output_directory, PathBuf::from("exports"));
    }
}

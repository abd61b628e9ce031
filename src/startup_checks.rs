use crate::Config;
use crate::compositor::decode_bytes;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create output directory: {0}")]
    OutputDirectoryCreationFailed(#[from] std::io::Error),

    #[error("Watermark asset missing: {0}")]
    WatermarkMissing(String),

    #[error("Watermark asset cannot be decoded: {0}")]
    WatermarkUndecodable(String),

    #[error("Noise token list contains a blank entry")]
    BlankNoiseToken,
}

impl StartupCheckError {
    pub fn is_critical(&self) -> bool {
        !matches!(self, StartupCheckError::BlankNoiseToken)
    }
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    // Check watermark assets
    let mut assets = vec![config.watermark.logo.as_path()];
    if let Some(centered) = &config.watermark.centered_logo {
        assets.push(centered.as_path());
    }
    for asset in assets {
        if let Err(e) = check_watermark_asset(asset).await {
            error!("Watermark asset check failed: {}", e);
            errors.push(e);
        }
    }

    // Check output directory
    let output_dir = &config.export.output_directory;
    if !output_dir.exists() {
        info!("Output directory does not exist, creating: {:?}", output_dir);
        if let Err(e) = tokio::fs::create_dir_all(output_dir).await {
            error!("Failed to create output directory: {}", e);
            errors.push(StartupCheckError::OutputDirectoryCreationFailed(e));
        } else {
            info!("Output directory created successfully");
        }
    } else {
        info!("Output directory exists: {:?}", output_dir);
    }

    // Check naming configuration
    if config
        .naming
        .noise_tokens
        .iter()
        .any(|token| token.trim().is_empty())
    {
        warn!("Blank noise token will be ignored");
        errors.push(StartupCheckError::BlankNoiseToken);
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}

async fn check_watermark_asset(path: &Path) -> Result<(), StartupCheckError> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(_) => {
            return Err(StartupCheckError::WatermarkMissing(
                path.display().to_string(),
            ));
        }
    };

    let name = path.display().to_string();
    let decoded = tokio::task::spawn_blocking(move || decode_bytes(&bytes, name))
        .await
        .map_err(|e| StartupCheckError::WatermarkUndecodable(e.to_string()))?;

    match decoded {
        Ok(image) => {
            info!(
                "Watermark asset {:?} is {}x{}",
                path,
                image.width(),
                image.height()
            );
            Ok(())
        }
        Err(e) => Err(StartupCheckError::WatermarkUndecodable(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn config_in(temp_dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.watermark.logo = temp_dir.path().join("logo.png");
        config.export.output_directory = temp_dir.path().join("exports");
        config
    }

    #[tokio::test]
    async fn test_checks_pass_with_valid_logo() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])))
            .save(&config.watermark.logo)
            .unwrap();

        assert!(perform_startup_checks(&config).await.is_ok());
        assert!(config.export.output_directory.exists());
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_logos_are_critical() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_in(&temp_dir);
        let corrupt = temp_dir.path().join("centered.png");
        std::fs::write(&corrupt, b"not a png").unwrap();
        config.watermark.centered_logo = Some(corrupt);

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], StartupCheckError::WatermarkMissing(_)));
        assert!(matches!(errors[1], StartupCheckError::WatermarkUndecodable(_)));
        assert!(errors.iter().all(StartupCheckError::is_critical));
    }

    #[tokio::test]
    async fn test_blank_noise_token_is_not_critical() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_in(&temp_dir);
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255])))
            .save(&config.watermark.logo)
            .unwrap();
        config.naming.noise_tokens.push("  ".to_string());

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(!errors[0].is_critical());
    }
}

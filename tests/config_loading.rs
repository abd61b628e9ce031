use filigrane::startup_checks::perform_startup_checks;
use filigrane::{Config, FailurePolicy, WatermarkMode, WatermarkSettings};
use image::{DynamicImage, Rgba, RgbaImage};
use tempfile::TempDir;

#[tokio::test]
async fn test_config_file_drives_watermark_settings() {
    let temp_dir = TempDir::new().unwrap();
    let logo_path = temp_dir.path().join("logo.png");
    let centered_path = temp_dir.path().join("logo-centered.png");
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 8, Rgba([0, 0, 0, 255])))
        .save(&logo_path)
        .unwrap();
    DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([255, 255, 255, 255])))
        .save(&centered_path)
        .unwrap();

    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(
        &config_path,
        format!(
            r#"
[app]
name = "ALV watermark"

[watermark]
logo = "{}"
centered_logo = "{}"
mode = "centered"

[export]
output_directory = "{}"
archive_name = "images-alv.zip"
single_fallback_prefix = "image-alv"
archive_fallback_prefix = "image"
jpeg_quality = 85
failure_policy = "skip"
"#,
            logo_path.display(),
            centered_path.display(),
            temp_dir.path().join("exports").display()
        ),
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.app.name, "ALV watermark");
    assert_eq!(config.export.failure_policy, FailurePolicy::Skip);

    assert!(perform_startup_checks(&config).await.is_ok());
    assert!(temp_dir.path().join("exports").is_dir());

    let settings = WatermarkSettings::load(&config).await.unwrap();
    assert_eq!(settings.mode, WatermarkMode::Centered);
    assert_eq!(settings.jpeg_quality, 85);
    assert!(settings.asset().name.ends_with("logo-centered.png"));
    assert!((settings.opacity() - 0.30).abs() < f32::EPSILON);
}

#[tokio::test]
async fn test_invalid_config_file_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("config.toml");
    std::fs::write(&config_path, "[export]\njpeg_quality = \"high\"\n").unwrap();

    assert!(Config::load(&config_path).is_err());
}

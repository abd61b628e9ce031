// Compositor module - decodes a photo, lays the brand watermark over it and
// re-encodes the result as JPEG
mod blend;
mod codec;
mod error;
pub mod placement;

pub use blend::{blend_layer, rotate_stamp};
pub use codec::{decode_bytes, decode_image, encode_jpeg};
pub use error::CompositeError;
pub use placement::{LayerPlacement, plan_layers};

use image::{DynamicImage, RgbaImage, imageops::FilterType};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkMode {
    /// Rotated brick pattern over the whole photo
    #[default]
    Tiled,
    /// One faint logo in the middle
    Centered,
    /// One large opaque logo in the bottom-right corner
    CornerBottomRight,
}

impl WatermarkMode {
    pub fn default_opacity(self) -> f32 {
        match self {
            WatermarkMode::Tiled => 0.85,
            WatermarkMode::Centered => 0.30,
            WatermarkMode::CornerBottomRight => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WatermarkMode::Tiled => "tiled",
            WatermarkMode::Centered => "centered",
            WatermarkMode::CornerBottomRight => "corner-bottom-right",
        }
    }
}

impl std::fmt::Display for WatermarkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoded watermark image, decoded on every composite.
#[derive(Debug, Clone)]
pub struct WatermarkAsset {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl WatermarkAsset {
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }

    pub async fn load(path: &Path) -> Result<Self, std::io::Error> {
        let bytes = tokio::fs::read(path).await?;
        debug!("Loaded watermark asset {:?}: {} bytes", path, bytes.len());
        Ok(Self::from_bytes(path.display().to_string(), bytes))
    }
}

/// Global watermark selection applied to every export at invocation time.
#[derive(Debug, Clone)]
pub struct WatermarkSettings {
    pub mode: WatermarkMode,
    pub logo: WatermarkAsset,
    pub centered_logo: Option<WatermarkAsset>,
    pub opacity: Option<f32>,
    pub jpeg_quality: u8,
}

impl WatermarkSettings {
    pub fn new(mode: WatermarkMode, logo: WatermarkAsset) -> Self {
        Self {
            mode,
            logo,
            centered_logo: None,
            opacity: None,
            jpeg_quality: 90,
        }
    }

    /// Load the logos named in the configuration.
    pub async fn load(config: &crate::Config) -> Result<Self, std::io::Error> {
        let logo = WatermarkAsset::load(&config.watermark.logo).await?;
        let centered_logo = match &config.watermark.centered_logo {
            Some(path) => Some(WatermarkAsset::load(path).await?),
            None => None,
        };

        Ok(Self {
            mode: config.watermark.mode,
            logo,
            centered_logo,
            opacity: config.watermark.opacity,
            jpeg_quality: config.export.jpeg_quality,
        })
    }

    pub fn asset(&self) -> &WatermarkAsset {
        match (self.mode, &self.centered_logo) {
            (WatermarkMode::Centered, Some(centered)) => centered,
            _ => &self.logo,
        }
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
            .unwrap_or_else(|| self.mode.default_opacity())
            .clamp(0.0, 1.0)
    }
}

/// Watermark one encoded photo and return the JPEG bytes.
///
/// The output keeps the source's native dimensions.
pub async fn composite(
    source: Arc<[u8]>,
    settings: &WatermarkSettings,
) -> Result<Vec<u8>, CompositeError> {
    let asset = settings.asset();
    let (base, mark) = tokio::try_join!(
        decode_image(source, "source image"),
        decode_image(asset.bytes.clone(), format!("watermark {}", asset.name)),
    )?;

    let mode = settings.mode;
    let opacity = settings.opacity();
    let quality = settings.jpeg_quality;

    tokio::task::spawn_blocking(move || {
        let surface = render(&base, &mark, mode, opacity);
        encode_jpeg(surface, quality)
    })
    .await
    .map_err(|e| CompositeError::Task(e.to_string()))?
}

/// Draw the watermark onto a copy of `base` according to `mode`.
pub fn render(
    base: &DynamicImage,
    watermark: &DynamicImage,
    mode: WatermarkMode,
    opacity: f32,
) -> RgbaImage {
    let mut surface = base.to_rgba8();
    let (width, height) = surface.dimensions();

    let layers = plan_layers(mode, width, height, watermark.width(), watermark.height());
    // Every layer of a mode shares one size and rotation
    let Some(first) = layers.first() else {
        return surface;
    };

    let scaled = image::imageops::resize(
        &watermark.to_rgba8(),
        first.width,
        first.height,
        FilterType::Lanczos3,
    );
    let stamp = if first.rotation_degrees != 0.0 {
        rotate_stamp(&scaled, first.rotation_degrees)
    } else {
        scaled
    };

    debug!(
        "Rendering {} watermark: {} layer(s) of {}x{} on {}x{} at opacity {}",
        mode,
        layers.len(),
        first.width,
        first.height,
        width,
        height,
        opacity
    );

    for layer in &layers {
        let (center_x, center_y) = layer.center();
        let x = (center_x - stamp.width() as f64 / 2.0).round() as i64;
        let y = (center_y - stamp.height() as f64 / 2.0).round() as i64;
        blend_layer(&mut surface, &stamp, x, y, opacity);
    }

    surface
}

#[cfg(test)]
mod tests {
    mod composite_tests;
    mod placement_tests;
}

use image::{Rgba, RgbaImage, imageops};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};

/// Blend `stamp` onto `target` with its top-left corner at (`x`, `y`).
///
/// The stamp's own alpha is multiplied by `opacity`. Pixels outside the
/// target are clipped.
pub fn blend_layer(target: &mut RgbaImage, stamp: &RgbaImage, x: i64, y: i64, opacity: f32) {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 {
        return;
    }

    let target_width = target.width() as i64;
    let target_height = target.height() as i64;

    let x_start = x.max(0);
    let y_start = y.max(0);
    let x_end = (x + stamp.width() as i64).min(target_width);
    let y_end = (y + stamp.height() as i64).min(target_height);

    for ty in y_start..y_end {
        for tx in x_start..x_end {
            let foreground = *stamp.get_pixel((tx - x) as u32, (ty - y) as u32);
            if foreground[3] == 0 {
                continue;
            }

            let background = target.get_pixel_mut(tx as u32, ty as u32);
            *background = blend_pixels(*background, foreground, opacity);
        }
    }
}

/// Porter-Duff "over" with an extra opacity factor on the foreground.
fn blend_pixels(background: Rgba<u8>, foreground: Rgba<u8>, opacity: f32) -> Rgba<u8> {
    let fg_alpha = (foreground[3] as f32 / 255.0) * opacity;
    let bg_alpha = background[3] as f32 / 255.0;

    let out_alpha = fg_alpha + bg_alpha * (1.0 - fg_alpha);
    if out_alpha < 0.001 {
        return Rgba([0, 0, 0, 0]);
    }

    let channel = |fg: u8, bg: u8| -> u8 {
        let fg = fg as f32 / 255.0;
        let bg = bg as f32 / 255.0;
        let value = (fg * fg_alpha + bg * bg_alpha * (1.0 - fg_alpha)) / out_alpha;
        (value * 255.0).round().clamp(0.0, 255.0) as u8
    };

    Rgba([
        channel(foreground[0], background[0]),
        channel(foreground[1], background[1]),
        channel(foreground[2], background[2]),
        (out_alpha * 255.0).round().clamp(0.0, 255.0) as u8,
    ])
}

/// Rotate a stamp about its centre onto a transparent square canvas large
/// enough to hold it at any angle.
pub fn rotate_stamp(stamp: &RgbaImage, degrees: f32) -> RgbaImage {
    let (width, height) = stamp.dimensions();
    let side = (width as f64).hypot(height as f64).ceil() as u32;

    let mut canvas = RgbaImage::from_pixel(side, side, Rgba([0, 0, 0, 0]));
    imageops::replace(
        &mut canvas,
        stamp,
        ((side - width) / 2) as i64,
        ((side - height) / 2) as i64,
    );

    rotate_about_center(
        &canvas,
        degrees.to_radians(),
        Interpolation::Bilinear,
        Rgba([0, 0, 0, 0]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_stamp_replaces_pixels() {
        let mut target = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let stamp = RgbaImage::from_pixel(4, 4, Rgba([200, 100, 50, 255]));

        blend_layer(&mut target, &stamp, 3, 3, 1.0);

        assert_eq!(*target.get_pixel(3, 3), Rgba([200, 100, 50, 255]));
        assert_eq!(*target.get_pixel(6, 6), Rgba([200, 100, 50, 255]));
        assert_eq!(*target.get_pixel(7, 7), Rgba([0, 0, 0, 255]));
        assert_eq!(*target.get_pixel(2, 2), Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_opacity_scales_contribution() {
        let mut target = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let stamp = RgbaImage::from_pixel(4, 4, Rgba([255, 255, 255, 255]));

        blend_layer(&mut target, &stamp, 0, 0, 0.3);

        let pixel = target.get_pixel(1, 1);
        assert!((76..=77).contains(&pixel[0]), "got {}", pixel[0]);
        assert_eq!(pixel[3], 255);
    }

    #[test]
    fn test_stamp_alpha_and_opacity_combine() {
        let mut target = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 0, 255]));
        let stamp = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 128]));

        blend_layer(&mut target, &stamp, 0, 0, 0.5);

        let value = target.get_pixel(0, 0)[0];
        assert!((60..=68).contains(&value), "got {}", value);
    }

    #[test]
    fn test_zero_opacity_is_noop() {
        let mut target = RgbaImage::from_pixel(3, 3, Rgba([9, 9, 9, 255]));
        let stamp = RgbaImage::from_pixel(3, 3, Rgba([255, 0, 0, 255]));

        blend_layer(&mut target, &stamp, 0, 0, 0.0);

        assert!(target.pixels().all(|p| *p == Rgba([9, 9, 9, 255])));
    }

    #[test]
    fn test_clipping_at_negative_and_far_offsets() {
        let mut target = RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255]));
        let stamp = RgbaImage::from_pixel(6, 6, Rgba([255, 0, 0, 255]));

        blend_layer(&mut target, &stamp, -3, -3, 1.0);
        blend_layer(&mut target, &stamp, 8, 8, 1.0);
        blend_layer(&mut target, &stamp, 50, 50, 1.0);

        assert_eq!(*target.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
        assert_eq!(*target.get_pixel(2, 2), Rgba([255, 0, 0, 255]));
        assert_eq!(*target.get_pixel(3, 3), Rgba([0, 0, 0, 255]));
        assert_eq!(*target.get_pixel(9, 9), Rgba([255, 0, 0, 255]));
        assert_eq!(target.dimensions(), (10, 10));
    }

    #[test]
    fn test_rotate_stamp_canvas_holds_any_angle() {
        let stamp = RgbaImage::from_pixel(30, 10, Rgba([255, 255, 255, 255]));
        let rotated = rotate_stamp(&stamp, -30.0);

        // ceil(hypot(30, 10)) = 32
        assert_eq!(rotated.dimensions(), (32, 32));
        // Centre stays opaque, corners stay transparent
        assert_eq!(rotated.get_pixel(16, 16)[3], 255);
        assert_eq!(rotated.get_pixel(0, 0)[3], 0);
        assert_eq!(rotated.get_pixel(31, 31)[3], 0);
    }
}

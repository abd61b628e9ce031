/// File name for an exported JPEG.
///
/// Uses the trimmed display name (adding `.jpg` when it has no JPEG
/// extension) or `<fallback_prefix>-<position>.jpg` when the name is blank.
/// Path separators are replaced so a name can never point elsewhere.
pub fn export_file_name(display_name: &str, fallback_prefix: &str, position: usize) -> String {
    let trimmed = display_name.trim();
    if trimmed.is_empty() {
        return format!("{}-{}.jpg", fallback_prefix, position);
    }

    let safe: String = trimmed
        .chars()
        .map(|c| match c {
            '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let lower = safe.to_lowercase();
    if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        safe
    } else {
        format!("{}.jpg", safe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_gets_jpg_extension() {
        assert_eq!(export_file_name("Salon", "image", 1), "Salon.jpg");
        assert_eq!(export_file_name("  vue mer  ", "image", 1), "vue mer.jpg");
        assert_eq!(export_file_name("Cuisine.JPG", "image", 1), "Cuisine.JPG");
        assert_eq!(export_file_name("plan.jpeg", "image", 1), "plan.jpeg");
        assert_eq!(export_file_name("plan.png", "image", 1), "plan.png.jpg");
    }

    #[test]
    fn test_blank_name_uses_position_fallback() {
        assert_eq!(export_file_name("   ", "image-alv", 3), "image-alv-3.jpg");
        assert_eq!(export_file_name("", "image", 1), "image-1.jpg");
    }

    #[test]
    fn test_path_separators_replaced() {
        assert_eq!(export_file_name("../etc/passwd", "image", 1), "..-etc-passwd.jpg");
        assert_eq!(export_file_name("a\\b", "image", 1), "a-b.jpg");
    }
}

use regex::Regex;
use std::path::Path;

/// Derives default display names from uploaded file names.
#[derive(Debug, Clone)]
pub struct NameSanitizer {
    noise: Option<Regex>,
    separators: Regex,
    whitespace: Regex,
    fallback: String,
}

impl NameSanitizer {
    pub fn new<S: AsRef<str>>(noise_tokens: &[S], fallback: &str) -> Result<Self, regex::Error> {
        let alternatives: Vec<String> = noise_tokens
            .iter()
            .map(|token| token.as_ref().trim())
            .filter(|token| !token.is_empty())
            .map(regex::escape)
            .collect();

        let noise = if alternatives.is_empty() {
            None
        } else {
            Some(Regex::new(&format!("(?i)(?:{})", alternatives.join("|")))?)
        };

        Ok(Self {
            noise,
            separators: Regex::new(r"[_-]")?,
            whitespace: Regex::new(r"\s+")?,
            fallback: fallback.to_string(),
        })
    }

    pub fn from_config(config: &crate::NamingConfig) -> Result<Self, regex::Error> {
        Self::new(&config.noise_tokens, &config.fallback_name)
    }

    /// Clean a file name into a display name.
    ///
    /// The extension is dropped, noise tokens are removed, `_`/`-` become
    /// spaces and whitespace runs collapse. An empty result yields the
    /// fallback name.
    pub fn sanitize(&self, file_name: &str) -> String {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let without_noise = match &self.noise {
            Some(noise) => noise.replace_all(&stem, "").into_owned(),
            None => stem,
        };
        let spaced = self.separators.replace_all(&without_noise, " ");
        let collapsed = self.whitespace.replace_all(&spaced, " ");
        let cleaned = collapsed.trim();

        if cleaned.is_empty() {
            self.fallback.clone()
        } else {
            cleaned.to_string()
        }
    }
}

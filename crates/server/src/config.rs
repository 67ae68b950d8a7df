use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::bail;
use classifier::{ClassifierSettings, DEFAULT_TIMEOUT_MS};
use gallery_api::{normalize_prefix, ImageSource, DEFAULT_IMAGE_EXTENSIONS, DEFAULT_PUBLIC_PREFIX};
use serde::Deserialize;
use shared::{
    domain::FailurePolicy,
    protocol::{gallery_route, health_route},
};
use tracing::warn;

const SETTINGS_FILE: &str = "server.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub server_bind: String,
    pub image_root: PathBuf,
    pub public_prefix: String,
    pub image_extensions: Vec<String>,
    pub classifier_url: Option<String>,
    pub classifier_timeout_ms: u64,
    pub failure_policy: FailurePolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:8080".into(),
            image_root: PathBuf::from("./public/images"),
            public_prefix: DEFAULT_PUBLIC_PREFIX.into(),
            image_extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            classifier_url: None,
            classifier_timeout_ms: DEFAULT_TIMEOUT_MS,
            failure_policy: FailurePolicy::default(),
        }
    }
}

/// Keys accepted in `server.toml`. Anything missing keeps its default.
#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    bind_addr: Option<String>,
    image_root: Option<PathBuf>,
    public_prefix: Option<String>,
    image_extensions: Option<Vec<String>>,
    classifier_url: Option<String>,
    classifier_timeout_ms: Option<u64>,
    failure_policy: Option<FailurePolicy>,
}

impl Settings {
    pub fn classifier_settings(&self) -> ClassifierSettings {
        ClassifierSettings {
            endpoint: self.classifier_url.clone(),
            timeout_ms: self.classifier_timeout_ms,
        }
    }

    pub fn image_source(&self) -> ImageSource {
        ImageSource::new(&self.image_root, &self.public_prefix)
            .with_extensions(&self.image_extensions)
    }

    /// Rejects settings the router cannot serve.
    pub fn validate(&self) -> anyhow::Result<()> {
        validate_public_prefix(&self.public_prefix)
    }

    fn apply_file(&mut self, file_cfg: FileSettings) {
        if let Some(v) = file_cfg.bind_addr {
            self.server_bind = v;
        }
        if let Some(v) = file_cfg.image_root {
            self.image_root = v;
        }
        if let Some(v) = file_cfg.public_prefix {
            self.public_prefix = normalize_prefix(&v);
        }
        if let Some(v) = file_cfg.image_extensions {
            self.image_extensions = v;
        }
        if let Some(v) = file_cfg.classifier_url {
            self.classifier_url = Some(v);
        }
        if let Some(v) = file_cfg.classifier_timeout_ms {
            self.classifier_timeout_ms = v;
        }
        if let Some(v) = file_cfg.failure_policy {
            self.failure_policy = v;
        }
    }

    /// Later keys win, so `APP__` names override the plain ones.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let var = |keys: &[&str]| keys.iter().rev().find_map(|key| lookup(*key));

        if let Some(v) = var(&["SERVER_BIND", "APP__BIND_ADDR"]) {
            self.server_bind = v;
        }
        if let Some(v) = var(&["IMAGE_ROOT", "APP__IMAGE_ROOT"]) {
            self.image_root = PathBuf::from(v);
        }
        if let Some(v) = var(&["APP__PUBLIC_PREFIX"]) {
            self.public_prefix = normalize_prefix(&v);
        }
        if let Some(v) = var(&["APP__IMAGE_EXTENSIONS"]) {
            self.image_extensions = v
                .split(',')
                .map(str::trim)
                .filter(|ext| !ext.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(v) = var(&["CLASSIFIER_URL", "APP__CLASSIFIER_URL"]) {
            self.classifier_url = Some(v);
        }
        if let Some(v) = var(&["APP__CLASSIFIER_TIMEOUT_MS"]) {
            match v.parse::<u64>() {
                Ok(parsed) => self.classifier_timeout_ms = parsed,
                Err(_) => warn!(value = %v, "ignoring invalid APP__CLASSIFIER_TIMEOUT_MS"),
            }
        }
        if let Some(v) = var(&["APP__FAILURE_POLICY"]) {
            match v.parse::<FailurePolicy>() {
                Ok(parsed) => self.failure_policy = parsed,
                Err(error) => warn!(%error, "ignoring invalid APP__FAILURE_POLICY"),
            }
        }
    }
}

/// The prefix is nested verbatim into the router while rendered links
/// percent-encode it, so it must stay within characters encoding leaves
/// unchanged and must not shadow another route.
fn validate_public_prefix(prefix: &str) -> anyhow::Result<()> {
    if let Some(bad) = prefix
        .chars()
        .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/')))
    {
        bail!(
            "public prefix '{prefix}' contains '{bad}'; use ASCII letters, digits, '-', '.', '_' and '/'"
        );
    }
    if prefix
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        bail!("public prefix '{prefix}' has an empty, '.' or '..' segment");
    }
    for route in [health_route(), gallery_route()] {
        let route = route.trim_start_matches('/');
        if overlaps(prefix, route) {
            bail!("public prefix '{prefix}' collides with the /{route} route");
        }
    }
    Ok(())
}

/// True when one path equals the other or contains it as a leading segment run.
fn overlaps(a: &str, b: &str) -> bool {
    a == b || b.starts_with(&format!("{a}/")) || a.starts_with(&format!("{b}/"))
}

pub fn load_settings() -> Settings {
    load_settings_from(Path::new(SETTINGS_FILE), |key| std::env::var(key).ok())
}

/// Defaults, then the settings file if present, then the environment.
pub fn load_settings_from(
    settings_file: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string(settings_file) {
        match toml::from_str::<FileSettings>(&raw) {
            Ok(file_cfg) => settings.apply_file(file_cfg),
            Err(error) => warn!(
                file = %settings_file.display(),
                %error,
                "ignoring malformed settings file"
            ),
        }
    }

    settings.apply_env(lookup);
    settings
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;

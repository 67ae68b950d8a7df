use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use classifier::Classifier;
use shared::{
    domain::{FailurePolicy, GalleryItem},
    error::{ApiError, ErrorCode},
    protocol::GalleryResponse,
};
use tracing::{debug, error, info, warn};

pub mod view;

pub use view::{GalleryView, TemplateRenderer, ViewError};

pub const DEFAULT_PUBLIC_PREFIX: &str = "images";
pub const DEFAULT_IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "avif", "bmp", "tif", "tiff", "ico", "heic", "heif", "svg",
];

/// Where gallery images live on disk and under which URL prefix they are served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub root: PathBuf,
    pub public_prefix: String,
    /// Lowercase extensions without the dot. Empty accepts every file.
    pub extensions: Vec<String>,
}

impl ImageSource {
    pub fn new(root: impl Into<PathBuf>, public_prefix: &str) -> Self {
        Self {
            root: root.into(),
            public_prefix: normalize_prefix(public_prefix),
            extensions: DEFAULT_IMAGE_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        }
    }

    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        self
    }

    pub fn public_path(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.public_prefix)
    }

    fn accepts(&self, file_name: &str) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        let Some(ext) = Path::new(file_name).extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        self.extensions
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(ext))
    }
}

/// Trims surrounding slashes; an empty prefix falls back to the default.
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        DEFAULT_PUBLIC_PREFIX.to_string()
    } else {
        trimmed.to_string()
    }
}

#[derive(Clone)]
pub struct GalleryContext {
    pub source: ImageSource,
    pub classifier: Option<Arc<dyn Classifier>>,
    pub failure_policy: FailurePolicy,
    pub renderer: Arc<TemplateRenderer>,
}

/// Lists the image directory and labels every image, in directory order.
pub async fn list_gallery(ctx: &GalleryContext) -> Result<Vec<GalleryItem>, ApiError> {
    let root = &ctx.source.root;
    let mut entries = tokio::fs::read_dir(root)
        .await
        .map_err(|err| directory_error(root, err))?;

    let mut items = Vec::new();
    let mut skipped = 0usize;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|err| directory_error(root, err))?
    {
        let file_name = entry.file_name();
        let Some(file_name) = file_name.to_str() else {
            warn!(file = ?file_name, "skipping entry with non UTF-8 name");
            skipped += 1;
            continue;
        };
        if !ctx.source.accepts(file_name) {
            debug!(file = file_name, "skipping entry without an image extension");
            skipped += 1;
            continue;
        }

        let image = entry.path();
        // Follows symlinks so linked images are listed too.
        match tokio::fs::metadata(&image).await {
            Ok(metadata) if metadata.is_file() => {}
            Ok(_) => {
                debug!(file = file_name, "skipping entry that is not a regular file");
                skipped += 1;
                continue;
            }
            Err(err) => {
                warn!(file = file_name, error = %err, "skipping unreadable entry");
                skipped += 1;
                continue;
            }
        }

        let path = ctx.source.public_path(file_name);
        let label = label_for(ctx, &image, &path).await?;
        let item = match label {
            Some(title) => GalleryItem::new(path, title),
            None => GalleryItem::untitled(path),
        };
        debug!(file = file_name, path = %item.path, title = %item.title, "processed image");
        items.push(item);
    }

    info!(
        root = %root.display(),
        count = items.len(),
        skipped,
        classified = ctx.classifier.is_some(),
        "collected gallery items"
    );
    Ok(items)
}

pub async fn gallery_response(ctx: &GalleryContext) -> Result<GalleryResponse, ApiError> {
    let items = list_gallery(ctx).await?;
    Ok(GalleryResponse {
        items,
        classified: ctx.classifier.is_some(),
    })
}

/// Renders the gallery without the enclosing page layout.
pub async fn render_gallery(ctx: &GalleryContext) -> Result<String, ApiError> {
    let imgs = list_gallery(ctx).await?;
    ctx.renderer
        .render(&GalleryView {
            imgs,
            layout: false,
        })
        .map_err(render_error)
}

pub fn render_error_page(ctx: &GalleryContext, err: &ApiError) -> Result<String, ApiError> {
    ctx.renderer.render_error(err).map_err(render_error)
}

/// `None` means the item is titled by its public path.
async fn label_for(
    ctx: &GalleryContext,
    image: &Path,
    public_path: &str,
) -> Result<Option<String>, ApiError> {
    let Some(classifier) = ctx.classifier.as_deref() else {
        return Ok(None);
    };

    match classifier.classify(image).await {
        Ok(label) => Ok(Some(label)),
        Err(err) => match ctx.failure_policy {
            FailurePolicy::Fallback => {
                warn!(image = %image.display(), error = %err, "classification failed; titling image by path");
                Ok(None)
            }
            FailurePolicy::Abort => {
                error!(image = %image.display(), error = %err, "classification failed; aborting gallery");
                Err(ApiError::new(
                    ErrorCode::Classification,
                    format!("failed to classify {public_path}: {err}"),
                ))
            }
        },
    }
}

fn directory_error(root: &Path, err: io::Error) -> ApiError {
    error!(root = %root.display(), error = %err, "failed to read image directory");
    let code = if err.kind() == io::ErrorKind::NotFound {
        ErrorCode::NotFound
    } else {
        ErrorCode::Internal
    };
    ApiError::new(
        code,
        format!("failed to read image directory '{}': {err}", root.display()),
    )
}

fn render_error(err: ViewError) -> ApiError {
    error!(error = %err, "failed to render gallery view");
    ApiError::internal(err.to_string())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

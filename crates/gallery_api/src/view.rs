//! Gallery and error pages rendered with tera.
//!
//! Templates are embedded with `include_str!` so the binary needs no template
//! directory at runtime. HTML autoescaping applies to every template.

use shared::{domain::GalleryItem, error::ApiError};
use tera::{Context, Tera};
use thiserror::Error;

const GALLERY_TEMPLATE: &str = "gallery.html";
const LAYOUT_TEMPLATE: &str = "layout.html";
const ERROR_TEMPLATE: &str = "error.html";
const PAGE_TITLE: &str = "Gallery";

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("failed to load templates: {0}")]
    Load(#[source] tera::Error),
    #[error("failed to render {template}: {source}")]
    Render {
        template: &'static str,
        #[source]
        source: tera::Error,
    },
}

/// What the gallery template receives.
#[derive(Debug, Clone)]
pub struct GalleryView {
    pub imgs: Vec<GalleryItem>,
    /// Wrap the gallery markup in the page layout.
    pub layout: bool,
}

pub struct TemplateRenderer {
    engine: Tera,
}

impl TemplateRenderer {
    pub fn new() -> Result<Self, ViewError> {
        let mut engine = Tera::default();
        engine
            .add_raw_templates(vec![
                (LAYOUT_TEMPLATE, include_str!("../templates/layout.html")),
                (GALLERY_TEMPLATE, include_str!("../templates/gallery.html")),
                (ERROR_TEMPLATE, include_str!("../templates/error.html")),
            ])
            .map_err(ViewError::Load)?;

        Ok(Self { engine })
    }

    pub fn render(&self, view: &GalleryView) -> Result<String, ViewError> {
        let mut context = Context::new();
        context.insert("imgs", &view.imgs);
        let gallery = self.render_template(GALLERY_TEMPLATE, &context)?;

        if !view.layout {
            return Ok(gallery);
        }
        self.wrap_in_layout(&gallery)
    }

    pub fn render_error(&self, error: &ApiError) -> Result<String, ViewError> {
        let mut context = Context::new();
        context.insert("code", &error.code);
        context.insert("message", &error.message);
        let body = self.render_template(ERROR_TEMPLATE, &context)?;
        self.wrap_in_layout(&body)
    }

    fn wrap_in_layout(&self, content: &str) -> Result<String, ViewError> {
        let mut context = Context::new();
        context.insert("title", PAGE_TITLE);
        context.insert("content", content);
        self.render_template(LAYOUT_TEMPLATE, &context)
    }

    fn render_template(&self, template: &'static str, context: &Context) -> Result<String, ViewError> {
        self.engine
            .render(template, context)
            .map_err(|source| ViewError::Render { template, source })
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;

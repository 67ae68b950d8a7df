use gallery_api::GalleryContext;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) gallery: GalleryContext,
}

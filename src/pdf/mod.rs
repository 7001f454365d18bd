//! PDF manipulation module

pub mod metadata;
pub mod overlay;
pub mod stamp;

// Re-export commonly used items
pub use metadata::{count_pages, page_geometries};
pub use overlay::{generate_overlay, OverlayGraphic, OverlaySpec, PageGeometry, Placement};
pub use stamp::watermark_pdf;

// ============================================================================
// Link Preview Models
// ============================================================================

mod link_preview;

pub use link_preview::{LinkPreviewDto, LinkPreviewRequest};

pub mod annotation_renderer;
pub mod bitmap_font;

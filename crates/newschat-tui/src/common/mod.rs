//! Helpers shared by the render paths.

pub mod scrollbar;
pub mod text;

pub use scrollbar::Scrollbar;
pub use text::{roman_numeral, truncate_with_ellipsis, wrap_text};

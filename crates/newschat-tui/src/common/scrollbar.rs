//! Vertical scrollbar drawn at the right edge of a list.
//!
//! The thumb length depends only on the content and viewport sizes, so it
//! stays the same size while the list scrolls.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Widget;

const THUMB: &str = "┃";
const TRACK: &str = "│";

#[derive(Debug, Clone, Copy)]
pub struct Scrollbar {
    total: usize,
    visible: usize,
    offset: usize,
}

impl Scrollbar {
    /// `offset` is the index of the first visible row.
    pub fn new(total: usize, visible: usize, offset: usize) -> Self {
        Self {
            total,
            visible,
            offset,
        }
    }

    /// Row range `[start, end)` of the thumb within a track of `track` rows,
    /// or `None` when everything fits.
    fn thumb(&self, track: usize) -> Option<(usize, usize)> {
        if self.total <= self.visible || track == 0 || self.visible == 0 {
            return None;
        }
        let len = (track * self.visible)
            .div_ceil(self.total)
            .clamp(1, track);
        let max_offset = self.total - self.visible;
        let start = self.offset.min(max_offset) * (track - len) / max_offset;
        Some((start, start + len))
    }
}

impl Widget for Scrollbar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some((start, end)) = self.thumb(area.height as usize) else {
            return;
        };
        let x = area.right().saturating_sub(1);
        let style = Style::default().fg(Color::Indexed(69));
        for (row, y) in (area.top()..area.bottom()).enumerate() {
            let symbol = if (start..end).contains(&row) {
                THUMB
            } else {
                TRACK
            };
            buf.set_string(x, y, symbol, style);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_when_content_fits() {
        assert_eq!(Scrollbar::new(10, 20, 0).thumb(20), None);
        assert_eq!(Scrollbar::new(20, 20, 0).thumb(20), None);
    }

    #[test]
    fn test_thumb_size_is_stable() {
        let top = Scrollbar::new(100, 20, 0).thumb(20);
        let mid = Scrollbar::new(100, 20, 40).thumb(20);
        let bottom = Scrollbar::new(100, 20, 80).thumb(20);

        let len = |t: Option<(usize, usize)>| t.map(|(s, e)| e - s);
        assert_eq!(len(top), Some(4));
        assert_eq!(len(mid), Some(4));
        assert_eq!(len(bottom), Some(4));
        assert_eq!(top.map(|(s, _)| s), Some(0));
        assert_eq!(bottom.map(|(_, e)| e), Some(20));
    }
}

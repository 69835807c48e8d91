//! Pure view functions for a session.
//!
//! Everything here takes `&SessionState`, draws into a ratatui `Frame`, and
//! returns nothing. Styles are built per call.

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Padding, Paragraph};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::common::{Scrollbar, roman_numeral, truncate_with_ellipsis, wrap_text};
use crate::state::{COMPOSE_CHAR_LIMIT, SessionState, View};

const TAB_HEIGHT: u16 = 3;
const COMPOSE_HEIGHT: u16 = 3;
const FOOTER_HEIGHT: u16 = 1;
/// Column width of the right-aligned roman enumerator.
const ENUMERATOR_WIDTH: usize = 7;
/// Detail summaries never wrap wider than this.
const DETAIL_WRAP: usize = 80;

const NEWS_HEADER: [&str; 4] = [
    "The news are brought by newsapi.org;",
    "newschat is not responsible for the content.",
    "",
    "Use j/k to navigate, d to see details.",
];
const FOOTER: &str = "Press Tab to switch tabs. Press Esc to quit";
const COMPOSE_PLACEHOLDER: &str = "Send a message in 280 characters...";

fn tab_style() -> Style {
    Style::default().fg(Color::Indexed(69))
}

fn active_tab_style() -> Style {
    Style::default()
        .fg(Color::Indexed(205))
        .add_modifier(Modifier::UNDERLINED)
}

fn selected_style() -> Style {
    Style::default()
        .fg(Color::Indexed(229))
        .bg(Color::Indexed(57))
        .add_modifier(Modifier::BOLD)
}

/// Alternating row colour for headline `index`.
fn row_color(index: usize) -> Color {
    if index % 2 == 0 {
        Color::Indexed(99)
    } else {
        Color::Indexed(218)
    }
}

fn hint_style() -> Style {
    Style::default().fg(Color::DarkGray)
}

/// Renders the whole session screen.
pub fn render(state: &SessionState, frame: &mut Frame) {
    let area = frame.area();
    if state.detail_visible() {
        render_detail(state, frame, area);
        return;
    }

    let compose_height = if state.view == View::Chat {
        COMPOSE_HEIGHT
    } else {
        0
    };
    let [tabs, content, compose, footer] = Layout::vertical([
        Constraint::Length(TAB_HEIGHT),
        Constraint::Min(0),
        Constraint::Length(compose_height),
        Constraint::Length(FOOTER_HEIGHT),
    ])
    .areas(area);

    render_tabs(state, frame, tabs);
    match state.view {
        View::News => render_news_list(state, frame, content),
        View::Chat => {
            render_chat_log(state, frame, content);
            render_compose(state, frame, compose);
        }
    }
    frame.render_widget(Paragraph::new(FOOTER).style(hint_style()), footer);
}

fn render_tabs(state: &SessionState, frame: &mut Frame, area: Rect) {
    let chat_label = if state.has_unread { "Chat*" } else { "Chat" };
    let labels = [(View::News, "News"), (View::Chat, chat_label)];

    let constraints = labels
        .iter()
        .map(|(_, label)| Constraint::Length(label.width() as u16 + 4))
        .chain(std::iter::once(Constraint::Min(0)));
    let slots = Layout::horizontal(constraints).split(area);

    for ((view, label), slot) in labels.into_iter().zip(slots.iter()) {
        let text_style = if view == state.view {
            active_tab_style()
        } else {
            Style::default()
        };
        let tab = Paragraph::new(Span::styled(label, text_style)).block(
            Block::bordered()
                .border_style(tab_style())
                .padding(Padding::horizontal(1)),
        );
        frame.render_widget(tab, *slot);
    }
}

fn render_news_list(state: &SessionState, frame: &mut Frame, area: Rect) {
    let inner = Block::default().padding(Padding::new(2, 2, 1, 1)).inner(area);
    let width = inner.width as usize;

    let mut header: Vec<Line<'static>> = Vec::new();
    if let Some(art) = &state.welcome {
        header.extend(art.lines().map(|line| {
            Line::styled(
                line.to_string(),
                Style::default()
                    .fg(Color::Indexed(69))
                    .add_modifier(Modifier::BOLD),
            )
        }));
        header.push(Line::default());
    }
    header.extend(NEWS_HEADER.iter().map(|line| Line::raw(*line)));
    header.push(Line::default());

    let header_height = (header.len() as u16).min(inner.height);
    let [header_area, list_area] =
        Layout::vertical([Constraint::Length(header_height), Constraint::Min(0)]).areas(inner);
    frame.render_widget(Paragraph::new(header), header_area);

    if state.news.is_empty() {
        frame.render_widget(
            Paragraph::new("No headlines yet. Check back in a few minutes.")
                .style(hint_style()),
            list_area,
        );
        return;
    }

    let visible = list_area.height as usize;
    let offset = list_offset(state.selected, visible);
    let headline_width = width.saturating_sub(ENUMERATOR_WIDTH + 2 + 1);

    let rows: Vec<Line<'static>> = state
        .news
        .iter()
        .enumerate()
        .skip(offset)
        .take(visible)
        .map(|(index, item)| {
            let label = format!("{}. ", roman_numeral(index + 1));
            let pad = Span::raw(" ".repeat(ENUMERATOR_WIDTH.saturating_sub(label.len() - 1)));
            let headline = truncate_with_ellipsis(&item.headline, headline_width);
            if index == state.selected {
                Line::from(vec![pad, Span::styled(label + &headline, selected_style())])
            } else {
                let style = Style::default().fg(row_color(index));
                Line::from(vec![
                    pad,
                    Span::styled(label, style),
                    Span::styled(headline, style),
                ])
            }
        })
        .collect();

    frame.render_widget(Paragraph::new(rows), list_area);
    frame.render_widget(Scrollbar::new(state.news.len(), visible, offset), list_area);
}

/// First visible row so that `selected` stays on screen.
fn list_offset(selected: usize, visible: usize) -> usize {
    if visible == 0 {
        return 0;
    }
    selected.saturating_sub(visible - 1)
}

fn render_chat_log(state: &SessionState, frame: &mut Frame, area: Rect) {
    let inner = Block::default().padding(Padding::new(2, 2, 1, 0)).inner(area);
    let width = inner.width as usize;
    let sender_style = Style::default().fg(Color::Indexed(5));

    let height = inner.height as usize;

    // Wrap newest first and stop once the area is full.
    let mut lines: Vec<Line<'static>> = Vec::new();
    for chat in state.chat_log.iter().rev() {
        if lines.len() >= height {
            break;
        }
        let mut group = Vec::new();
        let prefix = format!("{}:", chat.sender);
        let wrapped = wrap_text(&format!("{prefix} {}", chat.body), width);
        for (i, text) in wrapped.into_iter().enumerate() {
            let rest = if i == 0 {
                text.strip_prefix(prefix.as_str()).map(str::to_string)
            } else {
                None
            };
            match rest {
                Some(rest) => group.push(Line::from(vec![
                    Span::styled(chat.sender.clone(), sender_style),
                    Span::raw(format!(":{rest}")),
                ])),
                None => group.push(Line::raw(text)),
            }
        }
        lines.extend(group.into_iter().rev());
    }
    lines.reverse();

    if state.chat_log.is_empty() {
        frame.render_widget(
            Paragraph::new("No messages yet. Say hello!").style(hint_style()),
            inner,
        );
        return;
    }

    // Pin to the bottom: newest line sits on the last row.
    let skip = lines.len().saturating_sub(height);
    let pad = height.saturating_sub(lines.len());
    let visible: Vec<Line<'static>> = std::iter::repeat_with(Line::default)
        .take(pad)
        .chain(lines.into_iter().skip(skip))
        .collect();
    frame.render_widget(Paragraph::new(visible), inner);
}

fn render_compose(state: &SessionState, frame: &mut Frame, area: Rect) {
    let block = Block::bordered()
        .border_style(tab_style())
        .title(format!(" {}/{COMPOSE_CHAR_LIMIT} ", state.compose_len()));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if inner.width == 0 || inner.height == 0 {
        return;
    }

    if state.compose.is_empty() {
        frame.render_widget(Paragraph::new(COMPOSE_PLACEHOLDER).style(hint_style()), inner);
        frame.set_cursor_position((inner.x, inner.y));
        return;
    }

    // Single line that scrolls horizontally, keeping the cursor in view.
    let room = inner.width.saturating_sub(1) as usize;
    let tail = visible_tail(&state.compose, room);
    let cursor_x = inner.x + tail.width() as u16;
    frame.render_widget(Paragraph::new(tail.to_string()), inner);
    frame.set_cursor_position((cursor_x, inner.y));
}

/// Longest suffix of `text` that fits in `width` columns.
fn visible_tail(text: &str, width: usize) -> &str {
    let mut start = text.len();
    let mut used = 0;
    for (idx, ch) in text.char_indices().rev() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        start = idx;
    }
    &text[start..]
}

fn render_detail(state: &SessionState, frame: &mut Frame, area: Rect) {
    let Some(item) = state.selected_item() else {
        frame.render_widget(Paragraph::new("No news available to display."), area);
        return;
    };

    let box_style = selected_style();
    let [box_area, _, hint_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .areas(area);

    let block = Block::bordered()
        .style(box_style)
        .padding(Padding::new(2, 2, 1, 1));
    let inner_width = block.inner(box_area).width as usize;
    let wrap_width = inner_width.min(DETAIL_WRAP);

    let title = format!("Detail for: {}", item.headline);
    let mut lines: Vec<Line<'static>> = wrap_text(&title, wrap_width)
        .into_iter()
        .map(Line::raw)
        .collect();
    lines.push(Line::default());
    lines.extend(wrap_text(&item.summary, wrap_width).into_iter().map(Line::raw));
    lines.push(Line::default());
    lines.push(Line::from(vec![
        Span::raw("Read more: "),
        Span::styled(
            item.link.clone(),
            Style::default()
                .fg(Color::Indexed(82))
                .add_modifier(Modifier::UNDERLINED),
        ),
    ]));

    frame.render_widget(Paragraph::new(lines).block(block), box_area);
    frame.render_widget(
        Paragraph::new("Press Esc to close detail.").style(hint_style()),
        hint_area,
    );
}

#[cfg(test)]
mod tests {
    use newschat_core::{ChatLine, HeadlineItem, Snapshot};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::buffer::Buffer;

    use super::*;

    fn headlines(n: usize) -> Snapshot {
        (0..n)
            .map(|i| HeadlineItem {
                headline: format!("Headline {i}"),
                summary: format!("Summary of story {i}"),
                link: format!("https://example.com/{i}"),
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn draw(state: &SessionState, width: u16, height: u16) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(state, frame)).unwrap();
        terminal.backend().buffer().clone()
    }

    fn text(buffer: &Buffer) -> String {
        let width = buffer.area.width as usize;
        buffer
            .content()
            .chunks(width)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_news_view_lists_headlines_with_roman_enumerators() {
        let state = SessionState::new("alice", headlines(4));
        let screen = text(&draw(&state, 70, 24));

        assert!(screen.contains("News"));
        assert!(screen.contains("Use j/k to navigate, d to see details."));
        assert!(screen.contains("I. Headline 0"));
        assert!(screen.contains("IV. Headline 3"));
        assert!(screen.contains(FOOTER));
        assert!(!screen.contains(COMPOSE_PLACEHOLDER));
    }

    #[test]
    fn test_selected_headline_is_highlighted() {
        let mut state = SessionState::new("alice", headlines(3));
        state.selected = 1;
        let buffer = draw(&state, 70, 24);
        let screen = text(&buffer);

        let row = screen
            .lines()
            .position(|line| line.contains("Headline 1"))
            .unwrap();
        let col = screen.lines().nth(row).unwrap().find("Headline 1").unwrap();
        let cell = &buffer[(col as u16, row as u16)];
        assert_eq!(cell.bg, Color::Indexed(57));
    }

    #[test]
    fn test_selection_scrolls_into_view() {
        let mut state = SessionState::new("alice", headlines(40));
        state.selected = 39;
        let screen = text(&draw(&state, 70, 20));
        assert!(screen.contains("XL. Headline 39"));
        assert!(!screen.contains("Headline 0 "));
    }

    #[test]
    fn test_unread_marker_on_chat_tab() {
        let mut state = SessionState::new("alice", headlines(1));
        state.has_unread = true;
        assert!(text(&draw(&state, 60, 20)).contains("Chat*"));
    }

    #[test]
    fn test_empty_news_list_message() {
        let state = SessionState::new("alice", Snapshot::empty());
        assert!(text(&draw(&state, 70, 20)).contains("No headlines yet"));
    }

    #[test]
    fn test_detail_view_replaces_screen() {
        let mut state = SessionState::new("alice", headlines(2));
        state.selected = 1;
        state.show_detail = true;
        let screen = text(&draw(&state, 70, 20));

        assert!(screen.contains("Detail for: Headline 1"));
        assert!(screen.contains("Summary of story 1"));
        assert!(screen.contains("Read more: https://example.com/1"));
        assert!(screen.contains("Press Esc to close detail."));
        assert!(!screen.contains(FOOTER));
    }

    #[test]
    fn test_detail_with_no_news() {
        let mut state = SessionState::new("alice", Snapshot::empty());
        state.show_detail = true;
        assert!(text(&draw(&state, 60, 10)).contains("No news available to display."));
    }

    #[test]
    fn test_chat_view_shows_log_and_compose() {
        let mut state = SessionState::new("alice", Snapshot::empty());
        state.view = View::Chat;
        state.chat_log.push(ChatLine::new("bob", "hello there"));
        state.compose = "typing".to_string();
        let screen = text(&draw(&state, 60, 20));

        assert!(screen.contains("bob: hello there"));
        assert!(screen.contains("typing"));
        assert!(screen.contains("6/280"));
    }

    #[test]
    fn test_chat_log_pins_newest_to_bottom() {
        let mut state = SessionState::new("alice", Snapshot::empty());
        state.view = View::Chat;
        for i in 0..50 {
            state.chat_log.push(ChatLine::new("bob", format!("message {i}")));
        }
        let screen = text(&draw(&state, 60, 20));
        assert!(screen.contains("message 49"));
        assert!(!screen.contains("message 0 "));
    }

    #[test]
    fn test_wrapped_chat_line_keeps_order() {
        let mut state = SessionState::new("alice", Snapshot::empty());
        state.view = View::Chat;
        state.chat_log.push(ChatLine::new("bob", "first"));
        state
            .chat_log
            .push(ChatLine::new("carol", "alpha beta gamma delta epsilon zeta"));
        let screen = text(&draw(&state, 24, 20));

        let first = screen.find("bob: first").unwrap();
        let alpha = screen.find("carol: alpha").unwrap();
        let zeta = screen.find("zeta").unwrap();
        assert!(first < alpha);
        assert!(alpha < zeta);
    }

    #[test]
    fn test_compose_placeholder_when_empty() {
        let mut state = SessionState::new("alice", Snapshot::empty());
        state.view = View::Chat;
        let screen = text(&draw(&state, 60, 20));
        assert!(screen.contains(COMPOSE_PLACEHOLDER));
        assert!(screen.contains("0/280"));
    }

    #[test]
    fn test_visible_tail() {
        assert_eq!(visible_tail("hello", 10), "hello");
        assert_eq!(visible_tail("hello", 3), "llo");
        assert_eq!(visible_tail("日本語", 4), "本語");
    }

    #[test]
    fn test_list_offset_keeps_selection_visible() {
        assert_eq!(list_offset(0, 5), 0);
        assert_eq!(list_offset(4, 5), 0);
        assert_eq!(list_offset(7, 5), 3);
        assert_eq!(list_offset(3, 0), 0);
    }
}

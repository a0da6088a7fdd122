use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Paragraph, Wrap};

use crate::tui::app::{App, MAX_SUGGESTION_ROWS, Notice};

const SELF_COLOR: Color = Color::Cyan;
const OTHER_COLOR: Color = Color::Green;
const DIM: Style = Style::new().fg(Color::DarkGray);
const TYPEAHEAD_ACTIVE: Style = Style::new().fg(Color::Yellow);
const MENTION_STYLE: Style = Style::new().fg(Color::Yellow).add_modifier(Modifier::BOLD);
const PROMPT_STYLE: Style = Style::new().fg(Color::Magenta);

pub fn render(frame: &mut Frame, app: &mut App) {
    let area = frame.area();

    let notice = app.notice();
    let suggestion_rows = suggestion_rows(app);
    let input_height = calculate_input_height(app, area.width);
    let chunks = Layout::vertical([
        Constraint::Min(1),
        Constraint::Length(u16::from(notice.is_some())),
        Constraint::Length(1), // separator
        Constraint::Length(suggestion_rows),
        Constraint::Length(input_height),
    ])
    .split(area);

    render_messages(frame, app, chunks[0]);
    if let Some(notice) = notice {
        render_notice(frame, &notice, chunks[1]);
    }
    render_separator(frame, app, chunks[2]);
    app.suggestion_area = (chunks[3].height > 0).then_some(chunks[3]);
    render_suggestions(frame, app, chunks[3]);
    render_input(frame, app, chunks[4]);
}

/// Manually wrap a styled line to fit within `width` columns.
fn wrap_line(line: &Line, width: usize) -> Vec<Line<'static>> {
    if width == 0 {
        return vec![Line::raw("")];
    }

    let mut chars: Vec<(char, Style)> = Vec::new();
    for span in &line.spans {
        for ch in span.content.chars() {
            chars.push((ch, span.style));
        }
    }

    let Some(&(_, first_style)) = chars.first() else {
        return vec![Line::raw("")];
    };

    let mut result: Vec<Line<'static>> = Vec::new();
    let mut col = 0;
    let mut current_spans: Vec<Span<'static>> = Vec::new();
    let mut current_text = String::new();
    let mut current_style = first_style;

    for (ch, style) in chars {
        if style != current_style {
            if !current_text.is_empty() {
                current_spans.push(Span::styled(
                    std::mem::take(&mut current_text),
                    current_style,
                ));
            }
            current_style = style;
        }

        if col >= width {
            if !current_text.is_empty() {
                current_spans.push(Span::styled(
                    std::mem::take(&mut current_text),
                    current_style,
                ));
            }
            result.push(Line::from(std::mem::take(&mut current_spans)));
            col = 0;
        }

        current_text.push(ch);
        col += 1;
    }

    if !current_text.is_empty() {
        current_spans.push(Span::styled(current_text, current_style));
    }
    if !current_spans.is_empty() {
        result.push(Line::from(current_spans));
    }

    result
}

fn build_message_lines(app: &App, width: usize) -> Vec<Line<'static>> {
    let mut logical_lines: Vec<Line> = Vec::new();

    for message in &app.messages {
        if !logical_lines.is_empty() {
            logical_lines.push(Line::raw(""));
        }

        let color = if message.user_id.is_some() && message.user_id == app.user_id {
            SELF_COLOR
        } else {
            OTHER_COLOR
        };
        let mut header = vec![Span::styled(
            app.author_label(message.user_id),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )];
        if let Some(timestamp) = &message.timestamp {
            header.push(Span::styled(format!("  {timestamp}"), DIM));
        }
        logical_lines.push(Line::from(header));

        for text_line in message.content.lines() {
            logical_lines.push(Line::raw(text_line.to_string()));
        }

        if let Some(label) = app.reactions.label(message.id) {
            logical_lines.push(Line::from(Span::styled(label, DIM)));
        }
    }

    if logical_lines.is_empty() {
        logical_lines.push(Line::from(Span::styled(
            "No messages yet. Type @ to mention someone.".to_string(),
            DIM,
        )));
    }

    logical_lines
        .iter()
        .flat_map(|line| wrap_line(line, width))
        .collect()
}

fn render_messages(frame: &mut Frame, app: &mut App, area: Rect) {
    let width = area.width as usize;
    let visible = area.height as usize;
    let mut lines = build_message_lines(app, width);

    // Anchor to bottom: pad top if content is shorter than viewport.
    if lines.len() < visible {
        let mut padded = vec![Line::raw(""); visible - lines.len()];
        padded.append(&mut lines);
        lines = padded;
    }

    let total = lines.len();
    let max_scroll = total.saturating_sub(visible);
    (app.max_scroll, app.scroll_offset) =
        scroll_state(app.scroll_offset, app.max_scroll, max_scroll);

    let scroll = max_scroll - app.scroll_offset as usize;
    let visible_lines = &lines[scroll..scroll + visible.min(total)];
    frame.render_widget(Paragraph::new(Text::from(visible_lines.to_vec())), area);
}

/// New `(max_scroll, scroll_offset)` for a history with `max_scroll`
/// scrollable lines. Offsets past `u16::MAX` lines from the bottom are not
/// reachable.
fn scroll_state(offset: u16, prev_max: u16, max_scroll: usize) -> (u16, u16) {
    let max = u16::try_from(max_scroll).unwrap_or(u16::MAX);
    let mut offset = offset;
    // If scrolled up and content grew, bump offset to keep viewport stable.
    if offset > 0 && max > prev_max {
        offset = offset.saturating_add(max - prev_max);
    }
    (max, offset.min(max))
}

fn render_notice(frame: &mut Frame, notice: &Notice, area: Rect) {
    let line = match notice {
        Notice::PermissionPrompt => Line::from(Span::styled(
            "Show a notification when someone mentions you? [y/n]",
            PROMPT_STYLE,
        )),
        Notice::Mention(notification) => Line::from(vec![
            Span::styled(format!("{}: ", notification.title), MENTION_STYLE),
            Span::raw(notification.body.clone()),
        ]),
        Notice::Typing => Line::from(Span::styled("someone is typing…", DIM)),
        Notice::Status(status) => Line::from(Span::styled(status.clone(), DIM)),
    };
    frame.render_widget(Paragraph::new(line), area);
}

fn render_separator(frame: &mut Frame, app: &App, area: Rect) {
    let width = area.width as usize;
    let mut title = match &app.channel_name {
        Some(name) => format!("─ #{name} "),
        None => format!("─ channel {} ", app.channel_id),
    };
    if app.is_searching() {
        title.push_str("─ searching… ");
    }
    let fill = width.saturating_sub(title.chars().count());
    let line = Line::from(Span::styled(format!("{title}{}", "─".repeat(fill)), DIM));
    frame.render_widget(Paragraph::new(line), area);
}

fn suggestion_rows(app: &App) -> u16 {
    app.suggestions()
        .map_or(0, |suggestions| suggestions.len().min(MAX_SUGGESTION_ROWS) as u16)
}

fn render_suggestions(frame: &mut Frame, app: &App, area: Rect) {
    if area.height == 0 {
        return;
    }
    let Some(suggestions) = app.suggestions() else {
        return;
    };

    let selected = app.selected_suggestion();
    let start = app.suggestion_window_start();
    let lines: Vec<Line> = suggestions
        .iter()
        .enumerate()
        .skip(start)
        .take(area.height as usize)
        .map(|(index, suggestion)| {
            let is_selected = selected == Some(index);
            let marker = if is_selected { "› " } else { "  " };
            let token_style = if is_selected {
                TYPEAHEAD_ACTIVE
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(marker, DIM),
                Span::styled(suggestion.token_text(), token_style),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(Text::from(lines)), area);
}

fn render_input(frame: &mut Frame, app: &App, area: Rect) {
    if area.width == 0 || area.height == 0 {
        return;
    }

    let prompt_width = area.width.min(2);
    let prompt_area = Rect {
        x: area.x,
        y: area.y,
        width: prompt_width,
        height: 1,
    };
    frame.render_widget(
        Paragraph::new(Span::styled("> ", Style::default().fg(Color::DarkGray))),
        prompt_area,
    );

    let text_area = Rect {
        x: area.x.saturating_add(2),
        y: area.y,
        width: area.width.saturating_sub(2),
        height: area.height,
    };

    if text_area.width > 0 {
        let input_text = if app.input.is_empty() {
            Text::from(Span::styled("Type a message...", DIM))
        } else {
            Text::raw(app.input.as_str())
        };
        frame.render_widget(
            Paragraph::new(input_text).wrap(Wrap { trim: false }),
            text_area,
        );
    }

    let inner_width = text_area.width.max(1) as usize;
    let (cursor_row, cursor_col) = cursor_position(&app.input, app.cursor_pos, inner_width);
    let max_row = area.height.saturating_sub(1) as usize;
    let cursor_x = text_area
        .x
        .saturating_add(cursor_col.min(inner_width.saturating_sub(1)) as u16);
    frame.set_cursor_position((cursor_x, area.y + cursor_row.min(max_row) as u16));
}

fn calculate_input_height(app: &App, width: u16) -> u16 {
    let inner_width = width.saturating_sub(2).max(1) as usize;
    let rows = app.input.chars().count().max(1).div_ceil(inner_width);
    (rows as u16).clamp(1, 4)
}

fn cursor_position(input: &str, byte_pos: usize, width: usize) -> (usize, usize) {
    let width = width.max(1);
    let mut byte_pos = byte_pos.min(input.len());
    while byte_pos > 0 && !input.is_char_boundary(byte_pos) {
        byte_pos -= 1;
    }
    let chars = input[..byte_pos].chars().count();
    (chars / width, chars % width)
}

#[cfg(test)]
mod tests {
    use parley_core::{Permission, SearchResponse, Suggestion};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use ratatui::text::Line;

    use super::{cursor_position, render, scroll_state, wrap_line};
    use crate::tui::app::App;

    fn screen(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        let mut out = String::new();
        for y in 0..buffer.area.height {
            for x in 0..buffer.area.width {
                out.push_str(buffer[(x, y)].symbol());
            }
            out.push('\n');
        }
        out
    }

    #[test]
    fn wrap_splits_long_lines() {
        let wrapped = wrap_line(&Line::raw("abcdef"), 4);
        assert_eq!(wrapped.len(), 2);
        assert_eq!(wrapped[1].to_string(), "ef");
    }

    #[test]
    fn scroll_state_saturates_on_huge_histories() {
        assert_eq!(scroll_state(0, 0, 100_000), (u16::MAX, 0));
        assert_eq!(scroll_state(60_000, 10, 100_000), (u16::MAX, u16::MAX));
        assert_eq!(scroll_state(5, 10, 12), (12, 7));
        assert_eq!(scroll_state(20, 30, 8), (8, 8));
    }

    #[test]
    fn cursor_wraps_with_width() {
        assert_eq!(cursor_position("hello", 5, 10), (0, 5));
        assert_eq!(cursor_position("hello world", 11, 4), (2, 3));
        assert_eq!(cursor_position("é", 1, 10), (0, 0));
    }

    #[test]
    fn renders_suggestions_with_selection_marker() {
        let mut app = App::new(1, Some(1), Some("me".to_string()), Permission::Granted);
        for c in "hi @al".chars() {
            app.handle_key(crossterm::event::KeyEvent::new(
                crossterm::event::KeyCode::Char(c),
                crossterm::event::KeyModifiers::NONE,
            ));
        }
        let request = app.take_search_requests().pop().unwrap();
        app.handle_search_response(SearchResponse {
            seq: request.seq,
            query: request.query,
            suggestions: vec![Suggestion::new("alice"), Suggestion::new("albert")],
        });
        app.handle_key(crossterm::event::KeyEvent::new(
            crossterm::event::KeyCode::Down,
            crossterm::event::KeyModifiers::NONE,
        ));

        let mut terminal = Terminal::new(TestBackend::new(30, 8)).unwrap();
        terminal.draw(|frame| render(frame, &mut app)).unwrap();
        let text = screen(&terminal);

        assert!(text.contains("› @alice"));
        assert!(text.contains("  @albert"));
        let area = app.suggestion_area.expect("suggestions drawn");
        assert_eq!(area.height, 2);
    }

    #[test]
    fn empty_result_renders_no_rows() {
        let mut app = App::new(1, None, None, Permission::Denied);
        for c in "@zz".chars() {
            app.handle_key(crossterm::event::KeyEvent::new(
                crossterm::event::KeyCode::Char(c),
                crossterm::event::KeyModifiers::NONE,
            ));
        }
        let request = app.take_search_requests().pop().unwrap();
        app.handle_search_response(SearchResponse {
            seq: request.seq,
            query: request.query,
            suggestions: Vec::new(),
        });

        let mut terminal = Terminal::new(TestBackend::new(30, 6)).unwrap();
        terminal.draw(|frame| render(frame, &mut app)).unwrap();
        assert!(app.suggestion_area.is_none());
    }
}

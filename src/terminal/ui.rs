//! Drawing
//!
//! A frame is first captured into an owned [`Screen`] so the renderer can
//! repaint it later (under a prompt, after a resize) without access to the
//! session.

use chrono::Local;
use notch_core::buffer::{Buffer, SearchBuffer, ThreadBuffer};
use notch_core::render::{NotificationLevel, View};
use notch_core::store::TagSet;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

/// Seconds a notification stays on screen
const NOTIFICATION_TIMEOUT: i64 = 10;

/// Lines of the notification area at most
const MAX_NOTIFICATION_LINES: usize = 8;

#[derive(Debug, Default, Clone)]
pub struct Screen {
    pub rows: Vec<Line<'static>>,
    pub selected: Option<usize>,
    pub status_left: String,
    pub status_right: String,
    pub notifications: Vec<(NotificationLevel, String)>,
}

/// The prompt line while the user is typing
#[derive(Debug, Clone)]
pub struct PromptLine {
    pub prefix: String,
    pub text: String,
    /// Cursor position in chars
    pub cursor: usize,
}

impl Screen {
    pub fn capture(view: &View<'_>) -> Self {
        let now = Local::now();
        let notifications = view
            .notifications
            .iter()
            .filter(|n| (now - n.at).num_seconds() < NOTIFICATION_TIMEOUT)
            .map(|n| (n.level, n.message.clone()))
            .collect();

        let registry = view.buffers;
        let Some(current) = registry.current() else {
            return Self {
                status_left: "no buffers".to_string(),
                notifications,
                ..Self::default()
            };
        };

        let position = registry
            .iter()
            .position(|(id, _)| Some(id) == registry.current_id())
            .map_or(0, |p| p + 1);
        let (rows, selected) = match current {
            Buffer::Search(search) => (search_rows(search), Some(search.selected)),
            Buffer::SingleThread(thread) => (thread_rows(thread), Some(thread.selected + 1)),
            Buffer::Envelope(envelope) => {
                let mut rows: Vec<Line<'static>> = envelope
                    .mail
                    .headers()
                    .map(|(key, value)| {
                        Line::from(vec![
                            Span::styled(format!("{}: ", key), Style::default().fg(Color::Cyan)),
                            Span::raw(value.to_string()),
                        ])
                    })
                    .collect();
                rows.push(Line::from(""));
                rows.extend(envelope.mail.body().lines().map(|l| Line::from(l.to_string())));
                (rows, None)
            }
            Buffer::BufferList(list) => {
                let rows = registry
                    .listed(list)
                    .into_iter()
                    .enumerate()
                    .filter_map(|(idx, id)| registry.get(id).map(|b| (idx, b)))
                    .map(|(idx, buffer)| {
                        Line::from(vec![
                            Span::styled(format!("{:>3} ", idx + 1), Style::default().fg(Color::Gray)),
                            Span::styled(
                                format!("{:<12} ", buffer.kind().name()),
                                Style::default().fg(Color::Yellow),
                            ),
                            Span::raw(buffer.title()),
                        ])
                    })
                    .collect();
                (rows, Some(list.selected))
            }
            Buffer::TagList(list) => (
                list.tags.iter().map(|tag| Line::from(tag.clone())).collect(),
                Some(list.selected),
            ),
        };

        let status_right = match current.row_count() {
            Some(count) if count > 0 => format!("{}/{}", current.selected() + 1, count),
            _ => String::new(),
        };

        Self {
            rows,
            selected,
            status_left: format!("[{}/{}] {}", position, registry.len(), current.title()),
            status_right,
            notifications,
        }
    }
}

fn tag_span(tags: &TagSet) -> Span<'static> {
    let joined = tags.iter().cloned().collect::<Vec<_>>().join(" ");
    Span::styled(format!(" ({})", joined), Style::default().fg(Color::Magenta))
}

fn search_rows(search: &SearchBuffer) -> Vec<Line<'static>> {
    search
        .lines
        .iter()
        .map(|thread| {
            let authors = truncate_chars(&thread.authors.join(", "), 24);
            let style = if thread.tags.contains("unread") {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            Line::from(vec![
                Span::styled(format!("[{:>2}] ", thread.total_messages), Style::default().fg(Color::Gray)),
                Span::styled(format!("{:<24} ", authors), Style::default().fg(Color::Cyan)),
                Span::styled(thread.subject.clone(), style),
                tag_span(&thread.tags),
            ])
        })
        .collect()
}

fn thread_rows(thread: &ThreadBuffer) -> Vec<Line<'static>> {
    let mut rows = vec![Line::from(Span::styled(
        thread.subject.clone(),
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    rows.extend(thread.messages.iter().map(|msg| {
        Line::from(vec![
            Span::styled(format!("{} ", msg.date), Style::default().fg(Color::Gray)),
            Span::raw(msg.from.clone()),
            tag_span(&msg.tags),
        ])
    }));
    rows
}

fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}

pub fn render(frame: &mut Frame, screen: &Screen, prompt: Option<&PromptLine>) {
    let notification_lines = screen
        .notifications
        .iter()
        .map(|(_, msg)| msg.lines().count().max(1))
        .sum::<usize>()
        .min(MAX_NOTIFICATION_LINES) as u16;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),
            Constraint::Length(notification_lines),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.area());

    render_body(frame, screen, chunks[0]);
    render_notifications(frame, screen, chunks[1]);
    render_status(frame, screen, chunks[2]);
    if let Some(prompt) = prompt {
        render_prompt(frame, prompt, chunks[3]);
    }
}

fn render_body(frame: &mut Frame, screen: &Screen, area: Rect) {
    let items: Vec<ListItem> = screen.rows.iter().cloned().map(ListItem::new).collect();
    let list = List::new(items)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    let mut state = ListState::default();
    state.select(screen.selected.filter(|_| !screen.rows.is_empty()));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_notifications(frame: &mut Frame, screen: &Screen, area: Rect) {
    if area.height == 0 {
        return;
    }
    let lines: Vec<Line> = screen
        .notifications
        .iter()
        .flat_map(|(level, msg)| {
            let style = match level {
                NotificationLevel::Error => Style::default().fg(Color::White).bg(Color::Red),
                NotificationLevel::Info => Style::default().fg(Color::Black).bg(Color::Gray),
            };
            msg.lines()
                .map(move |line| Line::from(Span::styled(line.to_string(), style)))
                .collect::<Vec<_>>()
        })
        .collect();
    let skip = lines.len().saturating_sub(area.height as usize);
    let visible: Vec<Line> = lines.into_iter().skip(skip).collect();
    frame.render_widget(Paragraph::new(visible).wrap(Wrap { trim: false }), area);
}

fn render_status(frame: &mut Frame, screen: &Screen, area: Rect) {
    let width = area.width as usize;
    let right = &screen.status_right;
    let left = truncate_chars(
        &screen.status_left,
        width.saturating_sub(right.chars().count() + 1),
    );
    let padding = width.saturating_sub(left.chars().count() + right.chars().count());
    let text = format!("{}{}{}", left, " ".repeat(padding), right);
    frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::White).bg(Color::Blue)),
        area,
    );
}

fn render_prompt(frame: &mut Frame, prompt: &PromptLine, area: Rect) {
    let line = Line::from(vec![
        Span::styled(prompt.prefix.clone(), Style::default().fg(Color::Yellow)),
        Span::raw(prompt.text.clone()),
    ]);
    frame.render_widget(Paragraph::new(line), area);
    let column = prompt.prefix.chars().count() + prompt.cursor;
    let x = area.x + (column as u16).min(area.width.saturating_sub(1));
    frame.set_cursor_position((x, area.y));
}

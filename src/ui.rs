use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, List, ListItem, Paragraph},
};

use crate::constants::ui::{MIN_HEIGHT, MIN_WIDTH, NARROW_THRESHOLD};
use crate::events::AggregatedEvent;
use crate::session::{HeaderRow, Session};
use crate::util_text::{ellipsize, format_number};
use crate::viewport::{SortOrder, ViewMode};

const ACCENT: Color = Color::Cyan;
const DIM: Color = Color::DarkGray;
const PAUSED: Color = Color::Yellow;

// ===============================
// Top-level draw
// ===============================
pub fn draw(f: &mut Frame, session: &Session) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // status
            Constraint::Length(3), // round authors
            Constraint::Min(0),    // body
            Constraint::Length(1), // footer
        ])
        .split(f.area());

    status(f, chunks[0], session);
    round_authors(f, chunks[1], session);
    body(f, chunks[2], session);
    footer(f, chunks[3], session);
}

// ===============================
// Status / authors
// ===============================
fn status(f: &mut Frame, area: Rect, session: &Session) {
    let heads = session.heads();
    let number = heads.last_number().unwrap_or("-");
    let author = heads
        .last_author()
        .map(|a| a.short())
        .unwrap_or_else(|| "unknown".into());

    let (mode, mode_style) = match session.viewport().mode() {
        ViewMode::Live => ("LIVE", Style::default().fg(Color::Green)),
        ViewMode::Paused => ("PAUSED", Style::default().fg(PAUSED)),
    };

    let mut spans = vec![
        Span::styled(" last block ", Style::default().fg(DIM)),
        Span::styled(
            format!("#{number}"),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::styled("  author ", Style::default().fg(DIM)),
        Span::raw(author),
        Span::styled("  events ", Style::default().fg(DIM)),
        Span::raw(format_number(session.event_count() as u64)),
        Span::raw("  "),
        Span::styled(mode, mode_style.add_modifier(Modifier::BOLD)),
    ];
    if heads.aux().is_none() {
        let note = if heads.aux_in_flight() { "  loading authorities…" } else { "  no authorities" };
        spans.push(Span::styled(note, Style::default().fg(DIM)));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn round_authors(f: &mut Frame, area: Rect, session: &Session) {
    let heads = session.heads();
    let title = match heads.last_header() {
        Some(row) => format!(" Authors of #{} ", format_number(row.header.number)),
        None => " Authors ".to_string(),
    };
    let points = heads.era_points();
    let names: Vec<String> = heads
        .round_authors()
        .iter()
        .map(|a| match points.get(a) {
            Some(p) => format!("{} ({p} pts)", a.short()),
            None => a.short(),
        })
        .collect();
    let text = if names.is_empty() { "-".to_string() } else { names.join("  ") };

    let paragraph = Paragraph::new(text).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(DIM)),
    );
    f.render_widget(paragraph, area);
}

// ===============================
// Body
// ===============================
fn body(f: &mut Frame, area: Rect, session: &Session) {
    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        let warning_text = format!(
            "Terminal too small!\n\nMinimum size: {}×{}\nCurrent size: {}×{}",
            MIN_WIDTH, MIN_HEIGHT, area.width, area.height
        );
        let warning = Paragraph::new(warning_text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::Red).add_modifier(Modifier::BOLD))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .border_type(BorderType::Double)
                    .border_style(Style::default().fg(Color::Red)),
            );
        f.render_widget(warning, area);
        return;
    }

    // Stack vertically on narrow terminals
    let direction = if area.width < NARROW_THRESHOLD {
        Direction::Vertical
    } else {
        Direction::Horizontal
    };
    let panes = Layout::default()
        .direction(direction)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    headers_pane(f, panes[0], session);
    events_pane(f, panes[1], session);
}

fn headers_pane(f: &mut Frame, area: Rect, session: &Session) {
    let viewport = session.viewport();
    let rows = session.header_rows();
    let order = match viewport.order() {
        SortOrder::NewestFirst => "newest first",
        SortOrder::OldestFirst => "oldest first",
    };
    let title = format!(" Headers ({}, {order}) ", rows.len());
    let border = if viewport.is_paused() { PAUSED } else { ACCENT };

    let inner_width = area.width.saturating_sub(2) as usize;
    let items: Vec<ListItem> = rows
        .into_iter()
        .map(|row| ListItem::new(header_line(row, inner_width)))
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(border)),
    );
    f.render_widget(list, area);
}

fn header_line(row: &HeaderRow, width: usize) -> Line<'static> {
    let author = row
        .author
        .as_ref()
        .map(|a| a.short())
        .unwrap_or_else(|| "-".into());
    let slot = row.slot.map(|s| s.to_string()).unwrap_or_else(|| "-".into());
    let rest = ellipsize(
        &format!(" {}  slot {slot}  {author}", row.header.hash.short()),
        width.saturating_sub(14),
    );
    Line::from(vec![
        Span::styled(
            format!("#{:<12}", format_number(row.header.number)),
            Style::default().fg(ACCENT),
        ),
        Span::raw(rest),
    ])
}

fn events_pane(f: &mut Frame, area: Rect, session: &Session) {
    let inner_width = area.width.saturating_sub(2) as usize;
    let items: Vec<ListItem> = session
        .events()
        .iter()
        .map(|ev| ListItem::new(event_line(ev, inner_width)))
        .collect();

    let title = format!(" Events ({}) ", session.events().len());
    let list = List::new(items).block(
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(DIM)),
    );
    f.render_widget(list, area);
}

fn event_line(ev: &AggregatedEvent, width: usize) -> Line<'static> {
    let count = if ev.indexes.len() > 1 {
        format!(" (x{})", ev.indexes.len())
    } else {
        String::new()
    };
    let name = ellipsize(
        &format!("{}.{}{count}", ev.section(), ev.method()),
        width.saturating_sub(14),
    );
    Line::from(vec![
        Span::styled(
            format!("#{:<12}", format_number(ev.block_number)),
            Style::default().fg(DIM),
        ),
        Span::raw(" "),
        Span::raw(name),
    ])
}

// ===============================
// Footer
// ===============================
fn footer(f: &mut Frame, area: Rect, session: &Session) {
    let pause_hint = if session.viewport().is_paused() {
        "r resume"
    } else {
        "p pause"
    };
    let line = Line::from(vec![Span::styled(
        format!(" {pause_hint} · o order · q quit"),
        Style::default().fg(DIM),
    )]);
    f.render_widget(Paragraph::new(line), area);
}

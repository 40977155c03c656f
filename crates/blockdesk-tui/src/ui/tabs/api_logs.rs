use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use blockdesk_core::models::ApiLogEntry;
use blockdesk_core::utils::{format_optional, format_timestamp, truncate_string};

use crate::app::App;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    let entries = app.filtered_api_logs();
    render_log_table(frame, app, &entries, chunks[0]);
    render_log_detail(frame, entries.get(app.api_logs_selection).copied(), chunks[1]);
}

fn render_log_table(frame: &mut Frame, app: &App, entries: &[&ApiLogEntry], area: Rect) {
    let header = Row::new([
        Cell::from("Time"),
        Cell::from("Method"),
        Cell::from("Path"),
        Cell::from("Status"),
        Cell::from("User"),
        Cell::from("Duration"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let style = if i == app.api_logs_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(format_timestamp(&entry.timestamp)),
                Cell::from(entry.method.clone()),
                Cell::from(truncate_string(&entry.path, 40)),
                Cell::from(entry.status_code.to_string())
                    .style(styles::status_code_style(entry.status_class())),
                Cell::from(entry.user_display().to_string()),
                Cell::from(entry.duration.clone()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(20), // Time
        Constraint::Length(7),  // Method
        Constraint::Fill(1),    // Path
        Constraint::Length(6),  // Status
        Constraint::Length(12), // User
        Constraint::Length(10), // Duration
    ];

    let refresh = app.config.api_log_refresh_secs;
    let title = format!(" API Logs ({}) - refreshes every {}s ", entries.len(), refresh);

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .title(title)
                .title_style(styles::muted_style())
                .borders(Borders::ALL)
                .border_style(styles::border_style(true)),
        )
        .row_highlight_style(styles::selected_style());

    let mut state = TableState::default();
    state.select(Some(app.api_logs_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

fn detail_line(label: &'static str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{:<10}", label), styles::muted_style()),
        Span::raw(value),
    ])
}

fn render_log_detail(frame: &mut Frame, entry: Option<&ApiLogEntry>, area: Rect) {
    let lines = match entry {
        Some(entry) => {
            let mut lines = vec![
                Line::from(Span::styled(
                    format!("{} {}", entry.method, entry.path),
                    styles::title_style(),
                )),
                Line::from(""),
                detail_line("Status:", entry.status_code.to_string()),
                detail_line("User:", entry.user_display().to_string()),
                detail_line("API key:", format_optional(&entry.api_key, "-")),
                detail_line("IP:", format_optional(&entry.ip, "-")),
                detail_line("Duration:", entry.duration.clone()),
                detail_line("Size:", format!("{} bytes", entry.response_size)),
            ];
            if !entry.query_params.is_empty() {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Query", styles::highlight_style())));
                for (key, value) in &entry.query_params {
                    let value = value
                        .as_str()
                        .map(str::to_string)
                        .unwrap_or_else(|| value.to_string());
                    lines.push(Line::from(format!("  {key} = {value}")));
                }
            }
            if let Some(body) = &entry.request_body {
                lines.push(Line::from(""));
                lines.push(Line::from(Span::styled("Body", styles::highlight_style())));
                let pretty = serde_json::to_string_pretty(body).unwrap_or_else(|_| body.to_string());
                lines.extend(pretty.lines().map(|l| Line::from(format!("  {l}"))));
            }
            lines
        }
        None => vec![Line::from(Span::styled("No request selected", styles::muted_style()))],
    };

    let block = Block::default()
        .title(" Request ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
        area,
    );
}

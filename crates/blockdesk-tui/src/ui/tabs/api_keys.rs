use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use blockdesk_core::utils::format_timestamp;

use crate::app::App;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let issued_height = if app.issued_key.is_some() { 4 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(issued_height), Constraint::Min(5)])
        .split(area);

    if let Some(key) = &app.issued_key {
        let lines = vec![
            Line::from(vec![
                Span::styled(format!(" {}: ", key.name), styles::muted_style()),
                Span::styled(key.key.clone(), styles::highlight_style()),
            ]),
            Line::from(Span::styled(
                " Copy this key now. It will not be shown again.",
                styles::muted_style(),
            )),
        ];
        let block = Block::default()
            .title(" New key ")
            .title_style(styles::success_style())
            .borders(Borders::ALL)
            .border_style(styles::border_style(true));
        frame.render_widget(Paragraph::new(lines).block(block), chunks[0]);
    }

    render_key_table(frame, app, chunks[1]);
}

fn render_key_table(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new([
        Cell::from("Name"),
        Cell::from("Key"),
        Cell::from("Access"),
        Cell::from("Status"),
        Cell::from("Created"),
    ])
    .style(styles::title_style())
    .height(1);

    let rows: Vec<Row> = app
        .api_keys
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let style = if i == app.api_keys_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            let status = if key.is_active {
                Cell::from("Active").style(styles::success_style())
            } else {
                Cell::from("Inactive").style(styles::muted_style())
            };
            Row::new(vec![
                Cell::from(key.name.clone()),
                Cell::from(key.masked_key()),
                Cell::from(key.access_label()),
                status,
                Cell::from(format_timestamp(&key.created_at)),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Fill(1),    // Name
        Constraint::Length(18), // Key
        Constraint::Length(12), // Access
        Constraint::Length(10), // Status
        Constraint::Length(20), // Created
    ];

    let title = format!(
        " API Keys ({}) - [n]ew [r]egenerate [d]elete ",
        app.api_keys.len()
    );

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
    state.select(Some(app.api_keys_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

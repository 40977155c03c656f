use ratatui::{
    layout::{Constraint, Rect},
    widgets::{Block, Borders, Cell, Row, Table, TableState},
    Frame,
};

use blockdesk_core::utils::{format_timestamp, truncate_string};

use crate::app::App;
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new([
        Cell::from("Time"),
        Cell::from("User"),
        Cell::from("Action"),
        Cell::from("Type"),
        Cell::from("Indicator"),
        Cell::from("Reason"),
    ])
    .style(styles::title_style())
    .height(1);

    let entries = app.filtered_audit_log();

    let rows: Vec<Row> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let style = if i == app.audit_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(format_timestamp(&entry.timestamp)),
                Cell::from(entry.username.clone()),
                Cell::from(entry.action.clone()).style(styles::action_style(entry.action_kind())),
                Cell::from(entry.indicator_type.clone()),
                Cell::from(truncate_string(&entry.indicator, 40)),
                Cell::from(entry.reason.clone()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(20),     // Time
        Constraint::Length(14),     // User
        Constraint::Length(8),      // Action
        Constraint::Length(8),      // Type
        Constraint::Percentage(30), // Indicator
        Constraint::Fill(1),        // Reason
    ];

    let title = format!(" Audit Log ({}) ", entries.len());

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
    state.select(Some(app.audit_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

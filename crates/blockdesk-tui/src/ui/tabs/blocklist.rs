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
        Cell::from("Indicator"),
        Cell::from("Type"),
        Cell::from("Added"),
        Cell::from("By"),
        Cell::from("Reason"),
    ])
    .style(styles::title_style())
    .height(1);

    let entries = app.filtered_blocklist();

    let rows: Vec<Row> = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let style = if i == app.blocklist_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };
            Row::new(vec![
                Cell::from(truncate_string(&entry.indicator, 48)),
                Cell::from(entry.indicator_type.clone()),
                Cell::from(format_timestamp(&entry.added_at)),
                Cell::from(entry.added_by.clone()),
                Cell::from(entry.reason.clone()),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Percentage(35), // Indicator
        Constraint::Length(8),      // Type
        Constraint::Length(20),     // Added
        Constraint::Length(14),     // By
        Constraint::Fill(1),        // Reason
    ];

    let filter = app
        .blocklist_filter
        .map(|kind| kind.label())
        .unwrap_or("All");
    let title = format!(
        " Blocklist ({}) - [t]ype: {} - [x] unblock ",
        entries.len(),
        filter
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
    state.select(Some(app.blocklist_selection));

    frame.render_stateful_widget(table, area, &mut state);
}

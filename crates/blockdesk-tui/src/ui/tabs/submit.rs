use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use blockdesk_core::models::IndicatorType;

use crate::app::{App, AppState, FormField, FormOutcome};
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(area);

    render_form(frame, app, chunks[0]);
    render_outcome(frame, app, chunks[1]);
}

fn render_form(frame: &mut Frame, app: &App, area: Rect) {
    let editing = matches!(app.state, AppState::Editing);
    let focus = |field: FormField| editing && app.form.focus == field;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Type
            Constraint::Min(5),    // Indicators
            Constraint::Length(3), // Reason
            Constraint::Length(3), // Buttons / error
        ])
        .split(area);

    // Indicator type selector
    let mut spans = vec![Span::raw(" ")];
    for kind in IndicatorType::ALL {
        let selected = kind == app.form.indicator_type;
        let label = if selected {
            format!("(•) {}  ", kind.label())
        } else {
            format!("( ) {}  ", kind.label())
        };
        let style = if selected {
            styles::highlight_style()
        } else {
            styles::muted_style()
        };
        spans.push(Span::styled(label, style));
    }
    let type_block = Block::default()
        .title(" Type ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(focus(FormField::Type)));
    frame.render_widget(Paragraph::new(Line::from(spans)).block(type_block), chunks[0]);

    // Indicators, one per line
    let mut text = app.form.indicators.clone();
    if focus(FormField::Indicators) {
        text.push('▌');
    }
    let indicators_block = Block::default()
        .title(format!(" Indicators: {}, one per line ", app.form.indicator_type.label()))
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(focus(FormField::Indicators)));
    frame.render_widget(
        Paragraph::new(text)
            .style(styles::list_item_style())
            .block(indicators_block),
        chunks[1],
    );

    // Reason
    let mut reason = app.form.reason.clone();
    if focus(FormField::Reason) {
        reason.push('▌');
    }
    let reason_block = Block::default()
        .title(" Reason ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(focus(FormField::Reason)));
    frame.render_widget(
        Paragraph::new(reason)
            .style(styles::list_item_style())
            .block(reason_block),
        chunks[2],
    );

    // Buttons, or the validation error
    let mut line = vec![
        Span::raw(" ["),
        Span::styled(" Block ", styles::button_style(focus(FormField::Block))),
        Span::raw("]  ["),
        Span::styled(" Unblock ", styles::button_style(focus(FormField::Unblock))),
        Span::raw("]  "),
    ];
    match &app.form_error {
        Some(error) => line.push(Span::styled(error.clone(), styles::error_style())),
        None if !editing => line.push(Span::styled("Enter to edit", styles::muted_style())),
        None => line.push(Span::styled("Tab: next field  Esc: done", styles::muted_style())),
    }
    frame.render_widget(
        Paragraph::new(Line::from(line)).block(Block::default().borders(Borders::TOP)),
        chunks[3],
    );
}

fn list_section(lines: &mut Vec<Line<'static>>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    lines.push(Line::from(Span::styled(
        format!("{} ({})", title, items.len()),
        styles::highlight_style(),
    )));
    for item in items {
        lines.push(Line::from(format!("  {}", item)));
    }
    lines.push(Line::from(""));
}

fn render_outcome(frame: &mut Frame, app: &App, area: Rect) {
    let mut lines: Vec<Line<'static>> = vec![];

    match &app.form_outcome {
        Some(FormOutcome::Blocked(outcome)) => {
            lines.push(Line::from(Span::styled(outcome.message.clone(), styles::success_style())));
            lines.push(Line::from(""));
            list_section(&mut lines, "Blocked", &outcome.blocked);
            list_section(&mut lines, "Already blocked", &outcome.existing);
            if !outcome.invalid.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("Invalid ({})", outcome.invalid.len()),
                    styles::error_style(),
                )));
                for invalid in &outcome.invalid {
                    lines.push(Line::from(format!("  {}: {}", invalid.original, invalid.reason)));
                }
            }
        }
        Some(FormOutcome::Unblocked(outcome)) => {
            lines.push(Line::from(Span::styled(outcome.message.clone(), styles::success_style())));
            lines.push(Line::from(""));
            list_section(&mut lines, "Unblocked", &outcome.unblocked);
            list_section(&mut lines, "Not on the blocklist", &outcome.not_found);
        }
        None => {
            lines.push(Line::from(Span::styled(
                "Results of the last block or unblock appear here.",
                styles::muted_style(),
            )));
        }
    }

    let block = Block::default()
        .title(" Result ")
        .title_style(styles::muted_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(false));

    frame.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(block),
        area,
    );
}

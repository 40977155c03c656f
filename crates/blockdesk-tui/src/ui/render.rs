use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
    Frame,
};

use crate::app::{App, AppState, LoginFocus, PromptKind, Tab};

use super::styles;
use super::tabs::{api_keys, api_logs, audit, blocklist, submit};

pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title bar
            Constraint::Length(3), // Tabs
            Constraint::Min(10),   // Main content
            Constraint::Length(2), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);
    render_tabs(frame, app, chunks[1]);
    if app.is_authenticated() {
        render_main_content(frame, app, chunks[2]);
    }
    render_status_bar(frame, app, chunks[3]);

    // Overlays
    match app.state {
        AppState::ShowingHelp => render_help_overlay(frame, app),
        AppState::LoggingIn => render_login_overlay(frame, app),
        AppState::ConfirmingQuit => render_quit_overlay(frame),
        AppState::Prompting => render_prompt_overlay(frame, app),
        AppState::Confirming => render_confirm_overlay(frame, app),
        _ => {}
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let title = "  Blockdesk";
    let right = match &app.identity {
        Some(identity) => {
            let role = if identity.is_privileged { " (admin)" } else { "" };
            format!("{}{}  [?] Help", identity.name, role)
        }
        None => "[?] Help".to_string(),
    };

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(
            (area.width as usize).saturating_sub(title.len() + right.chars().count() + 2),
        )),
        Span::styled(right, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in app.visible_tabs().iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" | ", styles::muted_style()));
        }
        let label = format!("[{}] {}", i + 1, tab.title());
        if *tab == app.current_tab {
            spans.push(Span::styled(label, styles::tab_style(true)));
        } else {
            spans.push(Span::styled(label, styles::muted_style()));
        }
    }

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_main_content(frame: &mut Frame, app: &App, area: Rect) {
    match app.current_tab {
        Tab::Submit => submit::render(frame, app, area),
        Tab::Blocklist => blocklist::render(frame, app, area),
        Tab::AuditLog => audit::render(frame, app, area),
        Tab::ApiKeys => api_keys::render(frame, app, area),
        Tab::ApiLogs => api_logs::render(frame, app, area),
    }
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let shortcuts = "[u]pdate | [q]uit";

    let left_text = if matches!(app.state, AppState::Searching) || !app.search_query.is_empty() {
        format!(" Search: {}▌ ", app.search_query)
    } else if let Some(ref msg) = app.status_message {
        format!(" {} ", msg)
    } else if app.in_flight > 0 {
        " Loading... ".to_string()
    } else {
        match app.session_minutes {
            Some(minutes) if minutes > 0 => format!(" Session valid for {} min ", minutes),
            Some(_) => " Session renews on next request ".to_string(),
            None => " Not logged in ".to_string(),
        }
    };

    let right_text = format!(" {} ", shortcuts);
    let left_style = if matches!(app.state, AppState::Searching) {
        styles::search_style()
    } else {
        styles::muted_style()
    };

    let padding_len = (area.width as usize)
        .saturating_sub(left_text.chars().count())
        .saturating_sub(right_text.len());
    let status_line = Line::from(vec![
        Span::styled(left_text, left_style),
        Span::raw(" ".repeat(padding_len)),
        Span::styled(right_text, styles::muted_style()),
    ]);
    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame, _app: &App) {
    let area = centered_rect_fixed(56, 30, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled("  Blockdesk", styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Navigation", styles::highlight_style())),
        help_line("1-5", "Switch tabs"),
        help_line("←/→", "Prev/next tab"),
        help_line("↑/↓ j/k", "Navigate list"),
        help_line("PgUp/PgDn", "Scroll a page"),
        help_line("Esc", "Close / go back"),
        Line::from(""),
        Line::from(Span::styled(" Actions", styles::highlight_style())),
        help_line("/", "Search the current list"),
        help_line("u", "Update the current tab"),
        help_line("L", "Log out"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(Span::styled(" Block / Unblock", styles::highlight_style())),
        help_line("Enter", "Edit the form"),
        help_line("Tab", "Next field"),
        help_line("Ctrl+B/U", "Block / unblock"),
        Line::from(""),
        Line::from(Span::styled(" Lists", styles::highlight_style())),
        help_line("t", "Cycle blocklist type filter"),
        help_line("x", "Unblock selected indicator"),
        help_line("n/r/d", "New/regenerate/delete API key"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn field_line(label: &str, value: String, focused: bool) -> Line<'static> {
    let style = if focused {
        styles::selected_style()
    } else {
        styles::list_item_style()
    };
    let cursor = if focused { "▌" } else { "" };
    Line::from(vec![
        Span::raw("   "),
        Span::styled(format!("{label}: ["), styles::muted_style()),
        Span::styled(format!("{:<20}{}", value, cursor), style),
        Span::styled("]", styles::muted_style()),
    ])
}

fn render_login_overlay(frame: &mut Frame, app: &App) {
    let height = if app.login_error.is_some() { 11 } else { 9 };
    let area = centered_rect_fixed(46, height, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled("  Sign in to Blockdesk", styles::title_style())),
        Line::from(""),
    ];

    lines.push(field_line(
        "Username",
        app.login_username.clone(),
        app.login_focus == LoginFocus::Username,
    ));
    lines.push(field_line(
        "Password",
        "*".repeat(app.login_password.chars().count().min(20)),
        app.login_focus == LoginFocus::Password,
    ));

    let button_focused = app.login_focus == LoginFocus::Button;
    let label = if button_focused { " ▶ Login ◀ " } else { "   Login   " };
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        Span::raw("              ["),
        Span::styled(label, styles::button_style(button_focused)),
        Span::raw("]"),
    ]));

    if let Some(ref error) = app.login_error {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_prompt_overlay(frame: &mut Frame, app: &App) {
    let Some(prompt) = app.prompt.as_ref() else {
        return;
    };
    let area = centered_rect_fixed(56, 9, frame.area());
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(format!(" {}: ", prompt.label()), styles::muted_style()),
            Span::styled(format!("{}▌", prompt.input), styles::list_item_style()),
        ]),
    ];

    if prompt.kind == PromptKind::NewKeyName {
        let access = if prompt.read_only { "read-only" } else { "read-write" };
        lines.push(Line::from(vec![
            Span::styled(" Access: ", styles::muted_style()),
            Span::styled(access, styles::highlight_style()),
            Span::styled("  (Tab to toggle)", styles::muted_style()),
        ]));
    }

    lines.push(Line::from(""));
    match &prompt.error {
        Some(error) => lines.push(Line::from(Span::styled(
            format!(" {}", error),
            styles::error_style(),
        ))),
        None => lines.push(Line::from(Span::styled(
            " Enter to submit, Esc to cancel",
            styles::muted_style(),
        ))),
    }

    let block = Block::default()
        .title(format!(" {} ", prompt.title()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_confirm_overlay(frame: &mut Frame, app: &App) {
    let Some(action) = app.pending_confirm.as_ref() else {
        return;
    };
    let area = centered_rect_fixed(60, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(format!(" {}", action.question()), styles::title_style())),
        Line::from(""),
        Line::from(vec![
            Span::styled(" [y]", styles::help_key_style()),
            Span::styled(" Yes    ", styles::help_desc_style()),
            Span::styled("[n]", styles::help_key_style()),
            Span::styled(" No", styles::help_desc_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(30, 7, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled("        Quit Blockdesk?", styles::title_style())),
        Line::from(""),
        Line::from(vec![
            Span::raw("     "),
            Span::styled("[y]", styles::help_key_style()),
            Span::styled(" Yes    ", styles::help_desc_style()),
            Span::styled("[n]", styles::help_key_style()),
            Span::styled(" No", styles::help_desc_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
pub fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}

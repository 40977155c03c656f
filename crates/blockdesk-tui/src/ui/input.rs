//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{
    can_add_password_char, can_add_reason_char, can_add_username_char, App, AppState,
    ConfirmAction, FormAction, FormField, LoginFocus, PromptKind, Tab, PAGE_SCROLL_SIZE,
};

/// Handle keyboard input. Returns true if the app should quit.
pub async fn handle_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match app.state {
        AppState::LoggingIn => handle_login_input(app, key).await,
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            Ok(false)
        }
        AppState::ConfirmingQuit => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.state = AppState::Quitting;
                    return Ok(true);
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            Ok(false)
        }
        AppState::Confirming => {
            match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                    app.execute_confirmed().await;
                }
                KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                    app.pending_confirm = None;
                    app.state = AppState::Normal;
                }
                _ => {}
            }
            Ok(false)
        }
        AppState::Searching => {
            handle_search_input(app, key);
            Ok(false)
        }
        AppState::Prompting => {
            handle_prompt_input(app, key);
            Ok(false)
        }
        AppState::Editing => {
            handle_form_input(app, key);
            Ok(false)
        }
        AppState::Normal => handle_normal_input(app, key),
        AppState::Quitting => Ok(true),
    }
}

fn handle_normal_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    app.status_message = None;

    // Keys shared by every tab
    match key.code {
        KeyCode::Char('q') => {
            app.state = AppState::ConfirmingQuit;
            return Ok(false);
        }
        KeyCode::Char('?') => {
            app.state = AppState::ShowingHelp;
            return Ok(false);
        }
        KeyCode::Char('L') => {
            app.confirm(ConfirmAction::Logout);
            return Ok(false);
        }
        KeyCode::Char('u') => {
            app.refresh_current_tab();
            return Ok(false);
        }
        KeyCode::Right => {
            app.next_tab();
            return Ok(false);
        }
        KeyCode::Left => {
            app.prev_tab();
            return Ok(false);
        }
        KeyCode::Char(c @ '1'..='9') => {
            let index = c as usize - '1' as usize;
            if let Some(tab) = app.visible_tabs().get(index).copied() {
                app.navigate(tab);
            }
            return Ok(false);
        }
        _ => {}
    }

    if app.current_tab == Tab::Submit {
        if matches!(key.code, KeyCode::Enter | KeyCode::Char('i')) {
            app.state = AppState::Editing;
            app.form_error = None;
        }
        return Ok(false);
    }

    // List tabs
    match key.code {
        KeyCode::Char('/') => {
            app.state = AppState::Searching;
        }
        KeyCode::Esc => {
            app.search_query.clear();
            app.issued_key = None;
        }
        KeyCode::Down | KeyCode::Char('j') => app.move_selection(1),
        KeyCode::Up | KeyCode::Char('k') => app.move_selection(-1),
        KeyCode::PageDown => app.move_selection(PAGE_SCROLL_SIZE as isize),
        KeyCode::PageUp => app.move_selection(-(PAGE_SCROLL_SIZE as isize)),
        KeyCode::Home => app.select_first(),
        KeyCode::End => app.select_last(),
        KeyCode::Char('t') if app.current_tab == Tab::Blocklist => app.cycle_blocklist_filter(),
        KeyCode::Char('x') if app.current_tab == Tab::Blocklist => app.start_unblock_selected(),
        KeyCode::Char('n') if app.current_tab == Tab::ApiKeys => app.start_new_api_key(),
        KeyCode::Char('r') if app.current_tab == Tab::ApiKeys => {
            if let Some(api_key) = app.selected_api_key() {
                let action = ConfirmAction::RegenerateKey {
                    id: api_key.id,
                    name: api_key.name.clone(),
                };
                app.confirm(action);
            }
        }
        KeyCode::Char('d') if app.current_tab == Tab::ApiKeys => {
            if let Some(api_key) = app.selected_api_key() {
                let action = ConfirmAction::DeleteKey {
                    id: api_key.id,
                    name: api_key.name.clone(),
                };
                app.confirm(action);
            }
        }
        _ => {}
    }
    Ok(false)
}

fn handle_form_input(app: &mut App, key: KeyEvent) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('b') => app.submit_form(FormAction::Block),
            KeyCode::Char('u') => app.submit_form(FormAction::Unblock),
            _ => {}
        }
        return;
    }

    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
        }
        KeyCode::Tab => app.form.focus = app.form.focus.next(),
        KeyCode::BackTab => app.form.focus = app.form.focus.prev(),
        KeyCode::Enter => match app.form.focus {
            FormField::Indicators => app.form.indicators.push('\n'),
            FormField::Block => app.submit_form(FormAction::Block),
            FormField::Unblock => app.submit_form(FormAction::Unblock),
            FormField::Type | FormField::Reason => app.form.focus = app.form.focus.next(),
        },
        KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') if app.form.focus == FormField::Type => {
            app.form.indicator_type = app.form.indicator_type.next();
        }
        KeyCode::Backspace => match app.form.focus {
            FormField::Indicators => {
                app.form.indicators.pop();
            }
            FormField::Reason => {
                app.form.reason.pop();
            }
            _ => {}
        },
        KeyCode::Char(c) => match app.form.focus {
            FormField::Indicators => {
                if !c.is_control() {
                    app.form.indicators.push(c);
                }
            }
            FormField::Reason => {
                if can_add_reason_char(app.form.reason.chars().count(), c) {
                    app.form.reason.push(c);
                }
            }
            _ => {}
        },
        _ => {}
    }
}

fn handle_prompt_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.cancel_prompt(),
        KeyCode::Enter => app.submit_prompt(),
        KeyCode::Tab => {
            if let Some(prompt) = app.prompt.as_mut() {
                if prompt.kind == PromptKind::NewKeyName {
                    prompt.read_only = !prompt.read_only;
                }
            }
        }
        KeyCode::Backspace => {
            if let Some(prompt) = app.prompt.as_mut() {
                prompt.input.pop();
            }
        }
        KeyCode::Char(c) => app.push_prompt_char(c),
        _ => {}
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.state = AppState::Normal;
            app.search_query.clear();
        }
        KeyCode::Enter => {
            // Keep the query active
            app.state = AppState::Normal;
        }
        KeyCode::Backspace => {
            app.search_query.pop();
        }
        KeyCode::Char(c) => {
            app.search_query.push(c);
            app.select_first();
        }
        _ => {}
    }
}

async fn handle_login_input(app: &mut App, key: KeyEvent) -> Result<bool> {
    match key.code {
        KeyCode::Esc => {
            // Quit if on login screen
            app.state = AppState::Quitting;
            return Ok(true);
        }
        KeyCode::Down | KeyCode::Tab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Password,
                LoginFocus::Password => LoginFocus::Button,
                LoginFocus::Button => LoginFocus::Username,
            };
        }
        KeyCode::Up | KeyCode::BackTab => {
            app.login_focus = match app.login_focus {
                LoginFocus::Username => LoginFocus::Button,
                LoginFocus::Password => LoginFocus::Username,
                LoginFocus::Button => LoginFocus::Password,
            };
        }
        KeyCode::Enter => match app.login_focus {
            LoginFocus::Username => app.login_focus = LoginFocus::Password,
            LoginFocus::Password | LoginFocus::Button => {
                // Failures are shown through login_error
                let _ = app.attempt_login().await;
            }
        },
        KeyCode::Backspace => match app.login_focus {
            LoginFocus::Username => {
                app.login_username.pop();
            }
            LoginFocus::Password => {
                app.login_password.pop();
            }
            LoginFocus::Button => {}
        },
        KeyCode::Char(c) => match app.login_focus {
            LoginFocus::Username => {
                if can_add_username_char(app.login_username.chars().count(), c) {
                    app.login_username.push(c);
                }
            }
            LoginFocus::Password => {
                if can_add_password_char(app.login_password.chars().count(), c) {
                    app.login_password.push(c);
                }
            }
            LoginFocus::Button => {}
        },
        _ => {}
    }
    Ok(false)
}

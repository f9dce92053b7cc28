//! Shared UI primitives for registroscmd
//!
//! Conventions:
//! - Prompts: lowercase with colon and space: `search: `
//! - Navigation hints: arrows in brackets: `[↑/↓]` vertical, `[←/→]` horizontal
//! - Feedback: single word when possible: `Saved.`

use anyhow::Result;
use crossterm::{
    cursor,
    terminal::{disable_raw_mode, enable_raw_mode, Clear, ClearType},
    ExecutableCommand,
};
use inquire::{ui::RenderConfig, Confirm, InquireError, Password, PasswordDisplayMode, Text};
use std::io::{self, Write};

// ============================================================================
// Status Bar Builder
// ============================================================================

/// Maximum actions a status bar can hold (stack-allocated)
const MAX_STATUS_ACTIONS: usize = 12;

/// Builder for consistent status bar formatting.
///
/// Example output: "2/5  [f]ilter [s]ort [q]uit"
pub struct StatusBar<'a> {
    counter: Option<(u64, u64)>,
    actions: [Option<(&'a str, &'a str)>; MAX_STATUS_ACTIONS],
    action_count: usize,
}

impl<'a> StatusBar<'a> {
    #[inline]
    pub fn new() -> Self {
        Self {
            counter: None,
            actions: [None; MAX_STATUS_ACTIONS],
            action_count: 0,
        }
    }

    /// Add a counter (current/total)
    #[inline]
    pub fn counter(mut self, current: u64, total: u64) -> Self {
        self.counter = Some((current, total));
        self
    }

    /// Add an action hint (key, label)
    /// Example: `.action("f", "ilter")` produces `[f]ilter`
    #[inline]
    pub fn action(mut self, key: &'a str, label: &'a str) -> Self {
        if self.action_count < MAX_STATUS_ACTIONS {
            self.actions[self.action_count] = Some((key, label));
            self.action_count += 1;
        }
        self
    }

    /// Render the status bar to a string.
    /// Wraps the action hints onto a second line for narrow terminals.
    pub fn render(&self) -> String {
        let counter = self
            .counter
            .map(|(current, total)| format!("{}/{}", current, total))
            .unwrap_or_default();
        let actions = self.render_actions();

        let (width, _) = term_size();
        if counter.is_empty() {
            actions
        } else if actions.is_empty() {
            counter
        } else if counter.len() + actions.len() + 2 > width.saturating_sub(5) {
            format!("{}\n{}", counter, actions)
        } else {
            format!("{}  {}", counter, actions)
        }
    }

    fn render_actions(&self) -> String {
        self.actions[..self.action_count]
            .iter()
            .flatten()
            .map(|(key, label)| format!("[{}]{}", key, label))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl Default for StatusBar<'_> {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Layout Primitives
// ============================================================================

/// Truncate a string to max_chars, adding ellipsis if needed.
/// Result will be at most max_chars characters (including ellipsis if truncated).
pub fn truncate(s: &str, max_chars: usize) -> String {
    if max_chars == 0 {
        return String::new();
    }
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_chars - 1).collect();
    format!("{}…", kept)
}

/// Truncate and left-align into exactly `width` characters.
pub fn cell(s: &str, width: usize) -> String {
    let text = truncate(s, width);
    let pad = width.saturating_sub(text.chars().count());
    format!("{}{}", text, " ".repeat(pad))
}

// ============================================================================
// Message Functions
// ============================================================================

/// Print a status message to stdout
#[inline]
pub fn status(msg: &str) {
    println!("{}", msg);
}

/// Print an error message to stderr
#[inline]
pub fn error(msg: &str) {
    eprintln!("Error: {}", msg);
}

/// Print a warning message to stderr
#[inline]
pub fn warning(msg: &str) {
    eprintln!("Warning: {}", msg);
}

// ============================================================================
// Terminal
// ============================================================================

/// RAII guard that ensures raw mode is disabled on drop
pub struct RawModeGuard;

impl RawModeGuard {
    pub fn new() -> Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Clear the terminal screen and move cursor to top-left
pub fn clear_screen() -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(Clear(ClearType::All))?;
    stdout.execute(cursor::MoveTo(0, 0))?;
    stdout.flush()?;
    Ok(())
}

/// Get terminal dimensions, defaulting to 80x24 if unavailable
pub fn term_size() -> (usize, usize) {
    crossterm::terminal::size()
        .map(|(w, h)| (w as usize, h as usize))
        .unwrap_or((80, 24))
}

/// Number of table rows that fit under the header and status lines.
pub fn visible_lines() -> usize {
    let (_, height) = term_size();
    height.saturating_sub(7).max(5)
}

// ============================================================================
// Prompts
// ============================================================================

/// Get a minimal render config for inquire prompts
pub fn minimal_render_config() -> RenderConfig<'static> {
    RenderConfig::default_colored()
        .with_prompt_prefix(inquire::ui::Styled::new(""))
        .with_answered_prompt_prefix(inquire::ui::Styled::new(""))
}

/// Prompt for text input with optional default value
pub fn text_input(prompt: &str, default: Option<&str>) -> Result<Option<String>> {
    let mut builder = Text::new(prompt).with_render_config(minimal_render_config());

    if let Some(d) = default {
        if !d.is_empty() {
            builder = builder.with_default(d);
        }
    }

    let result = builder.prompt_skippable()?;
    Ok(result)
}

/// Prompt for a password without echo
pub fn password_input(prompt: &str) -> Result<Option<String>> {
    let result = Password::new(prompt)
        .with_render_config(minimal_render_config())
        .with_display_mode(PasswordDisplayMode::Hidden)
        .without_confirmation()
        .prompt_skippable()?;
    Ok(result)
}

/// Prompt for yes/no confirmation (default: no)
pub fn confirm(prompt: &str) -> Result<bool> {
    let result = Confirm::new(prompt)
        .with_render_config(minimal_render_config())
        .with_default(false)
        .prompt()?;
    Ok(result)
}

/// Result type for form inputs that can be cancelled
pub enum FormResult<T> {
    Value(T),
    Cancelled,
}

/// Prompt for a field with optional current value
/// Format: `field [current]: ` or `field: ` if no current value
/// Empty input keeps the current value; `-` clears it.
pub fn prompt_field(field: &str, current: Option<&str>) -> Result<FormResult<String>> {
    let has_value = current.map(|v| !v.is_empty()).unwrap_or(false);
    let prompt = match current {
        Some(val) if !val.is_empty() => format!("{} [{}] (- clears): ", field, truncate(val, 30)),
        _ => format!("{}: ", field),
    };

    let result = Text::new(&prompt)
        .with_render_config(minimal_render_config())
        .prompt();

    match result {
        Ok(input) => {
            let input = input.trim();
            if input == "-" && has_value {
                Ok(FormResult::Value(String::new()))
            } else if input.is_empty() {
                Ok(FormResult::Value(current.unwrap_or("").to_string()))
            } else {
                Ok(FormResult::Value(input.to_string()))
            }
        }
        Err(InquireError::OperationCanceled) | Err(InquireError::OperationInterrupted) => {
            Ok(FormResult::Cancelled)
        }
        Err(e) => Err(e.into()),
    }
}

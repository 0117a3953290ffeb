//! Terminal colors for rendered frames.

use std::fmt::Display;
use std::io::IsTerminal;

use owo_colors::{OwoColorize, Style};

#[derive(Debug, Clone)]
pub struct Theme {
    color: bool,
    pub header: Style,
    pub muted: Style,
    pub error: Style,
    pub answer: Style,
    pub correct: Style,
    pub probability: Style,
    pub active: Style,
}

impl Theme {
    pub fn colored() -> Self {
        Self {
            color: true,
            header: Style::new().magenta().bold(),
            muted: Style::new().bright_black(),
            error: Style::new().red().bold(),
            answer: Style::new().green().bold(),
            correct: Style::new().green().bold(),
            probability: Style::new().cyan(),
            active: Style::new().yellow().bold(),
        }
    }

    /// No escape codes at all, for pipes and tests.
    pub fn plain() -> Self {
        Self {
            color: false,
            ..Self::colored()
        }
    }

    pub fn auto(no_color: bool) -> Self {
        if !no_color && std::io::stdout().is_terminal() {
            Self::colored()
        } else {
            Self::plain()
        }
    }

    pub fn paint<T: Display>(&self, text: T, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }
}

#[test]
fn plain_theme_adds_nothing() {
    let theme = Theme::plain();
    assert_eq!(theme.paint("50%", theme.probability), "50%");
    assert_eq!(theme.paint(42, theme.header), "42");
}

#[test]
fn colored_theme_wraps_text() {
    let theme = Theme::colored();
    let painted = theme.paint("mat", theme.correct);
    assert!(painted.contains("mat"));
    assert_ne!(painted, "mat");
}

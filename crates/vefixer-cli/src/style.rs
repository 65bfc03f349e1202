use std::env;

use color_eyre::owo_colors::{OwoColorize, Style as OwoStyle};
use vefixer_core::{CommandStatus, Disposition};

pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn new(force_no_color: bool, is_tty: bool) -> Self {
        let env_no_color = env::var_os("NO_COLOR").is_some();
        Self {
            enabled: !(force_no_color || env_no_color) && is_tty,
        }
    }

    pub fn status(&self, status: &CommandStatus, text: &str) -> String {
        let (symbol, tone) = match status {
            CommandStatus::Ok => ("✔", Tone::Green),
            CommandStatus::UserError => ("✗", Tone::Yellow),
            CommandStatus::Failure => ("✖", Tone::Red),
        };
        let line = format!("{symbol} {text}");
        self.paint(&line, tone, true)
    }

    pub fn info(&self, text: &str) -> String {
        self.paint(text, Tone::Blue, false)
    }

    /// Colors a pre-padded table cell by how the environment ended up.
    pub fn disposition(&self, disposition: &Disposition, cell: &str) -> String {
        let tone = match disposition {
            Disposition::Migrated { .. } => Tone::Green,
            Disposition::Skipped { .. } => Tone::Blue,
            Disposition::Unsupported { .. } => Tone::Yellow,
            Disposition::Aborted { .. } | Disposition::Cancelled { .. } => Tone::Red,
        };
        self.paint(cell, tone, false)
    }

    pub fn table_header(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.bold().to_string()
    }

    pub fn dimmed(&self, text: &str) -> String {
        if !self.enabled {
            return text.to_string();
        }
        text.dimmed().to_string()
    }

    fn paint(&self, text: &str, tone: Tone, bold: bool) -> String {
        if !self.enabled {
            return text.to_string();
        }
        let mut style = match tone {
            Tone::Green => OwoStyle::new().green(),
            Tone::Yellow => OwoStyle::new().yellow(),
            Tone::Red => OwoStyle::new().red(),
            Tone::Blue => OwoStyle::new().cyan(),
        };
        if bold {
            style = style.bold();
        }
        text.style(style).to_string()
    }
}

enum Tone {
    Green,
    Yellow,
    Red,
    Blue,
}

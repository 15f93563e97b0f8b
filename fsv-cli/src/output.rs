//! Output formatting for the CLI.
//!
//! Handles human-readable (plain lines and tables) and JSON output formats.

use serde::Serialize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Output handler for CLI commands.
pub struct Output {
    format: OutputFormat,
}

impl Output {
    /// Create a new output handler.
    pub fn new(json: bool) -> Self {
        let format = if json {
            OutputFormat::Json
        } else {
            OutputFormat::Human
        };
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    /// Print a line to stdout.
    pub fn println(&self, msg: &str) {
        println!("{}", msg);
    }

    /// Print a success message (green in human format).
    pub fn success(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => println!("\x1b[32m{}\x1b[0m", msg),
            OutputFormat::Json => self.json(&Message::new("success", msg)),
        }
    }

    /// Print a warning message (yellow in human format).
    pub fn warn(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("\x1b[33m{}\x1b[0m", msg),
            OutputFormat::Json => eprintln!("{}", to_json(&Message::new("warning", msg))),
        }
    }

    /// Print an error message (red in human format).
    pub fn error(&self, msg: &str) {
        match self.format {
            OutputFormat::Human => eprintln!("\x1b[31merror: {}\x1b[0m", msg),
            OutputFormat::Json => eprintln!("{}", to_json(&Message::new("error", msg))),
        }
    }

    /// Print a value as pretty JSON.
    pub fn json<T: Serialize>(&self, value: &T) {
        println!("{}", to_json(value));
    }

    /// Print rows as a table.
    pub fn table<T: Tabled>(&self, rows: &[T]) {
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{}", table);
    }
}

#[derive(Serialize)]
struct Message<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    message: &'a str,
}

impl<'a> Message<'a> {
    fn new(kind: &'a str, message: &'a str) -> Self {
        Self { kind, message }
    }
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value)
        .unwrap_or_else(|e| format!("{{\"type\":\"error\",\"message\":\"{}\"}}", e))
}

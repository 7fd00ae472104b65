//! Terminal output for `cli-keys`: status lines, key detail cards and
//! key tables, coloured by access level.

use clap::builder::styling::{AnsiColor, Style};
use clap::builder::Styles;
use crossterm::style::{Color, Stylize};
use knowledge_admin_server::AccessLevel;
use unicode_width::UnicodeWidthStr;

const ACCENT: Color = Color::Rgb { r: 0, g: 200, b: 220 };
const MUTED: Color = Color::Rgb { r: 128, g: 128, b: 128 };
const OK: Color = Color::Rgb { r: 0, g: 220, b: 120 };
const WARN: Color = Color::Rgb { r: 255, g: 165, b: 0 };
const ERROR: Color = Color::Rgb { r: 255, g: 85, b: 85 };

const CARD_WIDTH: usize = 48;

pub fn get_styles() -> Styles {
    let heading = Style::new().bold().fg_color(Some(AnsiColor::Cyan.into()));
    Styles::styled()
        .usage(heading)
        .header(heading)
        .literal(Style::new().bold().fg_color(Some(AnsiColor::Green.into())))
        .invalid(Style::new().bold().fg_color(Some(AnsiColor::Red.into())))
        .error(Style::new().bold().fg_color(Some(AnsiColor::Red.into())))
        .placeholder(Style::new().fg_color(Some(AnsiColor::BrightBlack.into())))
}

pub fn level_color(level: AccessLevel) -> Color {
    match level {
        AccessLevel::Public => OK,
        AccessLevel::Internal => ACCENT,
        AccessLevel::Confidential => WARN,
        AccessLevel::Admin => ERROR,
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".with(OK).bold(), message.with(OK));
}

pub fn print_warning(message: &str) {
    println!("{} {}", "!".with(WARN).bold(), message.with(WARN));
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".with(ERROR).bold(), message.with(ERROR));
}

/// A titled block of `label: value` lines.
pub struct Card {
    title: String,
    fields: Vec<(String, String, Option<Color>)>,
}

impl Card {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, label: &str, value: impl Into<String>) -> Self {
        self.fields.push((label.to_string(), value.into(), None));
        self
    }

    pub fn colored_field(mut self, label: &str, value: impl Into<String>, color: Color) -> Self {
        self.fields.push((label.to_string(), value.into(), Some(color)));
        self
    }

    pub fn print(&self) {
        let label_width = self.fields.iter().map(|(l, _, _)| l.width()).max().unwrap_or(0);
        let rule_length = CARD_WIDTH.saturating_sub(self.title.width() + 1);
        println!();
        println!("{} {}", self.title.as_str().with(ACCENT).bold(), "─".repeat(rule_length).with(ACCENT));
        for (label, value, color) in &self.fields {
            let padding = " ".repeat(label_width - label.width());
            let value = match color {
                Some(color) => value.as_str().with(*color).bold(),
                None => value.as_str().stylize(),
            };
            println!("  {}{}  {}", label.as_str().with(MUTED), padding, value);
        }
        println!();
    }
}

/// Left-aligned columns sized to their widest cell. Rows without a colour
/// are printed dimmed, which is how revoked keys are shown.
pub struct Table {
    headers: Vec<&'static str>,
    rows: Vec<(Vec<String>, Option<Color>)>,
}

impl Table {
    pub fn new(headers: Vec<&'static str>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>, color: Option<Color>) {
        self.rows.push((cells, color));
    }

    fn column_widths(&self) -> Vec<usize> {
        self.headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                self.rows
                    .iter()
                    .filter_map(|(cells, _)| cells.get(i))
                    .map(|cell| cell.width())
                    .fold(header.width(), usize::max)
            })
            .collect()
    }

    pub fn print(&self, empty_message: &str) {
        if self.rows.is_empty() {
            println!("  {}", empty_message.with(MUTED).italic());
            return;
        }
        let widths = self.column_widths();
        let pad = |cell: &str, width: usize| format!("{}{}", cell, " ".repeat(width - cell.width()));

        let header: Vec<String> = self.headers.iter().zip(&widths).map(|(h, w)| pad(*h, *w)).collect();
        println!("{}", header.join("  ").with(ACCENT).bold());
        let total: usize = widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1);
        println!("{}", "─".repeat(total).with(ACCENT));

        for (cells, color) in &self.rows {
            let line: Vec<String> = cells.iter().zip(&widths).map(|(c, w)| pad(c.as_str(), *w)).collect();
            let line = line.join("  ");
            match color {
                Some(color) => println!("{}", line.with(*color)),
                None => println!("{}", line.with(MUTED)),
            }
        }
    }
}

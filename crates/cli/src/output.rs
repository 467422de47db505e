// Output formatting for CLI

use anyhow::Result;
use serde::Serialize;

#[derive(Clone, Copy)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Self {
        match s {
            "json" => OutputFormat::Json,
            "yaml" => OutputFormat::Yaml,
            _ => OutputFormat::Text,
        }
    }

    /// Print `value` for machine formats. Text is handled by each command.
    pub fn print_value<T: Serialize>(&self, value: &T) -> Result<()> {
        match self {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
            OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
            OutputFormat::Text => {}
        }
        Ok(())
    }

    pub fn is_text(&self) -> bool {
        matches!(self, OutputFormat::Text)
    }
}

/// Print a simple key-value pair for text output
pub fn print_field(label: &str, value: &str) {
    println!("{:<14} {}", format!("{}:", label), value);
}

/// Print a table header
pub fn print_table_header(columns: &[(&str, usize)]) {
    let header: String = columns
        .iter()
        .map(|(name, width)| format!("{:<width$}", name, width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", header.trim_end());
}

/// Print a table row
pub fn print_table_row(values: &[(&str, usize)]) {
    let row: String = values
        .iter()
        .map(|(val, width)| format!("{:<width$}", truncate(val, *width), width = width))
        .collect::<Vec<_>>()
        .join("  ");
    println!("{}", row.trim_end());
}

fn truncate(value: &str, width: usize) -> String {
    if value.chars().count() <= width {
        return value.to_string();
    }
    let kept: String = value.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("/customers", 20), "/customers");
        assert_eq!(truncate("Añadir cotización", 10), "Añadir ...");
        assert_eq!(truncate("abc", 2), "...");
    }

    #[test]
    fn test_unknown_format_falls_back_to_text() {
        assert!(OutputFormat::from_str("table").is_text());
        assert!(!OutputFormat::from_str("json").is_text());
    }
}

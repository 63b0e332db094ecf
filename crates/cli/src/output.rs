//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;
use stack_lib::Value;
use tabled::{settings::Style, Table, Tabled};

/// Replacement shown for secrets in table output
pub const MASK: &str = "********";

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// Print a table from a list of items
pub fn print_table<T: Tabled + Serialize>(items: &[T], format: OutputFormat) {
    match format {
        OutputFormat::Table => {
            if items.is_empty() {
                println!("{}", "No items found".yellow());
                return;
            }
            let table = Table::new(items).with(Style::rounded()).to_string();
            println!("{}", table);
        }
        OutputFormat::Json => {
            if let Ok(json) = serde_json::to_string_pretty(&items) {
                println!("{}", json);
            }
        }
    }
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Render a template value for display.
///
/// Literal parts are shown as-is, engine-resolved tokens as `${Id}` or
/// `${Id.Attribute}`.
pub fn render_value(value: &Value) -> String {
    value
        .resolve(&|token| match token {
            Value::Ref(id) => Some(format!("${{{}}}", id)),
            Value::GetAtt(id, attribute) => Some(format!("${{{}.{}}}", id, attribute)),
            Value::Sub(template) => Some(template.clone()),
            _ => None,
        })
        .unwrap_or_else(|| value.to_json().to_string())
}

/// Mask a secret unless the output is meant for machines
pub fn mask_secret(value: String, format: OutputFormat) -> String {
    match format {
        OutputFormat::Table => MASK.to_string(),
        OutputFormat::Json => value,
    }
}

/// Format a unix timestamp as RFC 3339
pub fn format_timestamp(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_else(|| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_value_tokens() {
        let value = Value::join(
            "",
            vec![
                Value::str("db+"),
                Value::get_att("AirflowDB", "Endpoint.Address"),
            ],
        );
        assert_eq!(render_value(&value), "db+${AirflowDB.Endpoint.Address}");
        assert_eq!(render_value(&Value::reference("Cluster")), "${Cluster}");
        assert_eq!(render_value(&Value::str("plain")), "plain");
    }

    #[test]
    fn test_mask_secret_only_in_tables() {
        assert_eq!(mask_secret("pw".to_string(), OutputFormat::Table), MASK);
        assert_eq!(mask_secret("pw".to_string(), OutputFormat::Json), "pw");
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00+00:00");
    }
}

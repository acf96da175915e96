//! CLI output helpers
//!
//! Listing commands render either a `tabled` table or pretty JSON. The
//! engine reports all traffic figures in KB (the carrier's unit); tables
//! show them scaled to the nearest sensible unit via [`format_kb`].

use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format selected by the global `--format` flag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid format: {}. Use 'table' or 'json'", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Table => write!(f, "table"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Print rows as a table or a JSON array
///
/// `empty` is the table-mode message when there is nothing to show; JSON
/// mode prints `[]` instead so output stays machine-readable.
pub fn print_rows<T>(rows: &[T], format: OutputFormat, empty: &str) -> anyhow::Result<()>
where
    T: Serialize + Tabled,
{
    match format {
        OutputFormat::Table if rows.is_empty() => println!("{}", empty),
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
    }
    Ok(())
}

/// Scale a KB amount into a readable unit
pub fn format_kb(kb: f64) -> String {
    const MB: f64 = 1024.0;
    const GB: f64 = 1024.0 * 1024.0;

    if kb.abs() >= GB {
        format!("{:.2} GB", kb / GB)
    } else if kb.abs() >= MB {
        format!("{:.1} MB", kb / MB)
    } else {
        format!("{:.0} KB", kb)
    }
}

/// Print a success message (respects quiet mode)
pub fn print_success(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", colored::Colorize::green(message));
    }
}

/// Print an error message to stderr
pub fn print_error(message: &str) {
    eprintln!("{}", colored::Colorize::red(message));
}

/// Print a progress message (respects quiet mode)
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        println!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_round_trip() {
        for format in [OutputFormat::Table, OutputFormat::Json] {
            assert_eq!(format.to_string().parse::<OutputFormat>().unwrap(), format);
        }
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_kb_scaling() {
        assert_eq!(format_kb(0.0), "0 KB");
        assert_eq!(format_kb(512.0), "512 KB");
        assert_eq!(format_kb(1024.0), "1.0 MB");
        assert_eq!(format_kb(21_200.0), "20.7 MB");
        assert_eq!(format_kb(3.5 * 1024.0 * 1024.0), "3.50 GB");
    }
}

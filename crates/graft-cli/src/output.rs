//! Terminal output helpers.

use console::style;
use graft_config::ConfigError;

/// Print the command header.
pub fn header(action: &str) {
    println!(
        "{} {}",
        style("Graft").cyan().bold(),
        style(action).dim()
    );
}

/// Print a success line.
pub fn success(message: &str) {
    println!("{} {}", style("Success:").green().bold(), message);
}

/// Print a warning line to stderr.
pub fn warning(message: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), message);
}

/// Print an error, with diagnostics or suggestions when the error carries them.
pub fn print_error(err: anyhow::Error) {
    let err = match err.downcast::<ConfigError>() {
        Ok(config) => {
            let details = match &config {
                ConfigError::ValidationFailed { errors, .. } => errors.clone(),
                _ => Vec::new(),
            };
            eprintln!("{:?}", miette::Report::new(config));
            for detail in details {
                eprintln!("  {} {detail}", style("-").red());
            }
            return;
        }
        Err(other) => other,
    };

    if let Some(core) = err.downcast_ref::<graft_core::Error>() {
        eprintln!(
            "{} {}",
            style("Error:").red().bold(),
            core.display_with_suggestions()
        );
    } else {
        eprintln!("{} {err:#}", style("Error:").red().bold());
    }
}

/// Human-readable byte count.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_scaled() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }
}

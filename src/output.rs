//! # Output Configuration
//!
//! Controls CLI output appearance based on terminal capabilities and user
//! preference. Status lines for failed or warned jobs are colored; plain
//! text is used whenever color is disabled.
//!
//! The module respects:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - disables colors
//! - `CLICOLOR_FORCE=1` - forces colors even in non-TTY
//! - `TERM=dumb` - disables colors for dumb terminals

use std::env;

use console::style;

/// Output configuration for controlling colored output.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// - `--color=always`: force colors on (overrides NO_COLOR)
    /// - `--color=never`: force colors off
    /// - `--color=auto`: detect based on environment
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of NO_COLOR (even empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Render a warning line, yellow when color is on.
    pub fn warn_line(&self, text: &str) -> String {
        if self.use_color {
            style(text).yellow().to_string()
        } else {
            text.to_string()
        }
    }

    /// Render an error line, red when color is on.
    pub fn error_line(&self, text: &str) -> String {
        if self.use_color {
            style(text).red().to_string()
        } else {
            text.to_string()
        }
    }

    /// Create a configuration with colors always enabled.
    #[cfg(test)]
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    #[cfg(test)]
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_always() {
        let config = OutputConfig::from_env_and_flag("always");
        assert!(config.use_color);
    }

    #[test]
    fn test_color_never() {
        let config = OutputConfig::from_env_and_flag("never");
        assert!(!config.use_color);
    }

    #[test]
    fn test_warn_line_without_color_is_plain() {
        let config = OutputConfig::without_color();
        assert_eq!(config.warn_line("careful"), "careful");
    }

    #[test]
    fn test_error_line_with_color_wraps() {
        let config = OutputConfig::with_color();
        let line = config.error_line("bad");
        assert!(line.contains("bad"));
    }
}

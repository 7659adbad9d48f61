//! Progress feedback for CLI commands
//!
//! One spinner per pipeline phase. All progress output is suppressed when
//! --quiet is set.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Style with the given template, falling back to the plain spinner.
fn style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Create a spinner with a message
pub fn spinner(message: &str, quiet: bool) -> Option<ProgressBar> {
    if quiet {
        return None;
    }

    let pb = ProgressBar::new_spinner();
    pb.set_style(style("{spinner:.cyan} {msg}").tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"));
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

/// Finish a spinner with a success message
pub fn finish_spinner(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.set_style(style("{prefix:.green} {msg}"));
        pb.set_prefix("✓");
        pb.finish_with_message(message.to_string());
    }
}

/// Finish a spinner with a warning message
pub fn finish_spinner_warn(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.set_style(style("{prefix:.yellow} {msg}"));
        pb.set_prefix("!");
        pb.finish_with_message(message.to_string());
    }
}

/// Finish a spinner with an error message
pub fn finish_spinner_error(pb: Option<ProgressBar>, message: &str) {
    if let Some(pb) = pb {
        pb.set_style(style("{prefix:.red} {msg}"));
        pb.set_prefix("✗");
        pb.finish_with_message(message.to_string());
    }
}

/// Run `phase` under a spinner, finishing it with `done(&value)` or the error.
pub fn with_spinner<T, E>(
    message: &str,
    quiet: bool,
    phase: impl FnOnce() -> Result<T, E>,
    done: impl FnOnce(&T) -> String,
) -> Result<T, E> {
    let pb = spinner(message, quiet);
    match phase() {
        Ok(value) => {
            finish_spinner(pb, &done(&value));
            Ok(value)
        }
        Err(err) => {
            finish_spinner_error(pb, &format!("{message} failed"));
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spinner_quiet_returns_none() {
        assert!(spinner("test", true).is_none());
    }

    #[test]
    fn test_spinner_not_quiet_returns_some() {
        let pb = spinner("test", false);
        assert!(pb.is_some());
        if let Some(pb) = pb {
            pb.finish();
        }
    }

    #[test]
    fn test_finish_spinner_handles_none() {
        finish_spinner(None, "done");
        finish_spinner_warn(None, "warning");
        finish_spinner_error(None, "error");
    }

    #[test]
    fn test_with_spinner_passes_result_through() {
        let ok: Result<u32, String> = with_spinner("count", true, || Ok(3), |n| format!("{n}"));
        assert_eq!(ok, Ok(3));

        let err: Result<u32, String> =
            with_spinner("count", true, || Err("boom".to_string()), |n| format!("{n}"));
        assert_eq!(err, Err("boom".to_string()));
    }
}

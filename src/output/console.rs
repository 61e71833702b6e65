use colored::{ColoredString, Colorize};

use crate::engine::aggregator::{FuzzResult, RunReport};
use crate::engine::response::ResponseOutcome;

pub fn format_kv_line(label: &str, value: &str) -> String {
    format!(":: {:<10}: {}", label, value)
}

/// `[ERR] message`, the tag style used for fatal and run-ending errors.
pub fn format_error_line(message: &str) -> String {
    format!(
        "{}{}{} {}",
        "[".bold().white(),
        "ERR".bold().red(),
        "]".bold().white(),
        message
    )
}

fn colorize_status(status: u16) -> ColoredString {
    let text = status.to_string();
    match status {
        200..=299 => text.bold().green(),
        300..=399 => text.bold().cyan(),
        400..=499 => text.bold().yellow(),
        _ => text.bold().red(),
    }
}

/// Live line for one kept result.
pub fn format_result_line(result: &FuzzResult) -> String {
    match &result.outcome {
        ResponseOutcome::Success {
            status_code,
            body_size,
            line_count,
            word_count,
            meta,
            ..
        } => {
            let mut line = format!(
                "{:<3} {:<60} [Size: {:>8}, Words: {:>6}, Lines: {:>4}]",
                colorize_status(*status_code),
                result.url,
                body_size,
                word_count,
                line_count
            );
            if let Some(location) = meta.redirect_location.as_deref() {
                line.push_str(&format!(" {} {}", "->".bold().white(), location.cyan()));
            }
            if !meta.title.is_empty() {
                line.push_str(&format!(" {}", format!("[{}]", meta.title).white()));
            }
            line
        }
        ResponseOutcome::Failure { kind, message } => format!(
            "{} {:<60} [{}: {}]",
            "ERR".bold().red(),
            result.url,
            kind.label().red(),
            message
        ),
    }
}

pub fn format_stats(report: &RunReport) -> Vec<String> {
    let stats = &report.stats;
    let rule = "=".repeat(80).cyan().to_string();
    vec![
        rule.clone(),
        "Statistics:".bold().to_string(),
        format!("  Total requests:    {}", stats.total_completed),
        format!(
            "  Results found:     {}",
            stats.total_kept.to_string().green()
        ),
        format!("  Filtered out:      {}", stats.total_filtered),
        format!(
            "  Failed requests:   {}",
            if stats.total_failed > 0 {
                stats.total_failed.to_string().red()
            } else {
                stats.total_failed.to_string().normal()
            }
        ),
        format!("  Elapsed time:      {:.2}s", stats.elapsed().as_secs_f64()),
        format!("  Requests/second:   {:.2}", stats.requests_per_second()),
        format!("  Run state:         {}", report.state.label()),
        rule,
    ]
}

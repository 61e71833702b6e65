use crate::cli::args::CliArgs;
use crate::engine::filters::{FilterSpec, RuleSet};

pub fn filter_spec(args: &CliArgs) -> FilterSpec {
    FilterSpec {
        filter_status: args.filter_status.clone(),
        filter_size: args.filter_size.clone(),
        filter_lines: args.filter_lines.clone(),
        filter_words: args.filter_words.clone(),
        filter_errors: args.filter_errors.clone(),
        match_status: args.match_status.clone(),
        match_size: args.match_size.clone(),
        match_lines: args.match_lines.clone(),
        match_words: args.match_words.clone(),
    }
}

pub fn validate(args: &CliArgs) -> Result<(), String> {
    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 {
            return Err("invalid threads 0, expected a positive integer".to_string());
        }
    }
    if let Some(timeout) = args.timeout {
        if timeout == 0 {
            return Err("invalid timeout 0, expected a positive number of seconds".to_string());
        }
    }
    if let Some(delay) = args.delay {
        if !delay.is_finite() || delay < 0.0 {
            return Err(format!("invalid delay '{delay}', expected seconds >= 0"));
        }
    }
    if let Some(max_time) = args.max_time {
        if max_time == 0 {
            return Err("invalid max-time 0, expected a positive number of seconds".to_string());
        }
    }
    if let Some(placeholder) = args.placeholder.as_deref() {
        if placeholder.is_empty() {
            return Err("placeholder must not be empty".to_string());
        }
    }
    if let Some(raw) = args.output_format.as_deref() {
        crate::output::OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid --output-format '{raw}', expected text, json, xml or csv"))?;
    }
    RuleSet::from_spec(&filter_spec(args)).map_err(|e| e.to_string())?;
    Ok(())
}

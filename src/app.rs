use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{error::ErrorKind, CommandFactory, Parser};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use tracing_subscriber::EnvFilter;

use crate::cli::args::CliArgs;
use crate::cli::validation;
use crate::config::{self, ConfigFile};
use crate::engine::dispatcher::{Dispatcher, DispatcherConfig};
use crate::engine::filters::{Decision, FilterSpec, RuleSet};
use crate::engine::lifecycle::{CancelSignal, RunState};
use crate::engine::request::{RequestTemplate, DEFAULT_PLACEHOLDER};
use crate::output::{self, console, OutputFormat};
use crate::wordlist;

fn print_banner(no_color: bool) {
    const BANNER: &str = r#"
    ____                     _
   / __/_  __________  ____ _(_)
  / /_/ / / /_  /_  / / __ `/ /
 / __/ /_/ / / /_/ /_/ /_/ / /
/_/  \__,_/ /___/___/\__,_/_/
        concurrent content discovery
    "#;
    if no_color {
        print!("{}", BANNER);
    } else {
        let _ = write!(&mut rainbowcoat::stdout(), "{}", BANNER);
    }
    println!();
    println!(
        "{}{}{} {}",
        "[".bold().white(),
        "WRN".bold().yellow(),
        "]".bold().white(),
        "Only scan targets you are authorized to test".bold().white()
    );
    println!();
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[derive(Clone, Debug)]
struct RunConfig {
    template: RequestTemplate,
    wordlist_path: String,
    rules: RuleSet,
    dispatcher: DispatcherConfig,
    output: Option<PathBuf>,
    output_format: OutputFormat,
    no_color: bool,
}

fn seconds(value: f64, option: &str) -> Result<Duration, String> {
    if !value.is_finite() || value < 0.0 {
        return Err(format!("invalid {option} '{value}', expected seconds >= 0"));
    }
    Ok(Duration::from_secs_f64(value))
}

fn build_run_config(args: CliArgs, cfg: ConfigFile) -> Result<RunConfig, String> {
    validation::validate(&args)?;

    let url = args
        .url
        .or(cfg.url)
        .ok_or_else(|| "a target URL template is required (--url)".to_string())?;
    let wordlist_path = args
        .wordlist
        .or(cfg.wordlist)
        .map(|p| config::expand_tilde_string(&p))
        .ok_or_else(|| "a wordlist is required (--wordlist)".to_string())?;
    let placeholder = args
        .placeholder
        .or(cfg.placeholder)
        .unwrap_or_else(|| DEFAULT_PLACEHOLDER.to_string());

    let mut template = RequestTemplate::new(&url, &placeholder).map_err(|e| e.to_string())?;
    if let Some(method) = args.method.or(cfg.method) {
        template = template.with_method(&method).map_err(|e| e.to_string())?;
    }
    let headers = if args.headers.is_empty() {
        cfg.headers.unwrap_or_default()
    } else {
        args.headers
    };
    for header in headers.iter() {
        template = template.with_header(header).map_err(|e| e.to_string())?;
    }
    if let Some(body) = args.data.or(cfg.data) {
        template = template.with_body(&body);
    }

    let spec = FilterSpec {
        filter_status: args.filter_status.or(cfg.filter_status),
        filter_size: args.filter_size.or(cfg.filter_size),
        filter_lines: args.filter_lines.or(cfg.filter_lines),
        filter_words: args.filter_words.or(cfg.filter_words),
        filter_errors: args.filter_errors.or(cfg.filter_errors),
        match_status: args.match_status.or(cfg.match_status),
        match_size: args.match_size.or(cfg.match_size),
        match_lines: args.match_lines.or(cfg.match_lines),
        match_words: args.match_words.or(cfg.match_words),
    };
    let rules = RuleSet::from_spec(&spec).map_err(|e| e.to_string())?;

    let concurrency = args.concurrency.or(cfg.concurrency).unwrap_or(10);
    if concurrency == 0 {
        return Err("invalid threads 0, expected a positive integer".to_string());
    }
    let timeout = args.timeout.or(cfg.timeout).unwrap_or(10);
    if timeout == 0 {
        return Err("invalid timeout 0, expected a positive number of seconds".to_string());
    }
    let delay = seconds(args.delay.or(cfg.delay).unwrap_or(0.0), "delay")?;
    let max_time = args
        .max_time
        .or(cfg.max_time)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs);

    let dispatcher = DispatcherConfig {
        concurrency,
        timeout: Duration::from_secs(timeout),
        delay,
        rate: args.rate.or(cfg.rate).unwrap_or(0),
        max_time,
        insecure: args.insecure || cfg.insecure.unwrap_or(false),
        follow_redirects: args.follow_redirects || cfg.follow_redirects.unwrap_or(false),
        proxy: args.proxy.or(cfg.proxy).filter(|p| !p.trim().is_empty()),
    };

    let output = args.output.or(cfg.output).filter(|p| !p.trim().is_empty());
    let explicit_format = args.output_format.or(cfg.output_format);
    if let Some(raw) = explicit_format.as_deref() {
        OutputFormat::parse(raw)
            .ok_or_else(|| format!("invalid output format '{raw}', expected text, json, xml or csv"))?;
    }
    let output_format = output::resolve_format(
        explicit_format.as_deref(),
        output.as_deref().unwrap_or_default(),
    );

    Ok(RunConfig {
        template,
        wordlist_path,
        rules,
        dispatcher,
        output: output.map(|p| config::expand_tilde(&p)),
        output_format,
        no_color: args.no_color || cfg.no_color.unwrap_or(false),
    })
}

fn print_run_summary(run: &RunConfig) {
    println!("{}", console::format_kv_line("Method", run.template.method().as_str()));
    println!("{}", console::format_kv_line("URL", run.template.url()));
    println!(
        "{}",
        console::format_kv_line("Injections", &run.template.injection_points().to_string())
    );
    println!("{}", console::format_kv_line("Wordlist", &run.wordlist_path));
    println!(
        "{}",
        console::format_kv_line("Threads", &run.dispatcher.concurrency.to_string())
    );
    println!(
        "{}",
        console::format_kv_line("Timeout", &format!("{}s", run.dispatcher.timeout.as_secs()))
    );
    if run.dispatcher.rate > 0 {
        println!(
            "{}",
            console::format_kv_line("Rate", &format!("{}/s", run.dispatcher.rate))
        );
    }
    if !run.dispatcher.delay.is_zero() {
        println!(
            "{}",
            console::format_kv_line("Delay", &format!("{:?}", run.dispatcher.delay))
        );
    }
    if let Some(max_time) = run.dispatcher.max_time {
        println!(
            "{}",
            console::format_kv_line("Max time", &format!("{}s", max_time.as_secs()))
        );
    }
    if let Some(proxy) = run.dispatcher.proxy.as_deref() {
        println!("{}", console::format_kv_line("Proxy", proxy));
    }
    println!(
        "{}",
        console::format_kv_line("Redirects", format_bool(run.dispatcher.follow_redirects))
    );
    println!(
        "{}",
        console::format_kv_line("Insecure", format_bool(run.dispatcher.insecure))
    );
    if let Some(summary) = run.rules.summary() {
        println!("{}", console::format_kv_line("Rules", &summary));
    }
    if let Some(path) = run.output.as_ref() {
        println!(
            "{}",
            console::format_kv_line("Output", &path.display().to_string())
        );
    }
    println!();
}

async fn run_async(run: RunConfig) -> Result<RunState, String> {
    if run.no_color {
        colored::control::set_override(false);
    }
    print_banner(run.no_color);
    print_run_summary(&run);

    let mut source = wordlist::open(&run.wordlist_path)
        .await
        .map_err(|e| e.to_string())?;

    let cancel = CancelSignal::new();
    let dispatcher = Dispatcher::new(run.template, run.rules, run.dispatcher)
        .map_err(|e| e.to_string())?
        .with_cancel_signal(cancel.clone());

    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.enable_steady_tick(Duration::from_millis(200));
    pb.set_style(
        ProgressStyle::with_template(
            ":: Progress: [{pos}] :: {per_sec} :: Duration: [{elapsed_precise}] :: {msg}",
        )
        .map_err(|e| format!("failed to build progress bar style: {e}"))?,
    );

    let interrupt = {
        let cancel = cancel.clone();
        let pb = pb.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                pb.set_message("interrupted, waiting for in-flight requests");
                tracing::info!("interrupt received, cancelling run");
                cancel.cancel();
            }
        })
    };

    let printer = pb.clone();
    let result = dispatcher
        .run(&mut source, |result| {
            printer.inc(1);
            if result.decision == Decision::Keep {
                printer.println(console::format_result_line(result));
            }
        })
        .await;
    interrupt.abort();
    pb.finish_and_clear();
    let report = result.map_err(|e| e.to_string())?;

    if let Some(path) = run.output.as_ref() {
        output::write_report(&report, path, run.output_format)
            .await
            .map_err(|e| e.to_string())?;
    }

    if let Some(e) = report.source_error.as_ref() {
        eprintln!("{}", console::format_error_line(&e.to_string()));
    }

    println!();
    for line in console::format_stats(&report) {
        println!("{line}");
    }
    if let Some(path) = run.output.as_ref() {
        println!(
            "{}",
            console::format_kv_line("Saved", &path.display().to_string())
        );
    }

    Ok(report.state)
}

fn init_config() -> Result<RunState, String> {
    let path = config::default_config_path()
        .ok_or_else(|| "cannot locate home directory for default config".to_string())?;
    if config::ensure_default_config_file(&path)? {
        println!("{}", console::format_kv_line("Config", &format!("written to {}", path.display())));
    } else {
        println!("{}", console::format_kv_line("Config", &format!("{} already exists", path.display())));
    }
    Ok(RunState::Completed)
}

/// Parses the command line, runs the fuzzer and returns the terminal run
/// state. Configuration and pre-flight failures come back as `Err`, which the
/// binary reports as an `Idle -> Aborted` run.
pub fn run_cli() -> Result<RunState, String> {
    let args = match CliArgs::try_parse() {
        Ok(args) => args,
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp => {
                let mut cmd = CliArgs::command();
                print!("{}", cmd.render_long_help());
                return Ok(RunState::Completed);
            }
            ErrorKind::DisplayVersion => {
                let cmd = CliArgs::command();
                print!("{}", cmd.render_version());
                return Ok(RunState::Completed);
            }
            _ => return Err(e.to_string()),
        },
    };

    init_tracing(args.verbose);

    if args.init_config {
        return init_config();
    }

    let cfg = match args.config.as_deref() {
        Some(arg) => config::load_from_arg(arg)?,
        None => ConfigFile::default(),
    };

    let run = build_run_config(args, cfg)?;

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to build runtime: {e}"))?;

    rt.block_on(run_async(run))
}

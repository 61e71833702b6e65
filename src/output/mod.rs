pub mod console;

use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::engine::aggregator::{FuzzResult, RunReport, RunStatistics};
use crate::engine::response::ResponseOutcome;

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("failed to render json report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to render csv report: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to write output file '{path}': {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
    Xml,
    Csv,
}

impl OutputFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "text" | "txt" | "tsv" => Some(Self::Text),
            "json" => Some(Self::Json),
            "xml" => Some(Self::Xml),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

pub fn infer_format_from_path(path: &str) -> Option<OutputFormat> {
    let lower = path.trim().to_lowercase();
    if lower.ends_with(".json") {
        return Some(OutputFormat::Json);
    }
    if lower.ends_with(".xml") {
        return Some(OutputFormat::Xml);
    }
    if lower.ends_with(".csv") {
        return Some(OutputFormat::Csv);
    }
    if lower.ends_with(".txt") || lower.ends_with(".tsv") {
        return Some(OutputFormat::Text);
    }
    None
}

/// Explicit format wins, then the file extension, then plain text.
pub fn resolve_format(explicit: Option<&str>, path: &str) -> OutputFormat {
    explicit
        .and_then(OutputFormat::parse)
        .or_else(|| infer_format_from_path(path))
        .unwrap_or(OutputFormat::Text)
}

#[derive(Clone, Debug, Serialize)]
pub struct OutputRecord {
    pub ordinal: usize,
    pub candidate: String,
    pub url: String,
    pub status: Option<u16>,
    pub size: Option<usize>,
    pub words: Option<usize>,
    pub lines: Option<usize>,
    pub latency_ms: Option<u64>,
    pub title: String,
    pub content_type: String,
    pub redirect_location: Option<String>,
    pub error_kind: Option<String>,
    pub error: Option<String>,
}

impl From<&FuzzResult> for OutputRecord {
    fn from(r: &FuzzResult) -> Self {
        let mut record = OutputRecord {
            ordinal: r.ordinal,
            candidate: r.candidate.clone(),
            url: r.url.clone(),
            status: None,
            size: None,
            words: None,
            lines: None,
            latency_ms: None,
            title: String::new(),
            content_type: String::new(),
            redirect_location: None,
            error_kind: None,
            error: None,
        };
        match &r.outcome {
            ResponseOutcome::Success {
                status_code,
                body_size,
                line_count,
                word_count,
                latency,
                meta,
            } => {
                record.status = Some(*status_code);
                record.size = Some(*body_size);
                record.words = Some(*word_count);
                record.lines = Some(*line_count);
                record.latency_ms = Some(u64::try_from(latency.as_millis()).unwrap_or(u64::MAX));
                record.title = meta.title.clone();
                record.content_type = meta.content_type.clone();
                record.redirect_location = meta.redirect_location.clone();
            }
            ResponseOutcome::Failure { kind, message } => {
                record.error_kind = Some(kind.label().to_string());
                record.error = Some(message.clone());
            }
        }
        record
    }
}

pub fn build_records(results: &[FuzzResult]) -> Vec<OutputRecord> {
    results.iter().map(OutputRecord::from).collect()
}

#[derive(Clone, Debug, Serialize)]
pub struct StatsRecord {
    pub state: String,
    pub total_dispatched: usize,
    pub total_completed: usize,
    pub total_kept: usize,
    pub total_failed: usize,
    pub total_filtered: usize,
    pub elapsed_ms: u128,
    pub requests_per_second: f64,
}

impl StatsRecord {
    pub fn new(state: &str, stats: &RunStatistics) -> Self {
        Self {
            state: state.to_string(),
            total_dispatched: stats.total_dispatched,
            total_completed: stats.total_completed,
            total_kept: stats.total_kept,
            total_failed: stats.total_failed,
            total_filtered: stats.total_filtered,
            elapsed_ms: stats.elapsed().as_millis(),
            requests_per_second: stats.requests_per_second(),
        }
    }
}

#[derive(Serialize)]
struct JsonDocument<'a> {
    results: &'a [OutputRecord],
    stats: &'a StatsRecord,
}

/// One `status\turl\tsize\twords\tlines` row per successful response.
/// Failures have no such fields and are left to the structured formats.
pub fn render_text(records: &[OutputRecord]) -> Vec<u8> {
    let mut out = String::new();
    for r in records {
        let Some(status) = r.status else { continue };
        out.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\n",
            status,
            r.url,
            r.size.unwrap_or(0),
            r.words.unwrap_or(0),
            r.lines.unwrap_or(0)
        ));
    }
    out.into_bytes()
}

pub fn render_json(records: &[OutputRecord], stats: &StatsRecord) -> Result<Vec<u8>, OutputError> {
    let doc = JsonDocument {
        results: records,
        stats,
    };
    let mut out = serde_json::to_vec_pretty(&doc)?;
    out.push(b'\n');
    Ok(out)
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn opt<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

pub fn render_xml(records: &[OutputRecord], stats: &StatsRecord) -> Vec<u8> {
    let mut out = String::new();
    out.push_str(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    out.push('\n');
    out.push_str("<fuzzai>\n");
    out.push_str(&format!(
        "  <stats state=\"{}\" dispatched=\"{}\" completed=\"{}\" kept=\"{}\" failed=\"{}\" filtered=\"{}\" elapsed_ms=\"{}\"/>\n",
        escape_xml(&stats.state),
        stats.total_dispatched,
        stats.total_completed,
        stats.total_kept,
        stats.total_failed,
        stats.total_filtered,
        stats.elapsed_ms
    ));
    out.push_str("  <results>\n");
    for r in records {
        out.push_str(&format!("    <result ordinal=\"{}\">\n", r.ordinal));
        out.push_str(&format!(
            "      <candidate>{}</candidate>\n",
            escape_xml(&r.candidate)
        ));
        out.push_str(&format!("      <url>{}</url>\n", escape_xml(&r.url)));
        match r.error_kind.as_deref() {
            Some(kind) => {
                out.push_str(&format!(
                    "      <error kind=\"{}\">{}</error>\n",
                    escape_xml(kind),
                    escape_xml(r.error.as_deref().unwrap_or(""))
                ));
            }
            None => {
                out.push_str(&format!("      <status>{}</status>\n", opt(r.status)));
                out.push_str(&format!("      <size>{}</size>\n", opt(r.size)));
                out.push_str(&format!("      <words>{}</words>\n", opt(r.words)));
                out.push_str(&format!("      <lines>{}</lines>\n", opt(r.lines)));
                out.push_str(&format!("      <title>{}</title>\n", escape_xml(&r.title)));
                out.push_str(&format!(
                    "      <content_type>{}</content_type>\n",
                    escape_xml(&r.content_type)
                ));
                if let Some(location) = r.redirect_location.as_deref() {
                    out.push_str(&format!(
                        "      <redirect_location>{}</redirect_location>\n",
                        escape_xml(location)
                    ));
                }
            }
        }
        out.push_str("    </result>\n");
    }
    out.push_str("  </results>\n");
    out.push_str("</fuzzai>\n");
    out.into_bytes()
}

const CSV_HEADER: [&str; 13] = [
    "ordinal",
    "candidate",
    "url",
    "status",
    "size",
    "words",
    "lines",
    "latency_ms",
    "title",
    "content_type",
    "redirect_location",
    "error_kind",
    "error",
];

/// Header row first, so an empty run still yields a parseable file.
pub fn render_csv(records: &[OutputRecord]) -> Result<Vec<u8>, OutputError> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(vec![]);
    wtr.write_record(CSV_HEADER)?;
    for record in records {
        wtr.serialize(record)?;
    }
    wtr.into_inner()
        .map_err(|e| OutputError::Csv(csv::Error::from(e.into_error())))
}

pub fn render_report(report: &RunReport, format: OutputFormat) -> Result<Vec<u8>, OutputError> {
    let records = build_records(&report.results);
    let stats = StatsRecord::new(report.state.label(), &report.stats);
    match format {
        OutputFormat::Text => Ok(render_text(&records)),
        OutputFormat::Json => render_json(&records, &stats),
        OutputFormat::Xml => Ok(render_xml(&records, &stats)),
        OutputFormat::Csv => render_csv(&records),
    }
}

pub async fn write_report(
    report: &RunReport,
    path: &Path,
    format: OutputFormat,
) -> Result<(), OutputError> {
    let rendered = render_report(report, format)?;
    tokio::fs::write(path, rendered)
        .await
        .map_err(|e| OutputError::Write {
            path: path.display().to_string(),
            source: e,
        })
}

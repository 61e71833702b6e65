use std::collections::BTreeSet;
use std::fmt;
use std::ops::RangeInclusive;

use serde::Serialize;
use thiserror::Error;

use super::response::{NetworkErrorKind, ResponseOutcome};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterParseError {
    #[error("invalid value '{item}' in {option}, expected an integer or MIN-MAX range")]
    InvalidNumber { option: &'static str, item: String },

    #[error("invalid range '{item}' in {option}, MIN must not exceed MAX")]
    ReversedRange { option: &'static str, item: String },

    #[error("invalid error kind '{item}' in {option}")]
    InvalidErrorKind { option: &'static str, item: String },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Keep,
    Drop,
}

/// A set of integers given as single values and inclusive ranges, e.g. `200,300-399`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NumberSet {
    values: BTreeSet<u64>,
    ranges: Vec<RangeInclusive<u64>>,
}

impl NumberSet {
    pub fn parse(input: &str, option: &'static str) -> Result<Self, FilterParseError> {
        let mut set = NumberSet::default();
        for item in input.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
            let invalid = || FilterParseError::InvalidNumber {
                option,
                item: item.to_string(),
            };
            match item.split_once('-') {
                Some((lo, hi)) => {
                    let lo: u64 = lo.trim().parse().map_err(|_| invalid())?;
                    let hi: u64 = hi.trim().parse().map_err(|_| invalid())?;
                    if lo > hi {
                        return Err(FilterParseError::ReversedRange {
                            option,
                            item: item.to_string(),
                        });
                    }
                    set.ranges.push(lo..=hi);
                }
                None => {
                    set.values.insert(item.parse().map_err(|_| invalid())?);
                }
            }
        }
        Ok(set)
    }

    pub fn contains(&self, value: u64) -> bool {
        self.values.contains(&value) || self.ranges.iter().any(|r| r.contains(&value))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.ranges.is_empty()
    }
}

impl fmt::Display for NumberSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.values.iter().map(|v| v.to_string()).collect();
        parts.extend(self.ranges.iter().map(|r| format!("{}-{}", r.start(), r.end())));
        f.write_str(&parts.join(","))
    }
}

/// Closed set of predicates over a response outcome.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FilterRule {
    Status(NumberSet),
    Size(NumberSet),
    Lines(NumberSet),
    Words(NumberSet),
    Failure(BTreeSet<NetworkErrorKind>),
}

impl FilterRule {
    pub fn matches(&self, outcome: &ResponseOutcome) -> bool {
        match (self, outcome) {
            (FilterRule::Status(set), ResponseOutcome::Success { status_code, .. }) => {
                set.contains(u64::from(*status_code))
            }
            (FilterRule::Size(set), ResponseOutcome::Success { body_size, .. }) => {
                set.contains(*body_size as u64)
            }
            (FilterRule::Lines(set), ResponseOutcome::Success { line_count, .. }) => {
                set.contains(*line_count as u64)
            }
            (FilterRule::Words(set), ResponseOutcome::Success { word_count, .. }) => {
                set.contains(*word_count as u64)
            }
            (FilterRule::Failure(kinds), ResponseOutcome::Failure { kind, .. }) => {
                kinds.contains(kind)
            }
            _ => false,
        }
    }
}

impl fmt::Display for FilterRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterRule::Status(set) => write!(f, "status={set}"),
            FilterRule::Size(set) => write!(f, "size={set}"),
            FilterRule::Lines(set) => write!(f, "lines={set}"),
            FilterRule::Words(set) => write!(f, "words={set}"),
            FilterRule::Failure(kinds) => {
                let labels: Vec<&str> = kinds.iter().map(|k| k.label()).collect();
                write!(f, "errors={}", labels.join(","))
            }
        }
    }
}

/// Decides keep/drop for one outcome. Failures stay visible unless a filter
/// targets their kind; otherwise filters win over matches, and an empty match
/// list keeps everything that was not filtered.
pub fn classify(outcome: &ResponseOutcome, filters: &[FilterRule], matches: &[FilterRule]) -> Decision {
    if outcome.is_failure() {
        return if filters.iter().any(|r| r.matches(outcome)) {
            Decision::Drop
        } else {
            Decision::Keep
        };
    }
    if filters.iter().any(|r| r.matches(outcome)) {
        return Decision::Drop;
    }
    if matches.is_empty() || matches.iter().any(|r| r.matches(outcome)) {
        Decision::Keep
    } else {
        Decision::Drop
    }
}

/// Raw comma-separated rule values as they arrive from flags or the config file.
#[derive(Clone, Debug, Default)]
pub struct FilterSpec {
    pub filter_status: Option<String>,
    pub filter_size: Option<String>,
    pub filter_lines: Option<String>,
    pub filter_words: Option<String>,
    pub filter_errors: Option<String>,
    pub match_status: Option<String>,
    pub match_size: Option<String>,
    pub match_lines: Option<String>,
    pub match_words: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub filters: Vec<FilterRule>,
    pub matches: Vec<FilterRule>,
}

impl RuleSet {
    pub fn from_spec(spec: &FilterSpec) -> Result<Self, FilterParseError> {
        let mut rules = RuleSet::default();

        let numeric: [(&Option<String>, &'static str, fn(NumberSet) -> FilterRule, bool); 8] = [
            (&spec.filter_status, "filter-status", FilterRule::Status, true),
            (&spec.filter_size, "filter-size", FilterRule::Size, true),
            (&spec.filter_lines, "filter-lines", FilterRule::Lines, true),
            (&spec.filter_words, "filter-words", FilterRule::Words, true),
            (&spec.match_status, "match-status", FilterRule::Status, false),
            (&spec.match_size, "match-size", FilterRule::Size, false),
            (&spec.match_lines, "match-lines", FilterRule::Lines, false),
            (&spec.match_words, "match-words", FilterRule::Words, false),
        ];
        for (raw, option, make, is_filter) in numeric {
            let Some(raw) = raw.as_deref() else { continue };
            let set = NumberSet::parse(raw, option)?;
            if set.is_empty() {
                continue;
            }
            if is_filter {
                rules.filters.push(make(set));
            } else {
                rules.matches.push(make(set));
            }
        }

        if let Some(raw) = spec.filter_errors.as_deref() {
            let kinds = parse_error_kinds(raw, "filter-errors")?;
            if !kinds.is_empty() {
                rules.filters.push(FilterRule::Failure(kinds));
            }
        }

        Ok(rules)
    }

    pub fn classify(&self, outcome: &ResponseOutcome) -> Decision {
        classify(outcome, &self.filters, &self.matches)
    }

    /// First filter rule that drops the outcome, for diagnostics.
    pub fn filter_hit(&self, outcome: &ResponseOutcome) -> Option<&FilterRule> {
        self.filters.iter().find(|r| r.matches(outcome))
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty() && self.matches.is_empty()
    }

    pub fn summary(&self) -> Option<String> {
        let mut parts: Vec<String> = Vec::new();
        for rule in self.filters.iter() {
            parts.push(format!("filter {rule}"));
        }
        for rule in self.matches.iter() {
            parts.push(format!("match {rule}"));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" | "))
        }
    }
}

fn parse_error_kinds(
    input: &str,
    option: &'static str,
) -> Result<BTreeSet<NetworkErrorKind>, FilterParseError> {
    let mut out = BTreeSet::new();
    for item in input.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()) {
        if item.eq_ignore_ascii_case("all") {
            out.extend(NetworkErrorKind::ALL);
            continue;
        }
        let kind = item
            .parse::<NetworkErrorKind>()
            .map_err(|_| FilterParseError::InvalidErrorKind {
                option,
                item: item.to_string(),
            })?;
        out.insert(kind);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::engine::response::ResponseMeta;

    fn ok(status: u16, size: usize, lines: usize, words: usize) -> ResponseOutcome {
        ResponseOutcome::Success {
            status_code: status,
            body_size: size,
            line_count: lines,
            word_count: words,
            latency: Duration::from_millis(5),
            meta: ResponseMeta::default(),
        }
    }

    fn status(list: &str) -> FilterRule {
        FilterRule::Status(NumberSet::parse(list, "test").unwrap())
    }

    #[test]
    fn number_set_handles_values_and_ranges() {
        let set = NumberSet::parse(" 12, 100-200 ,7", "filter-size").unwrap();
        assert!(set.contains(12));
        assert!(set.contains(100));
        assert!(set.contains(200));
        assert!(set.contains(7));
        assert!(!set.contains(201));
        assert_eq!(set.to_string(), "7,12,100-200");
    }

    #[test]
    fn number_set_rejects_garbage() {
        assert!(matches!(
            NumberSet::parse("404,abc", "filter-status"),
            Err(FilterParseError::InvalidNumber { .. })
        ));
        assert!(matches!(
            NumberSet::parse("500-400", "filter-status"),
            Err(FilterParseError::ReversedRange { .. })
        ));
        assert!(NumberSet::parse("-5", "filter-size").is_err());
    }

    #[test]
    fn filter_wins_over_match() {
        let outcome = ok(200, 10, 1, 2);
        let decision = classify(&outcome, &[status("200")], &[status("200")]);
        assert_eq!(decision, Decision::Drop);
    }

    #[test]
    fn no_match_rules_keeps_unfiltered() {
        assert_eq!(classify(&ok(500, 0, 0, 0), &[status("404")], &[]), Decision::Keep);
        assert_eq!(classify(&ok(404, 0, 0, 0), &[status("404")], &[]), Decision::Drop);
    }

    #[test]
    fn match_rules_are_any_of() {
        let matches = vec![
            status("200"),
            FilterRule::Size(NumberSet::parse("42", "test").unwrap()),
        ];
        assert_eq!(classify(&ok(302, 42, 0, 0), &[], &matches), Decision::Keep);
        assert_eq!(classify(&ok(200, 1, 0, 0), &[], &matches), Decision::Keep);
        assert_eq!(classify(&ok(302, 1, 0, 0), &[], &matches), Decision::Drop);
    }

    #[test]
    fn failures_are_kept_unless_targeted() {
        let timeout = ResponseOutcome::failure(NetworkErrorKind::Timeout, "deadline");
        // status match rules never hide failures
        assert_eq!(classify(&timeout, &[status("404")], &[status("200")]), Decision::Keep);

        let errors = FilterRule::Failure(BTreeSet::from([NetworkErrorKind::Timeout]));
        assert_eq!(classify(&timeout, &[errors.clone()], &[]), Decision::Drop);

        let refused = ResponseOutcome::failure(NetworkErrorKind::ConnectionRefused, "refused");
        assert_eq!(classify(&refused, &[errors], &[]), Decision::Keep);
    }

    #[test]
    fn rule_set_from_spec() {
        let spec = FilterSpec {
            filter_status: Some("404, 403".to_string()),
            filter_words: Some("".to_string()),
            filter_errors: Some("timeout,dns".to_string()),
            match_status: Some("200-299".to_string()),
            ..Default::default()
        };
        let rules = RuleSet::from_spec(&spec).unwrap();
        assert_eq!(rules.filters.len(), 2);
        assert_eq!(rules.matches.len(), 1);
        assert_eq!(
            rules.summary().unwrap(),
            "filter status=403,404 | filter errors=dns,timeout | match status=200-299"
        );
        assert_eq!(rules.classify(&ok(204, 0, 0, 0)), Decision::Keep);
        assert_eq!(rules.classify(&ok(301, 0, 0, 0)), Decision::Drop);
        assert_eq!(
            rules.filter_hit(&ok(404, 0, 0, 0)),
            Some(&FilterRule::Status(NumberSet::parse("404,403", "x").unwrap()))
        );
    }

    #[test]
    fn rule_set_rejects_unknown_error_kind() {
        let spec = FilterSpec {
            filter_errors: Some("timeout,bogus".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            RuleSet::from_spec(&spec),
            Err(FilterParseError::InvalidErrorKind { .. })
        ));
    }

    #[test]
    fn error_kind_all_expands() {
        let kinds = parse_error_kinds("all", "filter-errors").unwrap();
        assert_eq!(kinds.len(), NetworkErrorKind::ALL.len());
    }
}

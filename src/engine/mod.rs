pub mod aggregator;
pub mod dispatcher;
pub mod filters;
pub mod lifecycle;
pub mod request;
pub mod response;

use thiserror::Error;

use crate::wordlist::SourceError;

pub use aggregator::{Aggregator, AggregatorHandle, FuzzResult, RunReport, RunStatistics};
pub use dispatcher::{Dispatcher, DispatcherConfig};
pub use filters::{classify, Decision, FilterParseError, FilterRule, FilterSpec, NumberSet, RuleSet};
pub use lifecycle::{CancelSignal, RunState};
pub use request::{RequestDescriptor, RequestTemplate, TemplateError, DEFAULT_PLACEHOLDER};
pub use response::{NetworkErrorKind, ResponseMeta, ResponseOutcome};

/// Fatal engine errors. Anything here aborts the run; per-request failures
/// never surface as errors, they are recorded as `ResponseOutcome::Failure`.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error(transparent)]
    Filters(#[from] FilterParseError),

    #[error("invalid concurrency {value}, expected a positive integer")]
    InvalidConcurrency { value: usize },

    #[error("invalid request timeout, expected a positive duration")]
    InvalidTimeout,

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("failed to build HTTP client: {source}")]
    HttpClientBuild {
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to setup proxy: {proxy}: {source}")]
    ProxySetup {
        proxy: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("worker task failed: {0}")]
    WorkerFailed(#[source] tokio::task::JoinError),

    #[error("invalid run state transition: {from} -> {to}")]
    InvalidTransition { from: RunState, to: RunState },
}

pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod output;
pub mod wordlist;

pub use engine::{
    Dispatcher, DispatcherConfig, EngineError, FuzzResult, RequestTemplate, RuleSet, RunReport,
    RunState, RunStatistics,
};
pub use wordlist::{CandidateSource, FileWordlist, InlineWordlist, SourceError};

#[cfg(test)]
mod tests;

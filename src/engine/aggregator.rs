use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use super::filters::Decision;
use super::lifecycle::RunState;
use super::response::ResponseOutcome;
use crate::wordlist::SourceError;

#[derive(Clone, Debug)]
pub struct FuzzResult {
    pub ordinal: usize,
    pub candidate: String,
    pub url: String,
    pub outcome: ResponseOutcome,
    pub decision: Decision,
}

#[derive(Clone, Debug)]
pub struct RunStatistics {
    pub total_dispatched: usize,
    pub total_completed: usize,
    pub total_kept: usize,
    pub total_failed: usize,
    pub total_filtered: usize,
    pub started_at: Instant,
    pub finished_at: Option<Instant>,
}

impl RunStatistics {
    fn new() -> Self {
        Self {
            total_dispatched: 0,
            total_completed: 0,
            total_kept: 0,
            total_failed: 0,
            total_filtered: 0,
            started_at: Instant::now(),
            finished_at: None,
        }
    }

    pub fn elapsed(&self) -> Duration {
        match self.finished_at {
            Some(end) => end.duration_since(self.started_at),
            None => self.started_at.elapsed(),
        }
    }

    pub fn requests_per_second(&self) -> f64 {
        let secs = self.elapsed().as_secs_f64();
        if secs <= f64::EPSILON {
            return 0.0;
        }
        self.total_completed as f64 / secs
    }

    pub fn in_flight(&self) -> usize {
        self.total_dispatched.saturating_sub(self.total_completed)
    }
}

/// Final hand-off to the reporter: kept results in ordinal order plus statistics.
#[derive(Debug)]
pub struct RunReport {
    pub state: RunState,
    pub results: Vec<FuzzResult>,
    pub stats: RunStatistics,
    /// Set when the candidate source failed mid-run; `state` is then `Aborted`
    /// and the results cover only what was dispatched before the failure.
    pub source_error: Option<SourceError>,
}

/// Owns the kept results and the run statistics. Mutated only from the single
/// collector loop that drains `AggregatorEvent`s.
#[derive(Debug)]
pub struct Aggregator {
    stats: RunStatistics,
    kept: BTreeMap<usize, FuzzResult>,
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl Aggregator {
    pub fn new() -> Self {
        Self {
            stats: RunStatistics::new(),
            kept: BTreeMap::new(),
        }
    }

    pub fn record_dispatch(&mut self) {
        self.stats.total_dispatched += 1;
    }

    pub fn record(&mut self, result: FuzzResult) {
        self.stats.total_completed += 1;
        if result.outcome.is_failure() {
            self.stats.total_failed += 1;
        }
        match result.decision {
            Decision::Keep => {
                self.stats.total_kept += 1;
                let previous = self.kept.insert(result.ordinal, result);
                debug_assert!(previous.is_none(), "ordinal recorded twice");
            }
            Decision::Drop => self.stats.total_filtered += 1,
        }
    }

    pub fn finish(&mut self) {
        if self.stats.finished_at.is_none() {
            self.stats.finished_at = Some(Instant::now());
        }
    }

    /// Kept results in ordinal order with the current statistics. The
    /// dispatcher owns its aggregator for the length of a run, so live
    /// progress comes from the `on_result` stream and this is read afterwards.
    pub fn snapshot(&self) -> (Vec<FuzzResult>, RunStatistics) {
        (self.kept.values().cloned().collect(), self.stats.clone())
    }

    pub fn into_report(mut self, state: RunState) -> RunReport {
        self.finish();
        RunReport {
            state,
            results: self.kept.into_values().collect(),
            stats: self.stats,
            source_error: None,
        }
    }
}

#[derive(Debug)]
pub(crate) enum AggregatorEvent {
    Dispatched,
    Completed(FuzzResult),
}

/// Cloneable producer side of the aggregator, handed to every worker.
#[derive(Clone, Debug)]
pub struct AggregatorHandle {
    tx: mpsc::Sender<AggregatorEvent>,
}

impl AggregatorHandle {
    pub(crate) fn channel(capacity: usize) -> (Self, mpsc::Receiver<AggregatorEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub(crate) async fn dispatched(&self) -> bool {
        self.tx.send(AggregatorEvent::Dispatched).await.is_ok()
    }

    pub async fn record(&self, result: FuzzResult) -> bool {
        self.tx.send(AggregatorEvent::Completed(result)).await.is_ok()
    }
}

/// Drains events until every handle is dropped, streaming each completed
/// result to `on_result` after it has been counted.
pub(crate) async fn collect<F>(
    mut rx: mpsc::Receiver<AggregatorEvent>,
    mut aggregator: Aggregator,
    mut on_result: F,
) -> Aggregator
where
    F: FnMut(&FuzzResult),
{
    while let Some(event) = rx.recv().await {
        match event {
            AggregatorEvent::Dispatched => aggregator.record_dispatch(),
            AggregatorEvent::Completed(result) => {
                on_result(&result);
                aggregator.record(result);
            }
        }
    }
    aggregator.finish();
    aggregator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::response::{NetworkErrorKind, ResponseMeta};

    fn result(ordinal: usize, decision: Decision, failed: bool) -> FuzzResult {
        let outcome = if failed {
            ResponseOutcome::failure(NetworkErrorKind::Timeout, "timeout")
        } else {
            ResponseOutcome::Success {
                status_code: 200,
                body_size: 0,
                line_count: 0,
                word_count: 0,
                latency: Duration::ZERO,
                meta: ResponseMeta::default(),
            }
        };
        FuzzResult {
            ordinal,
            candidate: format!("w{ordinal}"),
            url: format!("http://example.com/w{ordinal}"),
            outcome,
            decision,
        }
    }

    #[test]
    fn snapshot_is_sorted_by_ordinal() {
        let mut agg = Aggregator::new();
        for ordinal in [4, 0, 3, 1, 2] {
            agg.record_dispatch();
            agg.record(result(ordinal, Decision::Keep, false));
        }
        let (results, stats) = agg.snapshot();
        let ordinals: Vec<usize> = results.iter().map(|r| r.ordinal).collect();
        assert_eq!(ordinals, vec![0, 1, 2, 3, 4]);
        assert_eq!(stats.total_kept, results.len());
        assert_eq!(stats.in_flight(), 0);
    }

    #[test]
    fn failures_counted_even_when_dropped() {
        let mut agg = Aggregator::new();
        agg.record(result(0, Decision::Drop, true));
        agg.record(result(1, Decision::Keep, true));
        agg.record(result(2, Decision::Drop, false));
        let report = agg.into_report(RunState::Completed);
        assert_eq!(report.stats.total_completed, 3);
        assert_eq!(report.stats.total_failed, 2);
        assert_eq!(report.stats.total_filtered, 2);
        assert_eq!(report.stats.total_kept, 1);
        assert_eq!(report.results.len(), 1);
        assert!(report.stats.finished_at.is_some());
    }

    #[tokio::test]
    async fn collector_serializes_concurrent_producers() {
        let (handle, rx) = AggregatorHandle::channel(4);
        let mut producers = Vec::new();
        for p in 0..4usize {
            let handle = handle.clone();
            producers.push(tokio::spawn(async move {
                for i in 0..25usize {
                    assert!(handle.dispatched().await);
                    assert!(handle.record(result(p * 25 + i, Decision::Keep, false)).await);
                }
            }));
        }
        drop(handle);

        let mut seen = 0usize;
        let collector = collect(rx, Aggregator::new(), |_| seen += 1);
        let (agg, _) = tokio::join!(collector, async {
            for p in producers {
                p.await.unwrap();
            }
        });

        let (results, stats) = agg.snapshot();
        assert_eq!(seen, 100);
        assert_eq!(stats.total_dispatched, 100);
        assert_eq!(stats.total_completed, 100);
        assert!(results.windows(2).all(|w| w[0].ordinal < w[1].ordinal));
    }
}

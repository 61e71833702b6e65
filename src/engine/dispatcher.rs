use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use governor::{Quota, RateLimiter};
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::aggregator::{self, Aggregator, AggregatorHandle, FuzzResult, RunReport};
use super::filters::{Decision, RuleSet};
use super::lifecycle::{CancelSignal, RunState};
use super::request::{RequestDescriptor, RequestTemplate};
use super::response::{classify_transport_error, NetworkErrorKind, ResponseMeta, ResponseOutcome};
use super::EngineError;
use crate::wordlist::{CandidateSource, SourceError};

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:95.0) Gecko/20100101 Firefox/95.0";

#[derive(Clone, Debug)]
pub struct DispatcherConfig {
    pub concurrency: usize,
    pub timeout: Duration,
    /// Pause each worker takes after finishing a request.
    pub delay: Duration,
    /// Global requests per second, 0 disables the limiter.
    pub rate: u32,
    pub max_time: Option<Duration>,
    pub insecure: bool,
    pub follow_redirects: bool,
    pub proxy: Option<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            timeout: Duration::from_secs(10),
            delay: Duration::ZERO,
            rate: 0,
            max_time: None,
            insecure: false,
            follow_redirects: false,
            proxy: None,
        }
    }
}

pub fn build_client(config: &DispatcherConfig) -> Result<reqwest::Client, EngineError> {
    let mut headers = reqwest::header::HeaderMap::new();
    headers.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_static(USER_AGENT),
    );

    let redirect_policy = if config.follow_redirects {
        reqwest::redirect::Policy::limited(10)
    } else {
        reqwest::redirect::Policy::none()
    };

    let mut builder = reqwest::Client::builder()
        .default_headers(headers)
        .redirect(redirect_policy)
        .timeout(config.timeout)
        .connect_timeout(config.timeout)
        .pool_max_idle_per_host(config.concurrency)
        .danger_accept_invalid_hostnames(config.insecure)
        .danger_accept_invalid_certs(config.insecure);

    if let Some(proxy) = config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
        let proxy = reqwest::Proxy::all(proxy).map_err(|e| EngineError::ProxySetup {
            proxy: proxy.to_string(),
            source: e,
        })?;
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| EngineError::HttpClientBuild { source: e })
}

/// Runs a candidate source through the request template with a fixed pool of
/// workers. Candidates are pulled by a single coordinator, one per idle
/// worker, so at most `concurrency` requests are ever in flight.
#[derive(Debug)]
pub struct Dispatcher {
    template: RequestTemplate,
    rules: Arc<RuleSet>,
    config: DispatcherConfig,
    client: reqwest::Client,
    cancel: CancelSignal,
}

impl Dispatcher {
    pub fn new(
        template: RequestTemplate,
        rules: RuleSet,
        config: DispatcherConfig,
    ) -> Result<Self, EngineError> {
        if config.concurrency == 0 {
            return Err(EngineError::InvalidConcurrency {
                value: config.concurrency,
            });
        }
        if config.timeout.is_zero() {
            return Err(EngineError::InvalidTimeout);
        }
        let client = build_client(&config)?;
        Ok(Self {
            template,
            rules: Arc::new(rules),
            config,
            client,
            cancel: CancelSignal::new(),
        })
    }

    /// Shares an externally owned signal, e.g. one wired to Ctrl-C.
    pub fn with_cancel_signal(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drains `source` and returns the final report once every dispatched
    /// request has completed. `on_result` sees each result as it is recorded,
    /// in completion order. A source that fails mid-run ends the run as
    /// `Aborted` with the error carried in the report.
    pub async fn run<S, F>(&self, source: &mut S, on_result: F) -> Result<RunReport, EngineError>
    where
        S: CandidateSource,
        F: FnMut(&FuzzResult),
    {
        let running = RunState::Idle.advance(RunState::Running)?;
        let concurrency = self.config.concurrency;
        let (events, event_rx) = AggregatorHandle::channel(concurrency * 2);
        let (ready_tx, ready_rx) = mpsc::channel::<usize>(concurrency);

        let mut job_txs = Vec::with_capacity(concurrency);
        let workers: FuturesUnordered<JoinHandle<()>> = FuturesUnordered::new();
        for id in 0..concurrency {
            let (job_tx, job_rx) = mpsc::channel::<RequestDescriptor>(1);
            job_txs.push(job_tx);
            let worker = Worker {
                id,
                client: self.client.clone(),
                rules: Arc::clone(&self.rules),
                timeout: self.config.timeout,
                delay: self.config.delay,
                events: events.clone(),
            };
            workers.push(tokio::spawn(worker.run(ready_tx.clone(), job_rx)));
        }
        drop(ready_tx);

        // private to this run so a spent deadline never leaks into the next one
        let deadline = CancelSignal::new();
        let timer = self.config.max_time.map(|after| deadline.cancel_after(after));

        debug!(
            url = self.template.url(),
            concurrency,
            timeout = ?self.config.timeout,
            "starting run"
        );

        let coordinator = async move {
            let end = self
                .coordinate(source, &events, &deadline, ready_rx, job_txs)
                .await;
            drop(events);
            let failure = join_workers(workers).await;
            (end, failure)
        };
        let (((end, source_error), failure), aggregator) = tokio::join!(
            coordinator,
            aggregator::collect(event_rx, Aggregator::new(), on_result)
        );

        if let Some(timer) = timer {
            timer.abort();
        }
        if let Some(e) = failure {
            return Err(EngineError::WorkerFailed(e));
        }

        let state = running.advance(end)?;
        let mut report = aggregator.into_report(state);
        report.source_error = source_error;
        debug!(
            state = state.label(),
            dispatched = report.stats.total_dispatched,
            completed = report.stats.total_completed,
            "run finished"
        );
        Ok(report)
    }

    /// Resolves once either the caller's signal or this run's deadline fires.
    async fn stopped(&self, deadline: &CancelSignal) {
        tokio::select! {
            _ = self.cancel.cancelled() => {}
            _ = deadline.cancelled() => {}
        }
    }

    async fn coordinate<S: CandidateSource>(
        &self,
        source: &mut S,
        events: &AggregatorHandle,
        deadline: &CancelSignal,
        mut ready_rx: mpsc::Receiver<usize>,
        job_txs: Vec<mpsc::Sender<RequestDescriptor>>,
    ) -> (RunState, Option<SourceError>) {
        let limiter = NonZeroU32::new(self.config.rate)
            .map(|rate| RateLimiter::direct(Quota::per_second(rate)));
        let mut ordinal = 0usize;

        loop {
            let worker = tokio::select! {
                biased;
                _ = self.stopped(deadline) => return (RunState::Cancelled, None),
                id = ready_rx.recv() => match id {
                    Some(id) => id,
                    // every worker is gone, the join reports why
                    None => return (RunState::Completed, None),
                },
            };

            if let Some(limiter) = limiter.as_ref() {
                tokio::select! {
                    biased;
                    _ = self.stopped(deadline) => return (RunState::Cancelled, None),
                    _ = limiter.until_ready() => {}
                }
            }

            let candidate = match source.next_candidate().await {
                Ok(Some(candidate)) => candidate,
                Ok(None) => return (RunState::Completed, None),
                Err(e) => {
                    warn!(error = %e, dispatched = ordinal, "candidate source failed mid-run");
                    return (RunState::Aborted, Some(e));
                }
            };

            let request = self.template.build(&candidate, ordinal);
            ordinal += 1;
            trace!(ordinal = request.ordinal, worker, url = %request.url, "dispatch");

            if !events.dispatched().await {
                return (RunState::Completed, None);
            }
            if job_txs[worker].send(request).await.is_err() {
                return (RunState::Completed, None);
            }
        }
    }
}

async fn join_workers(mut workers: FuturesUnordered<JoinHandle<()>>) -> Option<JoinError> {
    let mut failure = None;
    while let Some(joined) = workers.next().await {
        if let Err(e) = joined {
            failure.get_or_insert(e);
        }
    }
    failure
}

struct Worker {
    id: usize,
    client: reqwest::Client,
    rules: Arc<RuleSet>,
    timeout: Duration,
    delay: Duration,
    events: AggregatorHandle,
}

impl Worker {
    async fn run(self, ready: mpsc::Sender<usize>, mut jobs: mpsc::Receiver<RequestDescriptor>) {
        loop {
            if ready.send(self.id).await.is_err() {
                break;
            }
            let Some(request) = jobs.recv().await else {
                break;
            };

            let outcome = execute(&self.client, &request, self.timeout).await;
            let decision = self.rules.classify(&outcome);
            if decision == Decision::Drop {
                if let Some(rule) = self.rules.filter_hit(&outcome) {
                    debug!(url = %request.url, %rule, "filtered");
                }
            }
            if let ResponseOutcome::Failure { kind, message } = &outcome {
                debug!(url = %request.url, %kind, message = message.as_str(), "request failed");
            }

            let result = FuzzResult {
                ordinal: request.ordinal,
                candidate: request.candidate,
                url: request.url,
                outcome,
                decision,
            };
            if !self.events.record(result).await {
                break;
            }

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }
    }
}

fn build_request(client: &reqwest::Client, request: &RequestDescriptor) -> reqwest::RequestBuilder {
    let mut builder = client.request(request.method.clone(), request.url.as_str());
    for (key, value) in request.headers.iter() {
        // reqwest sets the length from the body
        if key.eq_ignore_ascii_case("content-length") {
            continue;
        }
        builder = builder.header(key.as_str(), value.as_str());
    }
    if let Some(body) = request.body.as_ref() {
        builder = builder.body(body.clone());
    }
    builder
}

fn response_meta(response: &reqwest::Response) -> ResponseMeta {
    let header = |name: reqwest::header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
    };
    ResponseMeta {
        content_type: header(reqwest::header::CONTENT_TYPE).unwrap_or_default(),
        redirect_location: header(reqwest::header::LOCATION),
        title: String::new(),
    }
}

/// Sends one request and reads the full body, bounded by `timeout`.
pub async fn execute(
    client: &reqwest::Client,
    request: &RequestDescriptor,
    timeout: Duration,
) -> ResponseOutcome {
    let started = Instant::now();
    let exchange = async {
        let response = build_request(client, request).send().await?;
        let status = response.status().as_u16();
        let meta = response_meta(&response);
        let body = response.bytes().await?;
        Ok::<_, reqwest::Error>((status, meta, body))
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok((status, meta, body))) => {
            ResponseOutcome::from_body(status, &body, started.elapsed(), meta)
        }
        Ok(Err(e)) => ResponseOutcome::failure(classify_transport_error(&e), e.to_string()),
        Err(_) => ResponseOutcome::failure(
            NetworkErrorKind::Timeout,
            format!("no complete response within {:?}", timeout),
        ),
    }
}

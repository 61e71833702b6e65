use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use crate::engine::dispatcher::{Dispatcher, DispatcherConfig};
use crate::engine::filters::{classify, Decision, FilterRule, FilterSpec, NumberSet, RuleSet};
use crate::engine::lifecycle::RunState;
use crate::engine::request::RequestTemplate;
use crate::engine::response::{NetworkErrorKind, ResponseMeta, ResponseOutcome};
use crate::wordlist::InlineWordlist;

fn success(status: u16, size: usize, lines: usize, words: usize) -> ResponseOutcome {
    ResponseOutcome::Success {
        status_code: status,
        body_size: size,
        line_count: lines,
        word_count: words,
        latency: Duration::ZERO,
        meta: ResponseMeta::default(),
    }
}

fn status_rule(raw: &str) -> FilterRule {
    FilterRule::Status(NumberSet::parse(raw, "test").unwrap())
}

#[test]
fn filter_always_beats_match() {
    let filters = vec![status_rule("200")];
    let matches = vec![status_rule("200-299")];
    for size in [0usize, 10, 1000] {
        assert_eq!(
            classify(&success(200, size, 1, 1), &filters, &matches),
            Decision::Drop
        );
    }
    assert_eq!(
        classify(&success(204, 0, 0, 0), &filters, &matches),
        Decision::Keep
    );
}

#[test]
fn no_match_rules_keeps_everything_unfiltered() {
    let filters = vec![FilterRule::Size(NumberSet::parse("0", "test").unwrap())];
    for status in [200u16, 301, 403, 404, 500] {
        assert_eq!(
            classify(&success(status, 12, 1, 2), &filters, &[]),
            Decision::Keep
        );
        assert_eq!(
            classify(&success(status, 0, 0, 0), &filters, &[]),
            Decision::Drop
        );
    }
}

#[test]
fn match_rules_restrict_the_kept_set() {
    let matches = vec![
        status_rule("200"),
        FilterRule::Words(NumberSet::parse("42", "test").unwrap()),
    ];
    assert_eq!(classify(&success(200, 1, 1, 1), &[], &matches), Decision::Keep);
    assert_eq!(classify(&success(404, 1, 1, 42), &[], &matches), Decision::Keep);
    assert_eq!(classify(&success(404, 1, 1, 1), &[], &matches), Decision::Drop);
}

#[test]
fn failures_stay_visible_unless_targeted() {
    let failure = ResponseOutcome::failure(NetworkErrorKind::Timeout, "slow");
    let matches = vec![status_rule("200")];
    assert_eq!(classify(&failure, &[status_rule("404")], &matches), Decision::Keep);

    let rules = RuleSet::from_spec(&FilterSpec {
        filter_errors: Some("timeout".to_string()),
        ..FilterSpec::default()
    })
    .unwrap();
    assert_eq!(rules.classify(&failure), Decision::Drop);
    assert_eq!(
        rules.classify(&ResponseOutcome::failure(NetworkErrorKind::Dns, "nx")),
        Decision::Keep
    );
}

#[test]
fn classification_is_deterministic() {
    let rules = RuleSet::from_spec(&FilterSpec {
        filter_status: Some("404".to_string()),
        filter_size: Some("100-200".to_string()),
        match_status: Some("200-399".to_string()),
        ..FilterSpec::default()
    })
    .unwrap();
    let outcomes = [
        success(200, 150, 1, 1),
        success(200, 50, 1, 1),
        success(404, 50, 1, 1),
        success(500, 50, 1, 1),
        ResponseOutcome::failure(NetworkErrorKind::ConnectionReset, "reset"),
    ];
    for outcome in outcomes.iter() {
        let first = rules.classify(outcome);
        for _ in 0..10 {
            assert_eq!(rules.classify(outcome), first);
        }
    }
}

fn closed_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

#[tokio::test]
async fn refused_connections_are_recorded_not_fatal() {
    let port = closed_port();
    let template = RequestTemplate::new(&format!("http://127.0.0.1:{port}/FUZZ"), "FUZZ").unwrap();
    let config = DispatcherConfig {
        concurrency: 2,
        timeout: Duration::from_secs(5),
        ..DispatcherConfig::default()
    };
    let dispatcher = Dispatcher::new(template, RuleSet::default(), config).unwrap();
    let mut source = InlineWordlist::new(["a", "b", "c"]);

    let report = dispatcher.run(&mut source, |_| {}).await.unwrap();
    assert_eq!(report.state, RunState::Completed);
    assert_eq!(report.stats.total_completed, 3);
    assert_eq!(report.stats.total_failed, 3);
    assert_eq!(report.results.len(), 3);
    for result in report.results.iter() {
        match &result.outcome {
            ResponseOutcome::Failure { kind, .. } => {
                assert_eq!(*kind, NetworkErrorKind::ConnectionRefused)
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }
}

#[tokio::test]
async fn garbage_responses_are_malformed() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf).await;
                let _ = stream.write_all(b"NOT-HTTP garbage\r\n\r\n").await;
                let _ = stream.shutdown().await;
            });
        }
    });

    let template = RequestTemplate::new(&format!("http://{addr}/FUZZ"), "FUZZ").unwrap();
    let dispatcher = Dispatcher::new(template, RuleSet::default(), DispatcherConfig::default()).unwrap();
    let mut source = InlineWordlist::new(["x"]);

    let report = dispatcher.run(&mut source, |_| {}).await.unwrap();
    assert_eq!(report.stats.total_failed, 1);
    assert!(matches!(
        report.results[0].outcome,
        ResponseOutcome::Failure {
            kind: NetworkErrorKind::MalformedResponse,
            ..
        }
    ));
}

#[tokio::test]
async fn streaming_callback_sees_every_completion() {
    let port = closed_port();
    let template = RequestTemplate::new(&format!("http://127.0.0.1:{port}/FUZZ"), "FUZZ").unwrap();
    let rules = RuleSet::from_spec(&FilterSpec {
        filter_errors: Some("all".to_string()),
        ..FilterSpec::default()
    })
    .unwrap();
    let dispatcher = Dispatcher::new(template, rules, DispatcherConfig::default()).unwrap();
    let mut source = InlineWordlist::new((0..25).map(|i| format!("w{i}")));

    let mut seen = Vec::new();
    let report = dispatcher
        .run(&mut source, |r| seen.push(r.ordinal))
        .await
        .unwrap();
    seen.sort_unstable();
    assert_eq!(seen, (0..25).collect::<Vec<_>>());
    // every failure was filtered but still counted
    assert!(report.results.is_empty());
    assert_eq!(report.stats.total_failed, 25);
    assert_eq!(report.stats.total_filtered, 25);
    assert_eq!(report.stats.total_kept, 0);
}

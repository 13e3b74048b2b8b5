//! Poll loop behaviour against scripted event sources.

mod common;

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{ORDER_PLACED, PRESCRIPTION_UPLOADED};
use laekning_eventhub::commands::{poll_loop, PollOptions};
use laekning_eventhub::eventhub::{ConsumerError, EventSource, RawEvent};
use laekning_eventhub::report::Reporter;
use tokio::sync::oneshot;

/// What a scripted poll returns.
enum Step {
    Batch(Vec<&'static str>),
    Fail(&'static str),
}

/// Replays a fixed script, then signals shutdown and idles.
struct Scripted {
    steps: VecDeque<Step>,
    requested: Arc<Mutex<Vec<usize>>>,
    done: Option<oneshot::Sender<()>>,
}

impl Scripted {
    fn new(steps: Vec<Step>) -> (Self, oneshot::Receiver<()>, Arc<Mutex<Vec<usize>>>) {
        let (tx, rx) = oneshot::channel();
        let requested = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                steps: steps.into(),
                requested: requested.clone(),
                done: Some(tx),
            },
            rx,
            requested,
        )
    }
}

#[async_trait]
impl EventSource for Scripted {
    async fn receive_events(&mut self, max: usize) -> Result<Vec<RawEvent>, ConsumerError> {
        self.requested.lock().unwrap().push(max);
        match self.steps.pop_front() {
            Some(Step::Batch(bodies)) => Ok(bodies.into_iter().map(RawEvent::from_body).collect()),
            Some(Step::Fail(reason)) => Err(ConsumerError::Config(reason.to_string())),
            None => {
                if let Some(done) = self.done.take() {
                    let _ = done.send(());
                }
                std::future::pending::<()>().await;
                Ok(Vec::new())
            }
        }
    }
}

fn options() -> PollOptions {
    PollOptions {
        batch_size: 10,
        poll_interval: Duration::from_millis(5),
    }
}

async fn until(rx: oneshot::Receiver<()>) {
    let _ = rx.await;
}

#[tokio::test]
async fn test_every_event_of_every_batch_in_order() {
    let (mut source, rx, requested) = Scripted::new(vec![
        Step::Batch(vec![PRESCRIPTION_UPLOADED, ORDER_PLACED]),
        Step::Batch(vec![]),
        Step::Batch(vec![r#"{"EventType":"ProductsIdentified"}"#]),
    ]);
    let mut reporter = Reporter::new(Vec::new(), Vec::new());

    let stats = poll_loop(&mut source, &mut reporter, options(), until(rx))
        .await
        .unwrap();

    assert_eq!(stats.reported, 3);
    assert_eq!(*requested.lock().unwrap(), vec![10, 10, 10, 10]);

    let (out, _) = reporter.into_sinks();
    let kinds: Vec<String> = String::from_utf8(out)
        .unwrap()
        .lines()
        .filter_map(|l| l.strip_prefix("EventType: ").map(str::to_string))
        .collect();
    assert_eq!(
        kinds,
        vec!["PrescriptionUploaded", "OrderPlaced", "ProductsIdentified"]
    );
}

#[tokio::test]
async fn test_continues_after_malformed_event() {
    let (mut source, rx, _) = Scripted::new(vec![
        Step::Batch(vec!["{oops", ORDER_PLACED]),
        Step::Batch(vec!["", PRESCRIPTION_UPLOADED]),
    ]);
    let mut reporter = Reporter::new(Vec::new(), Vec::new());

    let stats = poll_loop(&mut source, &mut reporter, options(), until(rx))
        .await
        .unwrap();

    assert_eq!(stats.reported, 2);
    assert_eq!(stats.failed, 2);
    let (_, err) = reporter.into_sinks();
    let err = String::from_utf8(err).unwrap();
    assert_eq!(err.lines().count(), 2);
    assert!(err.lines().all(|l| l.starts_with("Error parsing event: ")));
}

#[tokio::test]
async fn test_source_error_ends_loop() {
    let (mut source, rx, _) = Scripted::new(vec![
        Step::Batch(vec![ORDER_PLACED]),
        Step::Fail("broker went away"),
        Step::Batch(vec![PRESCRIPTION_UPLOADED]),
    ]);
    let mut reporter = Reporter::new(Vec::new(), Vec::new());

    let err = poll_loop(&mut source, &mut reporter, options(), until(rx))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("broker went away"));
    assert_eq!(reporter.stats().reported, 1);
}

#[tokio::test]
async fn test_sleeps_between_polls() {
    let (mut source, rx, _) = Scripted::new(vec![
        Step::Batch(vec![]),
        Step::Batch(vec![]),
        Step::Batch(vec![]),
    ]);
    let mut reporter = Reporter::new(Vec::new(), Vec::new());
    let options = PollOptions {
        batch_size: 10,
        poll_interval: Duration::from_millis(40),
    };

    let started = tokio::time::Instant::now();
    poll_loop(&mut source, &mut reporter, options, until(rx))
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(120));
}

#[tokio::test]
async fn test_shutdown_before_first_batch() {
    let (mut source, _rx, requested) = Scripted::new(vec![]);
    let mut reporter = Reporter::new(Vec::new(), Vec::new());

    let stats = poll_loop(&mut source, &mut reporter, options(), async {})
        .await
        .unwrap();

    assert_eq!(stats.total(), 0);
    assert!(requested.lock().unwrap().len() <= 1);
}

#[tokio::test]
async fn test_batch_size_is_forwarded() {
    let (mut source, rx, requested) = Scripted::new(vec![Step::Batch(vec![ORDER_PLACED])]);
    let mut reporter = Reporter::new(Vec::new(), Vec::new());
    let options = PollOptions {
        batch_size: 3,
        poll_interval: Duration::from_millis(1),
    };

    poll_loop(&mut source, &mut reporter, options, until(rx))
        .await
        .unwrap();

    assert!(requested.lock().unwrap().iter().all(|&n| n == 3));
}

//! End-to-end orchestration scenarios over scripted adapters
//!
//! Exercises the full submit cycle without any network: budgeting, fan-out,
//! fragment delivery, reassembly, partial-failure isolation, and
//! cancellation.

use async_trait::async_trait;
use polychat::chat::ChatEvent;
use polychat::context::{HistoryBudgeter, TokenCounter};
use polychat::errors::ProviderError;
use polychat::streaming::{FragmentStream, ProviderAdapter};
use polychat::types::{ModelCatalog, ModelDescriptor, Role, StreamFragment, Turn};
use polychat::ChatOrchestrator;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::{timeout, Duration};

/// What a scripted adapter should do for each request
#[derive(Debug, Clone)]
enum Script {
    /// Yield these fragments, then close normally
    Reply(Vec<&'static str>),

    /// Yield these fragments, then fail mid-stream
    FailAfter(Vec<&'static str>),

    /// Refuse the request before any stream exists
    Reject,

    /// Yield one fragment, then stall until cancelled
    Stall,
}

/// Recorded inputs of one adapter invocation
#[derive(Debug, Clone)]
struct SeenRequest {
    model_id: String,
    system_prompt: Option<String>,
    history: Vec<Turn>,
    token_limit: u32,
}

/// Scripted in-memory adapter standing in for one protocol family
struct ScriptedAdapter {
    script: Script,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl ScriptedAdapter {
    fn new(script: Script) -> (Arc<Self>, Arc<Mutex<Vec<SeenRequest>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let adapter = Arc::new(Self {
            script,
            seen: Arc::clone(&seen),
        });
        (adapter, seen)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedAdapter {
    async fn stream(
        &self,
        model: &ModelDescriptor,
        system_prompt: Option<&str>,
        history: &[Turn],
        token_limit: u32,
    ) -> Result<FragmentStream, ProviderError> {
        self.seen.lock().unwrap().push(SeenRequest {
            model_id: model.id.clone(),
            system_prompt: system_prompt.map(|p| p.to_string()),
            history: history.to_vec(),
            token_limit,
        });

        match &self.script {
            Script::Reply(words) => {
                let items: Vec<Result<StreamFragment, ProviderError>> = words
                    .iter()
                    .map(|w| Ok(StreamFragment::new(*w)))
                    .collect();
                Ok(Box::pin(futures_util::stream::iter(items)))
            }
            Script::FailAfter(words) => {
                let mut items: Vec<Result<StreamFragment, ProviderError>> = words
                    .iter()
                    .map(|w| Ok(StreamFragment::new(*w)))
                    .collect();
                items.push(Err(ProviderError::MalformedEvent(
                    "event payload missing content[0].text".to_string(),
                )));
                Ok(Box::pin(futures_util::stream::iter(items)))
            }
            Script::Reject => Err(ProviderError::Rejected {
                status: 401,
                message: "bad credentials".to_string(),
            }),
            Script::Stall => {
                let stream = async_stream::stream! {
                    yield Ok(StreamFragment::new("partial "));
                    futures_util::future::pending::<()>().await;
                };
                Ok(Box::pin(stream))
            }
        }
    }
}

fn build(
    completion: Script,
    event_stream: Script,
) -> (
    ChatOrchestrator,
    mpsc::Receiver<ChatEvent>,
    Arc<Mutex<Vec<SeenRequest>>>,
    Arc<Mutex<Vec<SeenRequest>>>,
) {
    let (completion_adapter, completion_seen) = ScriptedAdapter::new(completion);
    let (event_adapter, event_seen) = ScriptedAdapter::new(event_stream);
    let (orchestrator, receiver) = ChatOrchestrator::new(
        ModelCatalog::default_catalog(),
        completion_adapter,
        event_adapter,
    );
    (orchestrator, receiver, completion_seen, event_seen)
}

fn drain(receiver: &mut mpsc::Receiver<ChatEvent>) -> Vec<ChatEvent> {
    let mut events = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        events.push(event);
    }
    events
}

/// Scenario A: one short message under a 4096 limit
#[tokio::test]
async fn scenario_a_short_message_within_budget() {
    let (mut orchestrator, mut receiver, _, _) =
        build(Script::Reply(vec!["Hi ", "there"]), Script::Reply(vec![]));
    orchestrator.select("gpt-3.5-turbo").unwrap();

    orchestrator.submit("What is Rust?", None, 4096);
    orchestrator.wait_idle().await;

    let history = orchestrator.history("gpt-3.5-turbo");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].role, Role::User);
    assert_eq!(history[1].role, Role::Assistant);
    assert_eq!(history[1].content, "Hi there");

    let counts = orchestrator.token_counts();
    assert_eq!(counts.len(), 1);
    assert!(counts[0].1 < 4096);

    let events = drain(&mut receiver);
    assert!(events
        .iter()
        .any(|e| matches!(e, ChatEvent::Completed { .. })));
}

/// Scenario B: repeated messages against a tight limit evict oldest first
#[tokio::test]
async fn scenario_b_tight_budget_evicts_oldest() {
    let (mut orchestrator, _receiver, seen, _) =
        build(Script::Reply(vec!["ok"]), Script::Reply(vec![]));
    orchestrator.select("gpt-3.5-turbo").unwrap();

    for i in 0..8 {
        orchestrator.submit(&format!("message number {}", i), None, 50);
        orchestrator.wait_idle().await;
    }

    // Every request the adapter received had already been budgeted down
    let budgeter = HistoryBudgeter::new(TokenCounter::new());
    for request in seen.lock().unwrap().iter() {
        let history: std::collections::VecDeque<Turn> = request.history.iter().cloned().collect();
        let cost = budgeter.cost(&history);
        assert!(
            cost <= 50,
            "budgeted history cost {} exceeds limit 50",
            cost
        );
    }

    // The earliest messages are long gone, the latest survives
    let history = orchestrator.history("gpt-3.5-turbo");
    assert!(history.iter().all(|t| t.content != "message number 0"));
    assert!(history
        .iter()
        .any(|t| t.content == "message number 7" || t.content == "ok"));
}

/// Scenario C: one model succeeds while the other fails mid-stream
#[tokio::test]
async fn scenario_c_partial_failure_isolation() {
    let (mut orchestrator, mut receiver, _, _) = build(
        Script::Reply(vec!["fine ", "answer"]),
        Script::FailAfter(vec!["doomed "]),
    );
    orchestrator.select("gpt-4").unwrap();
    orchestrator.select("sonnet").unwrap();

    orchestrator.submit("hello both", None, 4096);
    orchestrator.wait_idle().await;

    // The completion-style model stored its reply
    let ok_history = orchestrator.history("gpt-4");
    assert_eq!(ok_history.len(), 2);
    assert_eq!(ok_history[1], Turn::assistant("fine answer"));

    // The failed model keeps the user turn and nothing else
    let failed_history = orchestrator.history("sonnet");
    assert_eq!(failed_history.len(), 1);
    assert_eq!(failed_history[0], Turn::user("hello both"));

    let events = drain(&mut receiver);
    let failed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::Failed {
                model_id, detail, ..
            } => Some((model_id.clone(), detail.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, "sonnet");
    assert!(failed[0].1.contains("content[0].text"));

    // Fragments already delivered before the failure were not retracted
    assert!(events.iter().any(
        |e| matches!(e, ChatEvent::Fragment { model_id, text, .. }
                if model_id == "sonnet" && text == "doomed ")
    ));
}

/// Scenario D: system prompt reaches adapters; it is never stored
#[tokio::test]
async fn scenario_d_system_prompt_passthrough() {
    let (mut orchestrator, _receiver, completion_seen, event_seen) =
        build(Script::Reply(vec!["a"]), Script::Reply(vec!["b"]));
    orchestrator.select("gpt-4o").unwrap();
    orchestrator.select("opus").unwrap();

    orchestrator.submit("hi", Some("You are terse."), 2048);
    orchestrator.wait_idle().await;

    let completion_requests = completion_seen.lock().unwrap();
    assert_eq!(completion_requests.len(), 1);
    assert_eq!(
        completion_requests[0].system_prompt.as_deref(),
        Some("You are terse.")
    );
    assert_eq!(completion_requests[0].token_limit, 2048);

    let event_requests = event_seen.lock().unwrap();
    assert_eq!(event_requests.len(), 1);
    assert_eq!(
        event_requests[0].system_prompt.as_deref(),
        Some("You are terse.")
    );

    // Stored history never contains a system turn
    for model in ["gpt-4o", "opus"] {
        assert!(orchestrator
            .history(model)
            .iter()
            .all(|t| t.role != Role::System));
    }
}

/// Fragments concatenate to exactly the stored assistant turn
#[tokio::test]
async fn fragments_reassemble_exactly() {
    let (mut orchestrator, mut receiver, _, _) = build(
        Script::Reply(vec!["The ", "quick ", "brown ", "fox"]),
        Script::Reply(vec![]),
    );
    orchestrator.select("gpt-4").unwrap();

    orchestrator.submit("go", None, 4096);
    orchestrator.wait_idle().await;

    let events = drain(&mut receiver);
    let streamed: String = events
        .iter()
        .filter_map(|e| match e {
            ChatEvent::Fragment { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();

    let history = orchestrator.history("gpt-4");
    assert_eq!(streamed, "The quick brown fox");
    assert_eq!(history[1].content, streamed);
}

/// A rejected request fails before streaming and stores nothing
#[tokio::test]
async fn rejection_reports_failed_without_assistant_turn() {
    let (mut orchestrator, mut receiver, _, _) =
        build(Script::Reject, Script::Reply(vec![]));
    orchestrator.select("gpt-4").unwrap();

    orchestrator.submit("hello", None, 4096);
    orchestrator.wait_idle().await;

    assert_eq!(orchestrator.history("gpt-4").len(), 1);

    let events = drain(&mut receiver);
    assert!(events.iter().any(
        |e| matches!(e, ChatEvent::Failed { model_id, detail, .. }
                if model_id == "gpt-4" && detail.contains("401"))
    ));
    assert!(!events
        .iter()
        .any(|e| matches!(e, ChatEvent::Fragment { .. })));
}

/// A stalled provider never delays another model's delivery
#[tokio::test]
async fn stalled_model_does_not_block_others() {
    let (mut orchestrator, mut receiver, _, _) =
        build(Script::Stall, Script::Reply(vec!["prompt ", "reply"]));
    orchestrator.select("gpt-4").unwrap(); // stalls
    orchestrator.select("haiku").unwrap(); // completes

    orchestrator.submit("race", None, 4096);

    // The healthy model completes while the other is still stalled
    let completed = timeout(Duration::from_secs(2), async {
        loop {
            match receiver.recv().await {
                Some(ChatEvent::Completed { model_id, .. }) => break model_id,
                Some(_) => continue,
                None => panic!("event channel closed early"),
            }
        }
    })
    .await
    .expect("healthy model blocked behind stalled one");
    assert_eq!(completed, "haiku");
    assert_eq!(orchestrator.history("haiku").len(), 2);

    // Cancel the stalled task so the runtime can wind down
    orchestrator.shutdown();
    orchestrator.wait_idle().await;
}

/// Clearing a conversation cancels its in-flight stream and discards
/// partial output
#[tokio::test]
async fn clear_cancels_in_flight_stream() {
    let (mut orchestrator, mut receiver, _, _) =
        build(Script::Stall, Script::Reply(vec![]));
    orchestrator.select("gpt-4").unwrap();

    orchestrator.submit("will be cancelled", None, 4096);

    // Wait for the first (and only) fragment to prove the stream is live
    let first = timeout(Duration::from_secs(2), receiver.recv())
        .await
        .expect("no fragment arrived")
        .expect("event channel closed");
    assert!(matches!(first, ChatEvent::Fragment { .. }));

    orchestrator.clear("gpt-4");
    orchestrator.wait_idle().await;

    // No partial assistant turn, no terminal event for the cancelled request
    assert!(orchestrator.history("gpt-4").is_empty());
    let events = drain(&mut receiver);
    assert!(events.iter().all(|e| !e.is_terminal()));
}

/// clear_all empties every model and zeroes reported counts
#[tokio::test]
async fn clear_all_resets_every_model() {
    let (mut orchestrator, _receiver, _, _) =
        build(Script::Reply(vec!["x"]), Script::Reply(vec!["y"]));
    orchestrator.select("gpt-4").unwrap();
    orchestrator.select("haiku").unwrap();

    orchestrator.submit("fill", None, 4096);
    orchestrator.wait_idle().await;

    orchestrator.clear_all();

    let base = polychat::context::REQUEST_OVERHEAD_TOKENS;
    for (_, count) in orchestrator.token_counts() {
        assert_eq!(count, base);
    }
    assert!(orchestrator.history("gpt-4").is_empty());
    assert!(orchestrator.history("haiku").is_empty());
}

/// Events of one submit cycle share the returned request id
#[tokio::test]
async fn events_carry_the_submit_request_id() {
    let (mut orchestrator, mut receiver, _, _) =
        build(Script::Reply(vec!["z"]), Script::Reply(vec![]));
    orchestrator.select("gpt-4").unwrap();

    let request_id = orchestrator.submit("tagged", None, 4096);
    orchestrator.wait_idle().await;

    let events = drain(&mut receiver);
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e.request_id() == request_id));
}

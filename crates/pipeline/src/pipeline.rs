//! The conversation pipeline — one user message in, one structured output
//! out.
//!
//! The cycle is linear: resolve the session, let hooks reshape the inbound
//! message, bound its length (overflow goes to ingestion), recall memories,
//! run the agent, persist the exchange, assemble and hook the output,
//! update history. The only terminal branch is a recall failure, which
//! short-circuits into an error-typed output without touching the agent.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use mindloop_core::agent::{AgentReply, ReasoningAgent, extract_unparsable_output};
use mindloop_core::error::{Error, MemoryError};
use mindloop_core::hook::{HookPayload, HookPoint, HookRegistry};
use mindloop_core::ingest::DocumentStore;
use mindloop_core::message::{FinalOutput, UserMessage, Who, Why};
use mindloop_core::vector::{Tier, VectorStore};
use mindloop_memory::{RecallEngine, RecallError, WorkingMemoryStore};

/// Longest message text the agent and recall stages will ever see, in
/// characters. Anything beyond this is cut at a whitespace boundary and
/// routed to declarative memory via ingestion.
pub const MAX_TEXT_INPUT: usize = 500;

/// Split `text` at the last whitespace at or before `max_chars`.
///
/// Returns the bounded head and, when the text was oversized, the overflow
/// tail (starting at the boundary). Falls back to a hard cut at `max_chars`
/// when the head contains no usable whitespace.
pub fn split_oversize(text: &str, max_chars: usize) -> (String, Option<String>) {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    if chars.len() <= max_chars {
        return (text.to_string(), None);
    }

    let cut = (1..=max_chars)
        .rev()
        .find(|&pos| chars[pos].1.is_whitespace())
        .unwrap_or(max_chars);

    let byte_cut = chars[cut].0;
    (text[..byte_cut].to_string(), Some(text[byte_cut..].to_string()))
}

/// The top-level request handler.
pub struct ConversationPipeline {
    sessions: Arc<WorkingMemoryStore>,
    recall: RecallEngine,
    agent: Arc<dyn ReasoningAgent>,
    hooks: Arc<dyn HookRegistry>,
    vectors: Arc<dyn VectorStore>,
    ingestion: Arc<dyn DocumentStore>,
}

impl ConversationPipeline {
    pub fn new(
        sessions: Arc<WorkingMemoryStore>,
        recall: RecallEngine,
        agent: Arc<dyn ReasoningAgent>,
        hooks: Arc<dyn HookRegistry>,
        vectors: Arc<dyn VectorStore>,
        ingestion: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            sessions,
            recall,
            agent,
            hooks,
            vectors,
            ingestion,
        }
    }

    /// Run one full request cycle for `message`.
    ///
    /// Holds the user's session lock for the whole cycle, so requests for
    /// the same user serialize; distinct users run concurrently.
    pub async fn handle(&self, message: UserMessage) -> Result<FinalOutput, Error> {
        let user_id = message.user_id.clone();
        info!(user_id = %user_id, "handling user message");

        let session = self.sessions.get_or_create(&user_id).await;
        let mut memory = session.lock().await;
        memory.begin_request(message);

        // Inbound hook: plugins may rewrite the message or inject metadata.
        let inbound = memory
            .current_message
            .clone()
            .unwrap_or_else(|| UserMessage::for_user(&user_id, ""));
        let payload = self
            .hooks
            .execute(
                HookPoint::BeforeReadsMessage,
                HookPayload::Message(inbound),
                &mut memory,
            )
            .await?;
        let mut message = payload.into_message(HookPoint::BeforeReadsMessage)?;

        // Bound the working text; overflow is preserved in long-term memory.
        let (head, overflow) = split_oversize(&message.text, MAX_TEXT_INPUT);
        message.text = head;
        memory.current_message = Some(message.clone());
        if let Some(rest) = overflow {
            debug!(
                user_id = %user_id,
                overflow_chars = rest.chars().count(),
                "routing oversized input to ingestion"
            );
            self.ingestion.ingest(&rest, "text/plain", "").await?;
        }

        // Recall. A memory failure ends the request with an actionable
        // error output; the agent is never consulted.
        if let Err(err) = self.recall.recall(&mut memory).await {
            return match err {
                RecallError::Hook(hook_err) => Err(hook_err.into()),
                RecallError::Memory(mem_err) => {
                    warn!(user_id = %user_id, error = %mem_err, "memory recall failed");
                    Ok(FinalOutput::vector_memory_error())
                }
            };
        }

        // Agent execution. A structured-output parse failure degrades to the
        // raw model text; anything else is fatal for the request.
        let reply = match self.agent.run(&memory).await {
            Ok(reply) => reply,
            Err(err) => {
                let description = err.to_string();
                match extract_unparsable_output(&description) {
                    Some(raw) => {
                        warn!(user_id = %user_id, "agent output unparsable, using raw text");
                        AgentReply::from_raw_output(message.text.clone(), raw)
                    }
                    None => return Err(err.into()),
                }
            }
        };

        // The exchange lands in episodic memory even when the agent
        // degraded above.
        self.store_episodic(&user_id, &message.text).await?;

        let output = FinalOutput::Chat {
            user_id: user_id.clone(),
            content: reply.output,
            why: Why {
                input: reply.input,
                intermediate_steps: reply.intermediate_steps,
                memory: memory.citations(),
            },
        };

        // Outbound hook: last chance to reshape what the client sees.
        let payload = self
            .hooks
            .execute(
                HookPoint::BeforeSendsMessage,
                HookPayload::Output(output),
                &mut memory,
            )
            .await?;
        let output = payload.into_output(HookPoint::BeforeSendsMessage)?;

        // History order is fixed: the Human turn, then the AI turn.
        memory.push_turn(Who::Human, &message.text, None);
        let why = match &output {
            FinalOutput::Chat { why, .. } => Some(why.clone()),
            FinalOutput::Error { .. } => None,
        };
        memory.push_turn(Who::Ai, output.history_text(), why);

        Ok(output)
    }

    async fn store_episodic(&self, user_id: &str, text: &str) -> Result<(), Error> {
        let mut metadata = Map::new();
        metadata.insert("source".into(), Value::String(user_id.into()));
        metadata.insert("when".into(), Value::String(Utc::now().to_rfc3339()));
        self.vectors
            .upsert(Tier::Episodic.collection(), vec![text.to_string()], vec![metadata])
            .await
            .map_err(|e| Error::Memory(MemoryError::Storage(e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mindloop_config::RecallSettings;
    use mindloop_core::error::{AgentError, IngestError, ProviderError};
    use mindloop_core::hook::{LocalHookRegistry, NoopHooks};
    use mindloop_core::provider::Embedder;
    use mindloop_core::session::WorkingMemory;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ConstEmbedder {
        dimension: usize,
    }

    #[async_trait]
    impl Embedder for ConstEmbedder {
        fn name(&self) -> &str {
            "const"
        }
        fn dimension(&self) -> usize {
            self.dimension
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            let mut v = vec![0.0; self.dimension];
            v[0] = 1.0;
            Ok(v)
        }
    }

    #[derive(Default)]
    struct RecordingIngestor {
        documents: Mutex<Vec<(String, String, String)>>,
    }

    #[async_trait]
    impl DocumentStore for RecordingIngestor {
        async fn ingest(
            &self,
            text: &str,
            content_type: &str,
            source: &str,
        ) -> Result<(), IngestError> {
            self.documents
                .lock()
                .unwrap()
                .push((text.into(), content_type.into(), source.into()));
            Ok(())
        }
    }

    struct ScriptedAgent {
        output: &'static str,
        runs: AtomicUsize,
    }

    impl ScriptedAgent {
        fn new(output: &'static str) -> Self {
            Self {
                output,
                runs: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl ReasoningAgent for ScriptedAgent {
        async fn run(&self, memory: &WorkingMemory) -> Result<AgentReply, AgentError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(AgentReply {
                input: memory.current_text().unwrap_or_default().to_string(),
                intermediate_steps: vec![],
                output: self.output.to_string(),
            })
        }
    }

    struct FailingAgent {
        error: fn() -> AgentError,
    }

    #[async_trait]
    impl ReasoningAgent for FailingAgent {
        async fn run(&self, _memory: &WorkingMemory) -> Result<AgentReply, AgentError> {
            Err((self.error)())
        }
    }

    struct Fixture {
        pipeline: ConversationPipeline,
        sessions: Arc<WorkingMemoryStore>,
        vectors: Arc<mindloop_memory::InMemoryVectorStore>,
        ingestor: Arc<RecordingIngestor>,
    }

    fn fixture_with(
        agent: Arc<dyn ReasoningAgent>,
        hooks: Arc<dyn HookRegistry>,
        embedder_dimension: usize,
    ) -> Fixture {
        let embedder = Arc::new(ConstEmbedder {
            dimension: embedder_dimension,
        });
        let vectors = Arc::new(mindloop_memory::InMemoryVectorStore::new(embedder.clone()));
        let sessions = Arc::new(WorkingMemoryStore::new());
        let ingestor = Arc::new(RecordingIngestor::default());
        let recall = RecallEngine::new(
            embedder,
            vectors.clone(),
            hooks.clone(),
            RecallSettings::default(),
        );
        let pipeline = ConversationPipeline::new(
            sessions.clone(),
            recall,
            agent,
            hooks,
            vectors.clone(),
            ingestor.clone(),
        );
        Fixture {
            pipeline,
            sessions,
            vectors,
            ingestor,
        }
    }

    fn fixture(agent: Arc<dyn ReasoningAgent>) -> Fixture {
        fixture_with(agent, Arc::new(NoopHooks), 2)
    }

    // ── Segmentation ──

    #[test]
    fn short_text_is_untouched() {
        let text = "a".repeat(500);
        let (head, overflow) = split_oversize(&text, 500);
        assert_eq!(head.chars().count(), 500);
        assert!(overflow.is_none());
    }

    #[test]
    fn oversize_cuts_at_last_whitespace_before_limit() {
        // 650 chars with the only whitespace at index 480.
        let mut text = "a".repeat(480);
        text.push(' ');
        text.push_str(&"b".repeat(169));
        assert_eq!(text.chars().count(), 650);

        let (head, overflow) = split_oversize(&text, 500);
        assert_eq!(head.chars().count(), 480);
        assert!(head.chars().all(|c| c == 'a'));
        let rest = overflow.unwrap();
        assert_eq!(rest.chars().count(), 170);
        assert!(rest.starts_with(' '));
    }

    #[test]
    fn oversize_without_whitespace_hard_cuts_at_limit() {
        let text = "x".repeat(650);
        let (head, overflow) = split_oversize(&text, 500);
        assert_eq!(head.chars().count(), 500);
        assert_eq!(overflow.unwrap().chars().count(), 150);
    }

    #[test]
    fn whitespace_only_at_position_zero_falls_back_to_hard_cut() {
        let mut text = " ".to_string();
        text.push_str(&"y".repeat(649));
        let (head, _) = split_oversize(&text, 500);
        assert_eq!(head.chars().count(), 500);
    }

    // ── Happy path ──

    #[tokio::test]
    async fn handle_returns_chat_output_and_appends_history_in_order() {
        let agent = Arc::new(ScriptedAgent::new("hello there"));
        let f = fixture(agent.clone());

        let output = f
            .pipeline
            .handle(UserMessage::for_user("alice", "hi"))
            .await
            .unwrap();

        match &output {
            FinalOutput::Chat { user_id, content, why } => {
                assert_eq!(user_id, "alice");
                assert_eq!(content, "hello there");
                assert_eq!(why.input, "hi");
            }
            other => panic!("expected chat output, got {other:?}"),
        }

        let session = f.sessions.get_or_create("alice").await;
        let memory = session.lock().await;
        let turns = &memory.history;
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].who, Who::Human);
        assert_eq!(turns[0].message, "hi");
        assert_eq!(turns[1].who, Who::Ai);
        assert_eq!(turns[1].message, "hello there");
        assert!(turns[1].why.is_some());
        assert_eq!(agent.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn handle_persists_user_message_to_episodic_memory() {
        let f = fixture(Arc::new(ScriptedAgent::new("ok")));

        f.pipeline
            .handle(UserMessage::for_user("alice", "remember this"))
            .await
            .unwrap();

        let points = f.vectors.list_all(Tier::Episodic.collection()).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].page_content, "remember this");
        assert_eq!(points[0].metadata["source"], "alice");
        assert!(points[0].metadata.get("when").is_some());
    }

    #[tokio::test]
    async fn second_request_recalls_the_first_exchange() {
        let f = fixture(Arc::new(ScriptedAgent::new("ok")));

        f.pipeline
            .handle(UserMessage::for_user("alice", "my cat is called Momo"))
            .await
            .unwrap();
        let output = f
            .pipeline
            .handle(UserMessage::for_user("alice", "what is my cat called?"))
            .await
            .unwrap();

        let FinalOutput::Chat { why, .. } = output else {
            panic!("expected chat output");
        };
        assert_eq!(why.memory.episodic.len(), 1);
        assert_eq!(why.memory.episodic[0].page_content, "my cat is called Momo");
        assert!(!why.memory.episodic[0].id.is_empty());
        assert!(why.memory.episodic[0].score > 0.7);
    }

    // ── Oversize routing ──

    #[tokio::test]
    async fn oversized_message_is_truncated_and_overflow_ingested() {
        let f = fixture(Arc::new(ScriptedAgent::new("ok")));
        let mut text = "a".repeat(480);
        text.push(' ');
        text.push_str(&"b".repeat(169));

        f.pipeline
            .handle(UserMessage::for_user("alice", text))
            .await
            .unwrap();

        let documents = f.ingestor.documents.lock().unwrap();
        assert_eq!(documents.len(), 1);
        let (ingested, content_type, source) = &documents[0];
        assert_eq!(ingested.chars().count(), 170);
        assert_eq!(content_type, "text/plain");
        assert_eq!(source, "");
        drop(documents);

        // Both episodic memory and history hold the bounded text.
        let points = f.vectors.list_all(Tier::Episodic.collection()).await.unwrap();
        assert_eq!(points[0].page_content.chars().count(), 480);
        let session = f.sessions.get_or_create("alice").await;
        let memory = session.lock().await;
        assert_eq!(memory.history[0].message.chars().count(), 480);
    }

    // ── Recall failure ──

    #[tokio::test]
    async fn recall_failure_returns_error_output_without_running_agent() {
        let agent = Arc::new(ScriptedAgent::new("never"));
        let f = fixture(agent.clone());

        // Poison the store: a record embedded with a different dimension.
        let alien = Arc::new(mindloop_memory::InMemoryVectorStore::new(Arc::new(
            ConstEmbedder { dimension: 3 },
        )));
        let mut meta = Map::new();
        meta.insert("source".into(), Value::String("alice".into()));
        alien
            .upsert(Tier::Episodic.collection(), vec!["old".into()], vec![meta])
            .await
            .unwrap();
        // Rebuild the pipeline against the poisoned store.
        let embedder = Arc::new(ConstEmbedder { dimension: 2 });
        let recall = RecallEngine::new(
            embedder,
            alien.clone(),
            Arc::new(NoopHooks),
            RecallSettings::default(),
        );
        let pipeline = ConversationPipeline::new(
            f.sessions.clone(),
            recall,
            agent.clone(),
            Arc::new(NoopHooks),
            alien,
            f.ingestor.clone(),
        );

        let output = pipeline
            .handle(UserMessage::for_user("alice", "hello"))
            .await
            .unwrap();

        match output {
            FinalOutput::Error { name, description } => {
                assert_eq!(name, "VectorMemoryError");
                assert!(description.contains("embedder"));
            }
            other => panic!("expected error output, got {other:?}"),
        }
        assert_eq!(agent.runs.load(Ordering::SeqCst), 0);

        // Terminal path: no history was appended.
        let session = f.sessions.get_or_create("alice").await;
        assert!(session.lock().await.history.is_empty());
    }

    // ── Agent failures ──

    #[tokio::test]
    async fn parse_failure_degrades_to_raw_model_output() {
        let agent = Arc::new(FailingAgent {
            error: || AgentError::OutputParse {
                raw: "hello world".into(),
            },
        });
        let f = fixture(agent);

        let output = f
            .pipeline
            .handle(UserMessage::for_user("alice", "hi"))
            .await
            .unwrap();

        let FinalOutput::Chat { content, why, .. } = output else {
            panic!("expected chat output");
        };
        assert_eq!(content, "hello world");
        assert!(why.intermediate_steps.is_empty());
        assert_eq!(why.input, "hi");

        // The exchange is still persisted and history still updated.
        let points = f.vectors.list_all(Tier::Episodic.collection()).await.unwrap();
        assert_eq!(points.len(), 1);
        let session = f.sessions.get_or_create("alice").await;
        assert_eq!(session.lock().await.history.len(), 2);
    }

    #[tokio::test]
    async fn other_agent_failures_are_fatal() {
        let agent = Arc::new(FailingAgent {
            error: || AgentError::Execution("tool loop exceeded".into()),
        });
        let f = fixture(agent);

        let err = f
            .pipeline
            .handle(UserMessage::for_user("alice", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Agent(_)));

        // Fatal before persistence: nothing stored, no history.
        let points = f.vectors.list_all(Tier::Episodic.collection()).await.unwrap();
        assert!(points.is_empty());
    }

    // ── Hooks ──

    #[tokio::test]
    async fn before_reads_message_hook_rewrites_the_input() {
        let mut hooks = LocalHookRegistry::new();
        hooks.register(
            HookPoint::BeforeReadsMessage,
            "shout",
            0,
            |payload, _wm| {
                let mut message = payload.into_message(HookPoint::BeforeReadsMessage)?;
                message.text = message.text.to_uppercase();
                Ok(HookPayload::Message(message))
            },
        );
        let f = fixture_with(Arc::new(ScriptedAgent::new("ok")), Arc::new(hooks), 2);

        f.pipeline
            .handle(UserMessage::for_user("alice", "quiet words"))
            .await
            .unwrap();

        let points = f.vectors.list_all(Tier::Episodic.collection()).await.unwrap();
        assert_eq!(points[0].page_content, "QUIET WORDS");
    }

    #[tokio::test]
    async fn before_sends_message_hook_shapes_the_final_output() {
        let mut hooks = LocalHookRegistry::new();
        hooks.register(
            HookPoint::BeforeSendsMessage,
            "sign-off",
            0,
            |payload, _wm| {
                let output = payload.into_output(HookPoint::BeforeSendsMessage)?;
                let transformed = match output {
                    FinalOutput::Chat { user_id, content, why } => FinalOutput::Chat {
                        user_id,
                        content: format!("{content} — mindloop"),
                        why,
                    },
                    other => other,
                };
                Ok(HookPayload::Output(transformed))
            },
        );
        let f = fixture_with(Arc::new(ScriptedAgent::new("bye")), Arc::new(hooks), 2);

        let output = f
            .pipeline
            .handle(UserMessage::for_user("alice", "later"))
            .await
            .unwrap();

        let FinalOutput::Chat { content, .. } = &output else {
            panic!("expected chat output");
        };
        assert_eq!(content, "bye — mindloop");

        // History records what was actually sent.
        let session = f.sessions.get_or_create("alice").await;
        assert_eq!(session.lock().await.history[1].message, "bye — mindloop");
    }

    #[tokio::test]
    async fn hook_failure_terminates_the_request() {
        let mut hooks = LocalHookRegistry::new();
        hooks.register(
            HookPoint::BeforeReadsMessage,
            "broken",
            0,
            |_payload, _wm| {
                Err(mindloop_core::error::HookError::HandlerFailed {
                    point: HookPoint::BeforeReadsMessage,
                    handler: "broken".into(),
                    reason: "bad plugin".into(),
                })
            },
        );
        let f = fixture_with(Arc::new(ScriptedAgent::new("ok")), Arc::new(hooks), 2);

        let err = f
            .pipeline
            .handle(UserMessage::for_user("alice", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Hook(_)));
    }
}

//! Runtime bootstrap — the process-scoped component graph.
//!
//! Built once at startup and passed explicitly to whatever serves requests;
//! there is no global singleton. Construction follows dependency order:
//! session store, recall engine, tool synchronizer, pipeline. Bootstrap
//! hooks run around the whole sequence, and the initial tool sync happens
//! before the runtime is handed out, so the procedural tier is queryable
//! from the first request.

use std::sync::Arc;
use tracing::info;

use mindloop_config::AppConfig;
use mindloop_core::agent::ReasoningAgent;
use mindloop_core::error::{Error, ProviderError};
use mindloop_core::hook::{HookPayload, HookPoint, HookRegistry, NoopHooks};
use mindloop_core::ingest::DocumentStore;
use mindloop_core::message::{FinalOutput, UserMessage};
use mindloop_core::provider::{Embedder, TextModel};
use mindloop_core::session::WorkingMemory;
use mindloop_core::tool::ToolRegistry;
use mindloop_core::vector::VectorStore;
use mindloop_memory::{RecallEngine, SyncReport, ToolIndexSynchronizer, WorkingMemoryStore};

use crate::notify::{NotificationChannel, QueueTokenSink};
use crate::pipeline::ConversationPipeline;

/// The assembled component graph.
pub struct Runtime {
    config: AppConfig,
    hooks: Arc<dyn HookRegistry>,
    model: Arc<dyn TextModel>,
    tools: Arc<ToolRegistry>,
    sessions: Arc<WorkingMemoryStore>,
    tool_sync: ToolIndexSynchronizer,
    pipeline: ConversationPipeline,
    notifications: NotificationChannel,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime").finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// Handle one user message through the conversation pipeline.
    pub async fn handle(&self, message: UserMessage) -> Result<FinalOutput, Error> {
        self.pipeline.handle(message).await
    }

    /// Re-reconcile the tool index. Wire this to the hook registry's
    /// plugins-changed signal; it is also safe to call ad hoc.
    pub async fn plugins_synced(&self) -> Result<SyncReport, Error> {
        let report = self.tool_sync.sync(&self.tools).await?;
        info!(
            added = report.added,
            deleted = report.deleted,
            "tool index re-synced after plugin change"
        );
        Ok(report)
    }

    /// Generate text with the configured model, optionally streaming tokens
    /// to `session`'s notification queue as they are produced.
    pub async fn generate(
        &self,
        prompt: &str,
        stream_to: Option<&WorkingMemory>,
    ) -> Result<String, ProviderError> {
        match stream_to {
            Some(memory) => {
                let sink = QueueTokenSink::for_session(memory);
                self.model.generate(prompt, Some(&sink)).await
            }
            None => self.model.generate(prompt, None).await,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<WorkingMemoryStore> {
        &self.sessions
    }

    pub fn notifications(&self) -> &NotificationChannel {
        &self.notifications
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn hooks(&self) -> &Arc<dyn HookRegistry> {
        &self.hooks
    }

    /// Tear the graph down. Provider and store handles are released on
    /// drop; this exists to make shutdown explicit and observable.
    pub fn shutdown(self) {
        info!("mindloop runtime shutting down");
        drop(self);
    }
}

/// Collects collaborators, then assembles and bootstraps the graph.
#[derive(Default)]
pub struct RuntimeBuilder {
    config: Option<AppConfig>,
    hooks: Option<Arc<dyn HookRegistry>>,
    model: Option<Arc<dyn TextModel>>,
    embedder: Option<Arc<dyn Embedder>>,
    vectors: Option<Arc<dyn VectorStore>>,
    ingestion: Option<Arc<dyn DocumentStore>>,
    agent: Option<Arc<dyn ReasoningAgent>>,
    tools: Option<ToolRegistry>,
}

impl RuntimeBuilder {
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn hooks(mut self, hooks: Arc<dyn HookRegistry>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn model(mut self, model: Arc<dyn TextModel>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn embedder(mut self, embedder: Arc<dyn Embedder>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn vectors(mut self, vectors: Arc<dyn VectorStore>) -> Self {
        self.vectors = Some(vectors);
        self
    }

    pub fn ingestion(mut self, ingestion: Arc<dyn DocumentStore>) -> Self {
        self.ingestion = Some(ingestion);
        self
    }

    pub fn agent(mut self, agent: Arc<dyn ReasoningAgent>) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Assemble the graph and run the bootstrap sequence.
    pub async fn bootstrap(self) -> Result<Runtime, Error> {
        let config = self.config.unwrap_or_default();
        let hooks = self.hooks.unwrap_or_else(|| Arc::new(NoopHooks));
        let model = self.model.ok_or_else(|| missing("model"))?;
        let embedder = self.embedder.ok_or_else(|| missing("embedder"))?;
        let vectors = self.vectors.ok_or_else(|| missing("vectors"))?;
        let ingestion = self.ingestion.ok_or_else(|| missing("ingestion"))?;
        let agent = self.agent.ok_or_else(|| missing("agent"))?;
        let tools = Arc::new(self.tools.unwrap_or_default());

        // The session store exists first: bootstrap hooks run against the
        // shared default session.
        let sessions = Arc::new(WorkingMemoryStore::new());
        {
            let session = sessions.get_or_create_default().await;
            let mut memory = session.lock().await;
            hooks
                .execute(HookPoint::BeforeBootstrap, HookPayload::None, &mut memory)
                .await?;
        }

        let recall = RecallEngine::new(
            embedder.clone(),
            vectors.clone(),
            hooks.clone(),
            config.recall.clone(),
        );
        let tool_sync = ToolIndexSynchronizer::new(vectors.clone());
        let pipeline = ConversationPipeline::new(
            sessions.clone(),
            recall,
            agent,
            hooks.clone(),
            vectors.clone(),
            ingestion,
        );
        let notifications = NotificationChannel::new(sessions.clone());

        // Tools become queryable before the first request arrives.
        let report = tool_sync.sync(&tools).await?;
        info!(
            tools = tools.len(),
            added = report.added,
            deleted = report.deleted,
            "initial tool sync complete"
        );

        {
            let session = sessions.get_or_create_default().await;
            let mut memory = session.lock().await;
            hooks
                .execute(HookPoint::AfterBootstrap, HookPayload::None, &mut memory)
                .await?;
        }

        info!(model = model.name(), embedder = embedder.name(), "mindloop runtime ready");
        Ok(Runtime {
            config,
            hooks,
            model,
            tools,
            sessions,
            tool_sync,
            pipeline,
            notifications,
        })
    }
}

fn missing(component: &str) -> Error {
    Error::Config {
        message: format!("runtime builder is missing the {component} component"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mindloop_core::agent::AgentReply;
    use mindloop_core::error::{AgentError, IngestError};
    use mindloop_core::hook::LocalHookRegistry;
    use mindloop_core::tool::Tool;
    use mindloop_core::vector::Tier;
    use mindloop_memory::InMemoryVectorStore;

    struct StubModel;

    #[async_trait]
    impl TextModel for StubModel {
        fn name(&self) -> &str {
            "stub"
        }
        async fn generate(
            &self,
            prompt: &str,
            tokens: Option<&dyn mindloop_core::provider::TokenSink>,
        ) -> Result<String, ProviderError> {
            if let Some(sink) = tokens {
                for word in prompt.split_whitespace() {
                    sink.on_token(word);
                }
            }
            Ok(format!("stub: {prompt}"))
        }
    }

    struct StubEmbedder;

    #[async_trait]
    impl Embedder for StubEmbedder {
        fn name(&self) -> &str {
            "stub"
        }
        fn dimension(&self) -> usize {
            2
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct StubIngestor;

    #[async_trait]
    impl DocumentStore for StubIngestor {
        async fn ingest(&self, _: &str, _: &str, _: &str) -> Result<(), IngestError> {
            Ok(())
        }
    }

    struct StubAgent;

    #[async_trait]
    impl ReasoningAgent for StubAgent {
        async fn run(&self, memory: &WorkingMemory) -> Result<AgentReply, AgentError> {
            Ok(AgentReply {
                input: memory.current_text().unwrap_or_default().into(),
                intermediate_steps: vec![],
                output: "ack".into(),
            })
        }
    }

    struct NamedTool(&'static str, &'static str);

    #[async_trait]
    impl Tool for NamedTool {
        fn name(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            self.1
        }
        async fn execute(
            &self,
            _input: &str,
        ) -> Result<String, mindloop_core::error::ToolError> {
            Ok(String::new())
        }
    }

    fn builder_with(vectors: Arc<InMemoryVectorStore>) -> RuntimeBuilder {
        Runtime::builder()
            .model(Arc::new(StubModel))
            .embedder(Arc::new(StubEmbedder))
            .vectors(vectors)
            .ingestion(Arc::new(StubIngestor))
            .agent(Arc::new(StubAgent))
    }

    fn two_tools() -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(Arc::new(NamedTool("clock", "Tells the time")));
        tools.register(Arc::new(NamedTool("dice", "Rolls a die")));
        tools
    }

    #[tokio::test]
    async fn bootstrap_syncs_tools_once_and_resync_is_idempotent() {
        let vectors = Arc::new(InMemoryVectorStore::new(Arc::new(StubEmbedder)));
        let runtime = builder_with(vectors.clone())
            .tools(two_tools())
            .bootstrap()
            .await
            .unwrap();

        let points = vectors.list_all(Tier::Procedural.collection()).await.unwrap();
        assert_eq!(points.len(), 2);

        let report = runtime.plugins_synced().await.unwrap();
        assert_eq!(report, SyncReport { added: 0, deleted: 0 });
        let points = vectors.list_all(Tier::Procedural.collection()).await.unwrap();
        assert_eq!(points.len(), 2);
    }

    #[tokio::test]
    async fn bootstrap_hooks_run_in_order_around_construction() {
        let mut hooks = LocalHookRegistry::new();
        hooks.register(HookPoint::BeforeBootstrap, "mark", 0, |payload, wm| {
            wm.extras.insert("order".into(), serde_json::json!(["before"]));
            Ok(payload)
        });
        hooks.register(HookPoint::AfterBootstrap, "mark", 0, |payload, wm| {
            let order = wm
                .extras
                .get_mut("order")
                .and_then(|v| v.as_array_mut())
                .expect("before_bootstrap ran first");
            order.push(serde_json::json!("after"));
            Ok(payload)
        });

        let vectors = Arc::new(InMemoryVectorStore::new(Arc::new(StubEmbedder)));
        let runtime = builder_with(vectors)
            .hooks(Arc::new(hooks))
            .bootstrap()
            .await
            .unwrap();

        let session = runtime.sessions().get_or_create_default().await;
        let memory = session.lock().await;
        assert_eq!(
            memory.extras["order"],
            serde_json::json!(["before", "after"])
        );
    }

    #[tokio::test]
    async fn missing_component_fails_bootstrap() {
        let err = Runtime::builder()
            .model(Arc::new(StubModel))
            .bootstrap()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn handle_round_trips_through_the_graph() {
        let vectors = Arc::new(InMemoryVectorStore::new(Arc::new(StubEmbedder)));
        let runtime = builder_with(vectors).bootstrap().await.unwrap();

        let output = runtime
            .handle(UserMessage::for_user("alice", "ping"))
            .await
            .unwrap();
        match output {
            FinalOutput::Chat { content, .. } => assert_eq!(content, "ack"),
            other => panic!("unexpected output: {other:?}"),
        }
    }

    #[tokio::test]
    async fn generate_streams_tokens_to_the_session_queue() {
        let vectors = Arc::new(InMemoryVectorStore::new(Arc::new(StubEmbedder)));
        let runtime = builder_with(vectors).bootstrap().await.unwrap();

        let session = runtime.sessions().get_or_create("alice").await;
        let mut memory = session.lock().await;
        let mut inbox = memory.take_inbox().unwrap();

        let text = runtime.generate("two words", Some(&memory)).await.unwrap();
        assert_eq!(text, "stub: two words");

        for expected in ["two", "words"] {
            match inbox.recv().await.unwrap() {
                mindloop_core::notify::Notification::ChatToken { content } => {
                    assert_eq!(content, expected)
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
    }
}

//! Provider traits — the abstraction over language and embedding models.
//!
//! A [`TextModel`] turns a prompt into text, optionally pushing tokens to a
//! [`TokenSink`] as they are produced. An [`Embedder`] turns text into a
//! fixed-size vector. Concrete backends (OpenAI-compatible, Anthropic, local
//! inference, ...) live outside this crate; the pipeline only sees these
//! traits.

use async_trait::async_trait;

use crate::error::ProviderError;

/// Receives incremental tokens during streamed generation.
///
/// Delivery is fire-and-forget: a sink must not block, and generation does
/// not depend on the sink keeping up.
pub trait TokenSink: Send + Sync {
    fn on_token(&self, token: &str);
}

/// A text-generation model.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// A human-readable backend name (e.g. "openai", "offline").
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`. When `tokens` is given, the
    /// implementation should additionally push incremental output to it.
    async fn generate(
        &self,
        prompt: &str,
        tokens: Option<&dyn TokenSink>,
    ) -> std::result::Result<String, ProviderError>;
}

/// An embedding model. One text in, one fixed-size vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// A human-readable backend name.
    fn name(&self) -> &str;

    /// The dimensionality of vectors this embedder produces.
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Fixed;

    #[async_trait]
    impl Embedder for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn dimension(&self) -> usize {
            3
        }
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    struct Parrot;

    #[async_trait]
    impl TextModel for Parrot {
        fn name(&self) -> &str {
            "parrot"
        }
        async fn generate(
            &self,
            prompt: &str,
            tokens: Option<&dyn TokenSink>,
        ) -> Result<String, ProviderError> {
            if let Some(sink) = tokens {
                for word in prompt.split_whitespace() {
                    sink.on_token(word);
                }
            }
            Ok(prompt.to_string())
        }
    }

    struct Collector(Mutex<Vec<String>>);

    impl TokenSink for Collector {
        fn on_token(&self, token: &str) {
            self.0.lock().unwrap().push(token.to_string());
        }
    }

    #[tokio::test]
    async fn embedder_produces_declared_dimension() {
        let embedder = Fixed;
        let vector = embedder.embed("anything").await.unwrap();
        assert_eq!(vector.len(), embedder.dimension());
    }

    #[tokio::test]
    async fn model_streams_through_sink() {
        let sink = Collector(Mutex::new(Vec::new()));
        let out = Parrot.generate("one two three", Some(&sink)).await.unwrap();
        assert_eq!(out, "one two three");
        assert_eq!(*sink.0.lock().unwrap(), vec!["one", "two", "three"]);
    }
}

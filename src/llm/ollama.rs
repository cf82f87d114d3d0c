//! Ollama-backed embedding and generation providers.
//!
//! Both adapters talk to a local Ollama server through `rig`. The generation
//! adapter renders the conversation into a preamble (system instructions)
//! plus a single prompt, which keeps the request shape identical for the
//! plain, streamed, and classification paths.

use async_trait::async_trait;
use futures_util::StreamExt;
use rig::agent::MultiTurnStreamItem;
use rig::client::{CompletionClient, EmbeddingsClient, Nothing};
use rig::completion::CompletionModel;
use rig::message::{AssistantContent, Text};
use rig::providers::ollama;
use rig::streaming::{StreamedAssistantContent, StreamingPrompt};

use super::{EmbeddingProvider, GenerationProvider, TokenStream};
use crate::message::Message;
use crate::types::KnowledgeError;

/// Embedding provider backed by an Ollama embedding model.
#[derive(Clone)]
pub struct OllamaEmbedding {
    model: ollama::EmbeddingModel,
    dimensions: usize,
}

impl OllamaEmbedding {
    pub fn new(model_name: &str, dimensions: usize) -> Result<Self, KnowledgeError> {
        let client = ollama::Client::new(Nothing)
            .map_err(|err| KnowledgeError::Embedding(err.to_string()))?;
        Ok(Self {
            model: client.embedding_model_with_ndims(model_name, dimensions),
            dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedding {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, KnowledgeError> {
        use rig::embeddings::EmbeddingModel as _;

        let embeddings = self
            .model
            .embed_texts(texts.to_vec())
            .await
            .map_err(|err| KnowledgeError::Embedding(err.to_string()))?;

        Ok(embeddings
            .into_iter()
            .map(|embedding| embedding.vec.into_iter().map(|v| v as f32).collect())
            .collect())
    }
}

/// Generation provider backed by an Ollama chat model.
#[derive(Clone)]
pub struct OllamaGeneration {
    client: ollama::Client,
    model_name: String,
    temperature: f64,
}

impl OllamaGeneration {
    pub fn new(model_name: &str, temperature: f64) -> Result<Self, KnowledgeError> {
        let client = ollama::Client::new(Nothing)
            .map_err(|err| KnowledgeError::Generation(err.to_string()))?;
        Ok(Self {
            client,
            model_name: model_name.to_string(),
            temperature,
        })
    }

    async fn complete(&self, preamble: &str, prompt: String) -> Result<String, KnowledgeError> {
        let model = self.client.completion_model(&self.model_name);

        let mut builder = model
            .completion_request(rig::completion::Message::user(prompt))
            .temperature(self.temperature);
        if !preamble.is_empty() {
            builder = builder.preamble(preamble.to_string());
        }
        let request = builder.build();

        let response = model
            .completion(request)
            .await
            .map_err(|err| KnowledgeError::Generation(err.to_string()))?;

        Ok(flatten_choice(response.choice))
    }
}

#[async_trait]
impl GenerationProvider for OllamaGeneration {
    async fn generate(&self, messages: &[Message]) -> Result<String, KnowledgeError> {
        let (preamble, prompt) = render_conversation(messages);
        self.complete(&preamble, prompt).await
    }

    async fn generate_stream(&self, messages: &[Message]) -> Result<TokenStream, KnowledgeError> {
        let (preamble, prompt) = render_conversation(messages);

        let mut builder = self
            .client
            .agent(&self.model_name)
            .temperature(self.temperature);
        if !preamble.is_empty() {
            builder = builder.preamble(&preamble);
        }
        let agent = builder.build();

        // The rig stream borrows the agent, so a task owns both and forwards
        // tokens through a channel for the duration of the turn. Dropping the
        // receiver tears the task down at the next send.
        let (tx, rx) = tokio::sync::mpsc::channel::<Result<String, KnowledgeError>>(32);
        tokio::spawn(async move {
            let mut stream = agent.stream_prompt(prompt).await;
            while let Some(item) = stream.next().await {
                match item {
                    Ok(MultiTurnStreamItem::StreamAssistantItem(
                        StreamedAssistantContent::Text(Text { text }),
                    )) => {
                        if tx.send(Ok(text)).await.is_err() {
                            return;
                        }
                    }
                    Ok(MultiTurnStreamItem::FinalResponse(_)) => return,
                    Err(err) => {
                        let _ = tx
                            .send(Err(KnowledgeError::Generation(err.to_string())))
                            .await;
                        return;
                    }
                    _ => {}
                }
            }
        });

        let stream = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        Ok(Box::pin(stream))
    }

    async fn classify(
        &self,
        instruction: &str,
        messages: &[Message],
    ) -> Result<String, KnowledgeError> {
        let (folded, transcript) = render_conversation(messages);
        let preamble = if folded.is_empty() {
            instruction.to_string()
        } else {
            format!("{instruction}\n\n{folded}")
        };

        let model = self.client.completion_model(&self.model_name);
        let request = model
            .completion_request(rig::completion::Message::user(transcript))
            .preamble(preamble)
            .temperature(0.0)
            .build();

        let response = model
            .completion(request)
            .await
            .map_err(|err| KnowledgeError::Generation(err.to_string()))?;

        Ok(flatten_choice(response.choice))
    }
}

/// Folds system messages into a preamble and renders the rest of the
/// conversation as a single prompt. Single-turn conversations pass through
/// verbatim; multi-turn history becomes a labeled transcript so the model
/// sees prior turns.
fn render_conversation(messages: &[Message]) -> (String, String) {
    let preamble = messages
        .iter()
        .filter(|m| m.has_role(Message::SYSTEM))
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    let turns: Vec<&Message> = messages
        .iter()
        .filter(|m| !m.has_role(Message::SYSTEM))
        .collect();

    let prompt = match turns.as_slice() {
        [] => String::new(),
        [only] => only.content.clone(),
        many => many
            .iter()
            .map(|m| format!("{}: {}", m.role, m.content))
            .collect::<Vec<_>>()
            .join("\n"),
    };

    (preamble, prompt)
}

fn flatten_choice(choice: rig::OneOrMany<AssistantContent>) -> String {
    choice
        .into_iter()
        .filter_map(|content| match content {
            AssistantContent::Text(Text { text }) => Some(text),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_fold_into_preamble() {
        let messages = vec![
            Message::system("answer in one word"),
            Message::user("what color is the sky?"),
        ];
        let (preamble, prompt) = render_conversation(&messages);
        assert_eq!(preamble, "answer in one word");
        assert_eq!(prompt, "what color is the sky?");
    }

    #[test]
    fn multi_turn_history_becomes_transcript() {
        let messages = vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::user("second"),
        ];
        let (preamble, prompt) = render_conversation(&messages);
        assert!(preamble.is_empty());
        assert_eq!(prompt, "user: first\nassistant: reply\nuser: second");
    }
}

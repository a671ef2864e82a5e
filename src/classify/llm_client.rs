use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use reqwest::blocking::Client as HttpClient;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

pub trait LlmClient: Send + Sync {
    /// Une requête de complétion, un texte brut en retour. Toute erreur de
    /// transport est rattrapable par l'appelant.
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Client d'un endpoint de chat-complétion compatible OpenAI. Modèle,
/// endpoint et timeout sont fixés à la construction ; la température est
/// épinglée à 0 pour des réponses déterministes.
pub struct OpenAiChatClient {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    http: HttpClient,
}

impl OpenAiChatClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("impossible d'initialiser le client HTTP de complétion")?;

        Ok(Self {
            endpoint: endpoint.into(),
            model: model.into(),
            api_key: std::env::var("OPENAI_API_KEY").ok(),
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl LlmClient for OpenAiChatClient {
    fn complete(&self, prompt: &str) -> Result<String> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: 0.0,
        };

        let mut request = self.http.post(&self.endpoint).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .context("appel HTTP à l'endpoint de complétion impossible")?
            .error_for_status()
            .context("l'endpoint de complétion a renvoyé un statut d'erreur")?;

        let raw: ChatCompletionResponse = response
            .json()
            .context("réponse de complétion illisible")?;
        raw.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("réponse de complétion sans contenu"))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone, Default)]
pub struct MockLlmClient {
    responses: Arc<Mutex<VecDeque<Result<String, String>>>>,
}

impl MockLlmClient {
    pub fn push_response(&self, response: impl Into<String>) {
        self.responses.lock().push_back(Ok(response.into()));
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.responses.lock().push_back(Err(message.into()));
    }
}

impl LlmClient for MockLlmClient {
    fn complete(&self, _: &str) -> Result<String> {
        match self.responses.lock().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("aucune réponse mock disponible")),
        }
    }
}

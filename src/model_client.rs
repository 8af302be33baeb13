use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-lite";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Transcripts are cut to this many characters before submission.
pub const MAX_TRANSCRIPT_CHARS: usize = 150_000;

/// Instruction sent ahead of every transcript.
pub const ANALYSIS_PROMPT: &str = r#"Eres un experto en análisis de chats. Analiza el siguiente chat exportado y genera un análisis en formato JSON tipo "Spotify Wrapped" para chats.

IMPORTANTE:
- Responde ÚNICAMENTE con un OBJETO JSON VÁLIDO (comienza con { y termina con })
- NO incluyas markdown ni backticks
- NO incluyas saltos de línea dentro de strings, usa espacios
- Escapa las comillas dobles dentro de strings con backslash
- Sé CONCISO en las descripciones

Estructura JSON requerida:

{
  "totalMessages": NÚMERO,
  "totalWords": NÚMERO,
  "totalCharacters": NÚMERO,
  "participants": [{"name": "STRING", "messageCount": NÚMERO, "wordCount": NÚMERO, "percentage": NÚMERO}],
  "topWords": [{"word": "STRING", "count": NÚMERO}],
  "topEmojis": [{"emoji": "STRING", "count": NÚMERO}],
  "conversationThemes": [{"theme": "STRING", "percentage": NÚMERO, "description": "STRING"}],
  "mostActiveHour": {"hour": NÚMERO, "count": NÚMERO},
  "mostActiveDay": {"day": "STRING", "count": NÚMERO},
  "longestStreak": {"days": NÚMERO, "startDate": "STRING", "endDate": "STRING"},
  "averageMessageLength": NÚMERO,
  "conversationStarters": [{"name": "STRING", "count": NÚMERO}],
  "lateNightChatter": {"name": "STRING", "count": NÚMERO},
  "earlyBird": {"name": "STRING", "count": NÚMERO},
  "questionAsker": {"name": "STRING", "count": NÚMERO},
  "laughMaster": {"name": "STRING", "count": NÚMERO},
  "voiceNoteFan": {"name": "STRING", "count": NÚMERO},
  "mediaSharer": {"name": "STRING", "count": NÚMERO},
  "firstMessage": {"date": "STRING", "author": "STRING", "content": "STRING"},
  "chatDuration": {"days": NÚMERO, "months": NÚMERO, "years": NÚMERO},
  "chatAura": {"name": "STRING", "description": "STRING"},
  "artistaTop": {"name": "STRING", "description": "STRING", "emoji": "STRING"},
  "funFacts": ["STRING"],
  "generoDelAno": [{"tema": "STRING", "porcentaje": NÚMERO, "detalles": "STRING"}],
  "cancionRepeat": [{"palabra": "STRING", "significado": "STRING"}],
  "momentosMemorables": [{"titulo": "STRING", "historia": "STRING"}],
  "fraseFinal": "STRING"
}

INSTRUCCIONES:
1. topEmojis: los 5-8 emojis más usados con sus conteos. Este campo DEBE estar presente.
2. generoDelAno: título enganchador, una línea descriptiva y 2-3 detalles textuales del chat, máximo 150 palabras por tema.
3. cancionRepeat: palabras o frases con un significado breve (máximo 25 palabras).
4. momentosMemorables: anécdotas con detalles (máximo 60 palabras).
5. fraseFinal: frase textual memorable y graciosa del chat (máximo 20 palabras).
6. funFacts: hechos curiosos cortos con humor (máximo 25 palabras cada uno).

TONO: breve, narrativo, con humor, nombres reales y extractos directos del chat.

Chat a analizar:"#;

#[derive(Error, Debug)]
pub enum ModelError {
    /// The request never got a response.
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("model API returned {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// The API answered 2xx but the body was not a generation response.
    #[error("could not decode model response: {0}")]
    Decode(String),

    /// The response carried no text.
    #[error("model returned no text")]
    Empty,
}

/// Text in, text out. Built once at startup and shared through `AppState`;
/// handlers only see this trait.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn generate(&self, prompt: &str, transcript: &str) -> Result<String, ModelError>;
}

/// Cut `text` to at most `max_chars` characters on a char boundary.
/// Returns the input unchanged when it already fits.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}

/// Gemini `generateContent` over HTTPS.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Point the client at another host, e.g. a local stub.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/{model}:generateContent",
            self.base_url.trim_end_matches('/'),
            model = self.model
        )
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    async fn generate(&self, prompt: &str, transcript: &str) -> Result<String, ModelError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part {
                        text: prompt.to_string(),
                    },
                    Part {
                        text: transcript.to_string(),
                    },
                ],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ModelError::Status {
                status,
                message: error_message(&text),
            });
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|err| ModelError::Decode(err.to_string()))?;

        extract_text(parsed)
    }
}

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    status: Option<String>,
}

fn extract_text(response: GenerateContentResponse) -> Result<String, ModelError> {
    let text = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect::<String>()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        Err(ModelError::Empty)
    } else {
        Ok(text)
    }
}

/// Pull the human-readable message out of a Gemini error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .ok()
        .and_then(|wrapper| {
            let message = wrapper.error.message?;
            Some(match wrapper.error.status {
                Some(status) if !status.is_empty() => format!("{status}: {message}"),
                _ => message,
            })
        })
        .unwrap_or_else(|| body.to_string())
}

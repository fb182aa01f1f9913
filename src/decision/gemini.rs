use super::{build_prompt, parse_reply, DecisionOutcome, DecisionProvider, DecisionRequest, ProviderError};
use crate::config::ProviderConfig;
use crate::consts;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Client for a Gemini-style `generateContent` endpoint
pub(crate) struct GeminiProvider {
    client: Client,
    url: String,
    api_key: String,
    system_prompt: String,
    generation: GenerationConfig,
}

impl fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl GeminiProvider {
    /// Set up a client from the provider configuration.  The API key is taken
    /// from the environment variable named by `config.api_key_env`.
    pub(crate) fn new(config: &ProviderConfig) -> Result<GeminiProvider, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey(config.api_key_env.clone()))?;
        let system_prompt = match config.system_prompt_file {
            Some(ref p) => fs_err::read_to_string(p).map_err(ProviderError::ReadPrompt)?,
            None => String::from(consts::DEFAULT_SYSTEM_PROMPT),
        };
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(ProviderError::Client)?;
        Ok(GeminiProvider {
            client,
            url: generate_url(&config.endpoint, &config.model),
            api_key,
            system_prompt,
            generation: GenerationConfig::from(config),
        })
    }

    fn request_body(&self, prompt: String) -> GenerateRequest<'_> {
        GenerateRequest {
            contents: vec![Content {
                role: Some("user"),
                parts: vec![Part { text: prompt }],
            }],
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: self.system_prompt.clone(),
                }],
            },
            generation_config: &self.generation,
        }
    }
}

impl DecisionProvider for GeminiProvider {
    fn decide(&mut self, request: &DecisionRequest<'_>) -> Result<DecisionOutcome, ProviderError> {
        let prompt = build_prompt(request);
        tracing::debug!(snake = request.index(), %prompt, "Requesting decision");
        let response = self
            .client
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&self.request_body(prompt))
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| String::from("<unavailable>"));
            return Err(ProviderError::Status { status, body });
        }
        let reply = response.json::<GenerateResponse>()?.text();
        tracing::debug!(snake = request.index(), %reply, "Received reply");
        Ok(parse_reply(&reply))
    }
}

fn generate_url(endpoint: &str, model: &str) -> String {
    let base = endpoint.trim_end_matches('/');
    format!("{base}/models/{model}:generateContent")
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

impl From<&ProviderConfig> for GenerationConfig {
    fn from(config: &ProviderConfig) -> GenerationConfig {
        GenerationConfig {
            temperature: config.temperature,
            top_p: config.top_p,
            top_k: config.top_k,
            max_output_tokens: config.max_output_tokens,
            response_mime_type: "text/plain",
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: &'a GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize, Serialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Concatenate the text of every part of every candidate.  A response
    /// without candidates yields an empty string.
    fn text(self) -> String {
        self.candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .map(|p| p.text)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

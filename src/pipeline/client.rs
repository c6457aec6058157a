use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;

use super::CompletionError;

/// Decoding strategy sent to the completion service. Only greedy decoding is
/// used so a given prompt yields repeatable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecodingMethod {
    Greedy,
}

/// Turn markers that end generation. Chat prompts label turns "User:" and
/// "Assistant:"; a model continuing past its answer would invent the next turn.
pub const DEFAULT_STOP_SEQUENCES: [&str; 4] = ["User:", "Assistant:", "Human:", "Observation"];

/// Generation parameters for one completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    pub decoding_method: DecodingMethod,
    /// Clamped to [0, 1].
    pub temperature: f32,
    pub min_new_tokens: u32,
    pub max_new_tokens: u32,
    pub stop_sequences: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            decoding_method: DecodingMethod::Greedy,
            temperature: 0.7,
            min_new_tokens: 5,
            max_new_tokens: 300,
            stop_sequences: DEFAULT_STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl GenerationParams {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = if temperature.is_nan() {
            0.0
        } else {
            temperature.clamp(0.0, 1.0)
        };
        self
    }

    /// Bound generation length. `max` is raised to `min` if lower.
    pub fn with_token_bounds(mut self, min: u32, max: u32) -> Self {
        self.min_new_tokens = min;
        self.max_new_tokens = max.max(min);
        self
    }

    pub fn with_stop_sequences(mut self, stops: &[&str]) -> Self {
        self.stop_sequences = stops.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Drop a stop sequence the service echoed at the end of `text`.
    pub fn strip_stop_sequence<'a>(&self, text: &'a str) -> &'a str {
        let trimmed = text.trim_end();
        self.stop_sequences
            .iter()
            .filter(|stop| !stop.is_empty())
            .find_map(|stop| trimmed.strip_suffix(stop.as_str()))
            .unwrap_or(text)
    }
}

/// Remote text-completion capability. One attempt per call, no retry.
pub trait CompletionClient {
    fn complete(
        &self,
        model_id: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, CompletionError>;
}

/// Scripted completion client for tests. Replays queued replies in order, then repeats
/// the fallback reply. Records every prompt it receives.
pub struct MockCompletionClient {
    scripted: Mutex<VecDeque<Result<String, CompletionError>>>,
    fallback: Result<String, CompletionError>,
    prompts: Mutex<Vec<String>>,
}

impl MockCompletionClient {
    /// Always answers with `response`.
    pub fn new(response: &str) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Ok(response.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always fails with `error`.
    pub fn failing(error: CompletionError) -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            fallback: Err(error),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Queue a one-off reply ahead of the fallback.
    pub fn then(self, reply: Result<String, CompletionError>) -> Self {
        if let Ok(mut queue) = self.scripted.lock() {
            queue.push_back(reply);
        }
        self
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl CompletionClient for MockCompletionClient {
    fn complete(
        &self,
        _model_id: &str,
        prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, CompletionError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }
        let scripted = self
            .scripted
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        scripted.unwrap_or_else(|| self.fallback.clone())
    }
}

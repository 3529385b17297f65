use crate::prompt::default_prompt;
use crate::rate::RateWindow;
use crate::response::parse_response;
use crate::views::ViewImage;
use partgen_core::validate::validate;
use partgen_core::DimensionRecord;
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct InferenceConfig {
    pub max_attempts: usize,
    /// `None` disables client-side rate limiting.
    pub requests_per_minute: Option<u32>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            requests_per_minute: Some(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct InferenceRequest<'a> {
    pub prompt: &'a str,
    pub views: &'a [ViewImage],
    pub previous_errors: &'a [String],
    pub attempt: usize,
}

/// A hosted vision/language model that looks at the views and answers in text.
pub trait VisionModel {
    fn infer(&mut self, request: InferenceRequest<'_>) -> Result<String, String>;
}

impl<M: VisionModel + ?Sized> VisionModel for Box<M> {
    fn infer(&mut self, request: InferenceRequest<'_>) -> Result<String, String> {
        (**self).infer(request)
    }
}

#[derive(Debug, Clone)]
pub struct Inferred {
    pub record: DimensionRecord,
    pub attempts: usize,
    pub raw_response: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("no view images to send")]
    NoViews,
    #[error("model request failed: {0}")]
    Model(String),
    #[error("no usable dimensions after {attempts} attempt(s): {}", .last_errors.join("; "))]
    ExhaustedRetries {
        attempts: usize,
        last_errors: Vec<String>,
    },
}

pub struct DimensionInferrer<M: VisionModel> {
    model: M,
    config: InferenceConfig,
    prompt: String,
    window: Option<RateWindow>,
}

impl<M: VisionModel> DimensionInferrer<M> {
    pub fn new(model: M, config: InferenceConfig) -> Self {
        let window = config.requests_per_minute.map(RateWindow::per_minute);
        Self {
            model,
            config,
            prompt: default_prompt().to_string(),
            window,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = prompt.into();
        self
    }

    pub fn into_model(self) -> M {
        self.model
    }

    /// Asks the model until its answer parses into a record that passes
    /// validation, feeding each rejection back into the next request.
    pub fn infer(&mut self, views: &[ViewImage]) -> Result<Inferred, InferenceError> {
        if views.is_empty() {
            return Err(InferenceError::NoViews);
        }

        let max_attempts = self.config.max_attempts.max(1);
        let mut errors: Vec<String> = Vec::new();

        for attempt in 1..=max_attempts {
            self.throttle();
            debug!(attempt, views = views.len(), "requesting dimensions");

            let response = self
                .model
                .infer(InferenceRequest {
                    prompt: &self.prompt,
                    views,
                    previous_errors: &errors,
                    attempt,
                })
                .map_err(InferenceError::Model)?;

            errors = match parse_response(&response) {
                Ok(record) => {
                    let violations = validate(&record);
                    if violations.is_empty() {
                        info!(attempt, "model dimensions accepted");
                        return Ok(Inferred {
                            record,
                            attempts: attempt,
                            raw_response: response,
                        });
                    }
                    violations.iter().map(|v| v.to_string()).collect()
                }
                Err(err) => vec![err.to_string()],
            };
            warn!(attempt, errors = ?errors, "model response rejected");
        }

        Err(InferenceError::ExhaustedRetries {
            attempts: max_attempts,
            last_errors: errors,
        })
    }

    fn throttle(&mut self) {
        let Some(window) = self.window.as_mut() else {
            return;
        };
        let wait = window.reserve(Instant::now());
        if !wait.is_zero() {
            warn!(wait_ms = wait.as_millis() as u64, "request budget exhausted, waiting");
            std::thread::sleep(wait);
        }
    }
}

//! Item extraction: raw seller text in, structured line items out.
//!
//! [`heuristic::extract`] is the deterministic parser. [`FallbackExtractor`]
//! tries the AI path first when credentials exist and silently drops back to
//! the heuristic output on any failure.

pub mod ai;
pub mod heuristic;
pub mod item;

use std::sync::Arc;

use async_trait::async_trait;
use log::{info, warn};
use tracing::Instrument;

pub use ai::{AiExtractor, CompletionTransport, HttpCompletionTransport};
pub use heuristic::extract;
pub use item::ParsedItem;

use crate::config::AiConfig;
use crate::error::{ExtractError, SellsyncError};
use crate::secrets;

/// Anything the job manager can run against a job's input.
#[async_trait]
pub trait ItemExtractor: Send + Sync {
    async fn extract_items(&self, raw: &str) -> Result<Vec<ParsedItem>, ExtractError>;
}

#[derive(Clone, Default)]
pub struct FallbackExtractor {
    ai: Option<AiExtractor>,
}

impl FallbackExtractor {
    pub fn heuristic_only() -> Self {
        Self { ai: None }
    }

    pub fn with_ai(ai: AiExtractor) -> Self {
        Self { ai: Some(ai) }
    }

    /// Builds the extractor from config. AI stays off when disabled or when
    /// no API key can be found; only an unreadable key file is an error.
    pub fn from_config(config: &AiConfig) -> Result<Self, SellsyncError> {
        if !config.enabled {
            return Ok(Self::heuristic_only());
        }

        match secrets::resolve_api_key(config)? {
            Some(key) => {
                let transport = HttpCompletionTransport::new(config, key)?;
                info!("AI extraction enabled (model: {})", config.model);
                Ok(Self::with_ai(AiExtractor::new(Arc::new(transport))))
            }
            None => {
                warn!("AI extraction enabled but no API key found, using heuristic parser only");
                Ok(Self::heuristic_only())
            }
        }
    }

    pub fn has_ai(&self) -> bool {
        self.ai.is_some()
    }

    /// Heuristic extraction, synchronous.
    pub fn extract(&self, raw: &str) -> Vec<ParsedItem> {
        heuristic::extract(raw)
    }

    /// AI-assisted extraction. Never fails: any AI problem yields the
    /// heuristic result instead.
    pub async fn extract_ai(&self, raw: &str) -> Vec<ParsedItem> {
        let Some(ai) = &self.ai else {
            return heuristic::extract(raw);
        };

        let span = tracing::info_span!("extract.ai", input_chars = raw.chars().count());
        match ai.extract(raw).instrument(span).await {
            Ok(items) => items,
            Err(e) => {
                warn!("AI extraction failed, falling back to heuristic parser: {}", e);
                heuristic::extract(raw)
            }
        }
    }
}

#[async_trait]
impl ItemExtractor for FallbackExtractor {
    async fn extract_items(&self, raw: &str) -> Result<Vec<ParsedItem>, ExtractError> {
        Ok(self.extract_ai(raw).await)
    }
}

//! Token counting and truncation with tiktoken encodings.

use crate::error::{CallerError, Result};
use std::fmt;
use std::sync::Arc;
use tiktoken_rs::CoreBPE;

/// Largest number of tokens dropped when a cut lands inside a multi-byte
/// character.
const MAX_DECODE_BACKOFF: usize = 3;

/// Token counter bound to one model's encoding.
#[derive(Clone)]
pub struct Tokenizer {
    model: String,
    bpe: Arc<CoreBPE>,
}

impl fmt::Debug for Tokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tokenizer").field("model", &self.model).finish()
    }
}

impl Tokenizer {
    /// Encoding for a model name, e.g. `text-davinci-003` (p50k_base).
    pub fn for_model(model: &str) -> Result<Self> {
        let bpe = tiktoken_rs::get_bpe_from_model(model)
            .map_err(|e| CallerError::Tokenizer(format!("no encoding for {}: {}", model, e)))?;
        Ok(Self {
            model: model.to_string(),
            bpe: Arc::new(bpe),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn count(&self, text: &str) -> usize {
        self.bpe.encode_with_special_tokens(text).len()
    }

    /// Cut `text` to at most `max_tokens` tokens. The cut may land in the
    /// middle of a word or a structure.
    pub fn truncate(&self, text: &str, max_tokens: usize) -> Result<String> {
        let tokens = self.bpe.encode_with_special_tokens(text);
        if tokens.len() <= max_tokens {
            return Ok(text.to_string());
        }

        let mut last_error = None;
        for backoff in 0..=MAX_DECODE_BACKOFF.min(max_tokens) {
            match self.bpe.decode(tokens[..max_tokens - backoff].to_vec()) {
                Ok(decoded) => return Ok(decoded),
                Err(e) => last_error = Some(e),
            }
        }
        Err(CallerError::Tokenizer(format!(
            "could not decode truncated text: {}",
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }
}

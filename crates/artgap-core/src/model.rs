use crate::errors::ProtocolError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Every example is exactly this many space-separated tokens.
pub const TOKENS_PER_EXAMPLE: usize = 5;

/// A labeled 5-token example. Fields are private and deserialization goes
/// through [`Example::new`], so the token invariant always holds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawExample")]
pub struct Example {
    text: String,
    label: bool,
}

impl Example {
    pub fn new(text: impl Into<String>, label: bool) -> Result<Self, ProtocolError> {
        let text = text.into();
        validate_text(&text)?;
        Ok(Self { text, label })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn label(&self) -> bool {
        self.label
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.text.split(' ')
    }

    pub fn label_str(&self) -> &'static str {
        if self.label {
            "True"
        } else {
            "False"
        }
    }
}

fn validate_text(text: &str) -> Result<(), ProtocolError> {
    let tokens: Vec<&str> = text.split(' ').collect();
    if tokens.len() != TOKENS_PER_EXAMPLE {
        return Err(ProtocolError::malformed(format!(
            "example '{}' has {} tokens, expected {}",
            text,
            tokens.len(),
            TOKENS_PER_EXAMPLE
        )));
    }
    if let Some(bad) = tokens.iter().find(|t| !is_valid_token(t)) {
        return Err(ProtocolError::malformed(format!(
            "example '{}' contains invalid token '{}'",
            text, bad
        )));
    }
    Ok(())
}

/// Lowercase ASCII word, or a single digit.
fn is_valid_token(token: &str) -> bool {
    match token.as_bytes() {
        [] => false,
        [b] if b.is_ascii_digit() => true,
        bytes => bytes.iter().all(u8::is_ascii_lowercase),
    }
}

/// Generator output before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawExample {
    pub text: String,
    pub label: bool,
}

impl RawExample {
    /// Surrounding whitespace is tolerated; inner spacing is not.
    pub fn into_example(self) -> Result<Example, ProtocolError> {
        Example::new(self.text.trim(), self.label)
    }
}

impl TryFrom<RawExample> for Example {
    type Error = ProtocolError;

    fn try_from(raw: RawExample) -> Result<Self, Self::Error> {
        raw.into_example()
    }
}

impl From<Example> for RawExample {
    fn from(ex: Example) -> Self {
        Self {
            text: ex.text,
            label: ex.label,
        }
    }
}

/// sha256 over the corpus in generation order, used to tie summaries to
/// the exact samples they were computed from.
pub fn corpus_digest(corpus: &[Example]) -> String {
    let mut hasher = Sha256::new();
    for ex in corpus {
        hasher.update(ex.text.as_bytes());
        hasher.update(if ex.label { b"\x1f1\n" } else { b"\x1f0\n" });
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmResponse {
    pub text: String,
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub meta: serde_json::Value,
}

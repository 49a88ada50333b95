use base64::prelude::*;
use rand::rngs::OsRng;
use rand::RngCore;

pub const DEFAULT_KEY_PREFIX: &str = "JGP-";

const RANDOM_BYTES: usize = 32;
const KEY_BODY_LEN: usize = 32;

/// Source of new API keys.
pub trait ApiKeyGenerator: Send + Sync {
    fn generate_api_key(&self) -> String;
}

/// Prefix followed by 32 base64 characters drawn from the OS CSPRNG, with
/// `/`, `+` and `=` removed.
#[derive(Debug, Clone)]
pub struct RandomApiKeyGenerator {
    prefix: String,
}

impl RandomApiKeyGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for RandomApiKeyGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PREFIX)
    }
}

impl ApiKeyGenerator for RandomApiKeyGenerator {
    fn generate_api_key(&self) -> String {
        let mut bytes = [0u8; RANDOM_BYTES];
        loop {
            OsRng.fill_bytes(&mut bytes);
            let body: String = BASE64_STANDARD
                .encode(bytes)
                .chars()
                .filter(|c| !matches!(c, '/' | '+' | '='))
                .take(KEY_BODY_LEN)
                .collect();
            // 43 significant characters per draw; redraw in the rare case
            // stripping leaves fewer than 32.
            if body.len() == KEY_BODY_LEN {
                return format!("{}{}", self.prefix, body);
            }
        }
    }
}

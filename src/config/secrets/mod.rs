
use std::fmt;

use super::ConfigError;

pub const COHERE_API_KEY: &str = "COHERE_API_KEY";
pub const PINECONE_API_KEY: &str = "PINECONE_API_KEY";
pub const GROQ_API_KEY: &str = "GROQ_API_KEY";

/// API keys for the hosted services, read from the process environment
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secrets {
    pub cohere_api_key: Option<String>,
    pub pinecone_api_key: Option<String>,
    pub groq_api_key: Option<String>,
}

impl Secrets {
    /// Load a `.env` file if one exists, then read the keys from the environment
    #[inline]
    pub fn from_env() -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    #[inline]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            cohere_api_key: read(COHERE_API_KEY),
            pinecone_api_key: read(PINECONE_API_KEY),
            groq_api_key: read(GROQ_API_KEY),
        }
    }

    #[inline]
    pub fn cohere(&self) -> Result<&str, ConfigError> {
        self.cohere_api_key
            .as_deref()
            .ok_or(ConfigError::MissingSecret(COHERE_API_KEY))
    }

    #[inline]
    pub fn pinecone(&self) -> Result<&str, ConfigError> {
        self.pinecone_api_key
            .as_deref()
            .ok_or(ConfigError::MissingSecret(PINECONE_API_KEY))
    }

    #[inline]
    pub fn groq(&self) -> Result<&str, ConfigError> {
        self.groq_api_key
            .as_deref()
            .ok_or(ConfigError::MissingSecret(GROQ_API_KEY))
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |value: &Option<String>| if value.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Secrets")
            .field("cohere_api_key", &mask(&self.cohere_api_key))
            .field("pinecone_api_key", &mask(&self.pinecone_api_key))
            .field("groq_api_key", &mask(&self.groq_api_key))
            .finish()
    }
}

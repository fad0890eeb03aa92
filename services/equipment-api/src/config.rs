use anyhow::{bail, Context, Result};

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Without a database the service keeps everything in memory.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub api_tokens: Vec<String>,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).with_context(|| format!("Missing required env var: {key}"));

        let database_url = lookup("DATABASE_URL").filter(|v| !v.trim().is_empty());
        let bind_addr = lookup("EQUIP_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());

        let api_tokens: Vec<String> = get("API_TOKENS")?
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        let max_upload_bytes = match lookup("MAX_UPLOAD_BYTES") {
            Some(v) => v
                .trim()
                .parse::<usize>()
                .with_context(|| format!("MAX_UPLOAD_BYTES must be a byte count, got {v:?}"))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        // Tiny sanity checks (fail fast, fail loud)
        if api_tokens.is_empty() {
            bail!("API_TOKENS must contain at least one token");
        }
        if let Some(url) = &database_url {
            if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                bail!("DATABASE_URL must start with postgres:// or postgresql://");
            }
        }
        if max_upload_bytes == 0 {
            bail!("MAX_UPLOAD_BYTES must be positive");
        }

        Ok(Self {
            database_url,
            bind_addr,
            api_tokens,
            max_upload_bytes,
        })
    }
}

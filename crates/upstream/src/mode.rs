use recall_index::UpstreamError;
use std::env;
use std::fmt;
use std::str::FromStr;

pub const UPSTREAM_MODE_ENV: &str = "RECALL_UPSTREAM";

/// Which describer/embedder backends a process talks to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpstreamMode {
    /// OpenAI-compatible HTTP APIs.
    OpenAi,
    /// Deterministic offline backends.
    Stub,
}

impl UpstreamMode {
    pub fn from_env() -> Result<Self, UpstreamError> {
        env::var(UPSTREAM_MODE_ENV)
            .unwrap_or_else(|_| "openai".to_string())
            .parse()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Stub => "stub",
        }
    }
}

impl FromStr for UpstreamMode {
    type Err = UpstreamError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "stub" => Ok(Self::Stub),
            other => Err(UpstreamError::Config(format!(
                "Unsupported {UPSTREAM_MODE_ENV} '{other}' (expected 'openai' or 'stub')"
            ))),
        }
    }
}

impl fmt::Display for UpstreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_modes() {
        assert_eq!("OpenAI".parse::<UpstreamMode>().unwrap(), UpstreamMode::OpenAi);
        assert_eq!(" stub ".parse::<UpstreamMode>().unwrap(), UpstreamMode::Stub);
        let err = "fast".parse::<UpstreamMode>().unwrap_err();
        assert!(err.to_string().contains("Unsupported RECALL_UPSTREAM 'fast'"));
    }
}

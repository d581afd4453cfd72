use anyhow::{Context as AnyhowContext, Result};
use recall_index::{ManagerConfig, Metric};
use recall_upstream::{UpstreamMode, UPSTREAM_MODE_ENV};
use std::path::PathBuf;
use std::time::Duration;

pub(crate) const SNAPSHOT_DIR_ENV: &str = "RECALL_SNAPSHOT_DIR";
pub(crate) const METRIC_ENV: &str = "RECALL_METRIC";
pub(crate) const TIMEOUT_ENV: &str = "RECALL_UPSTREAM_TIMEOUT_SECS";
pub(crate) const VARIANTS_ENV: &str = "RECALL_VARIANTS";
pub(crate) const EMBEDDING_DIM_ENV: &str = "RECALL_EMBEDDING_DIM";

/// Values given on the command line; `None` falls back to the environment.
#[derive(Debug, Default, Clone)]
pub(crate) struct Overrides {
    pub snapshot_dir: Option<PathBuf>,
    pub metric: Option<Metric>,
    pub upstream: Option<UpstreamMode>,
    pub timeout_secs: Option<u64>,
    pub variants: Option<u8>,
    pub embedding_dim: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub manager: ManagerConfig,
    pub upstream: UpstreamMode,
    pub embedding_dim: Option<usize>,
}

impl Settings {
    pub(crate) fn from_env(overrides: Overrides) -> Result<Self> {
        Self::resolve(overrides, |key| std::env::var(key).ok())
    }

    /// Flag, then environment, then built-in default.
    pub(crate) fn resolve(
        overrides: Overrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let lookup = |key: &str| {
            env(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let mut manager = ManagerConfig::default();

        if let Some(dir) = overrides
            .snapshot_dir
            .or_else(|| lookup(SNAPSHOT_DIR_ENV).map(PathBuf::from))
        {
            manager.snapshot_dir = dir;
        }

        if let Some(metric) = overrides.metric {
            manager.metric = metric;
        } else if let Some(raw) = lookup(METRIC_ENV) {
            manager.metric = raw
                .parse()
                .map_err(|err: String| anyhow::anyhow!(err))
                .with_context(|| format!("Invalid {METRIC_ENV}"))?;
        }

        let timeout_secs = match overrides.timeout_secs {
            Some(secs) => Some(secs),
            None => parse_env(&lookup, TIMEOUT_ENV)?,
        };
        if let Some(secs) = timeout_secs {
            manager.upstream_timeout = Duration::from_secs(secs);
        }

        let variants = match overrides.variants {
            Some(variants) => Some(variants),
            None => parse_env(&lookup, VARIANTS_ENV)?,
        };
        if let Some(variants) = variants {
            manager.variants_per_item = variants;
        }

        let upstream = match overrides.upstream {
            Some(mode) => mode,
            None => match lookup(UPSTREAM_MODE_ENV) {
                Some(raw) => raw.parse()?,
                None => UpstreamMode::OpenAi,
            },
        };

        let embedding_dim = match overrides.embedding_dim {
            Some(dim) => Some(dim),
            None => parse_env(&lookup, EMBEDDING_DIM_ENV)?,
        };

        manager.validate()?;
        if embedding_dim == Some(0) {
            anyhow::bail!("--embedding-dim must be greater than zero");
        }

        Ok(Self {
            manager,
            upstream,
            embedding_dim,
        })
    }
}

fn parse_env<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.parse::<T>()
                .with_context(|| format!("Invalid {key}: '{raw}'"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_flags_or_env() {
        let settings = Settings::resolve(Overrides::default(), env_of(&[])).unwrap();
        assert_eq!(settings.manager.snapshot_dir, PathBuf::from(".recall"));
        assert_eq!(settings.manager.metric, Metric::Euclidean);
        assert_eq!(settings.manager.variants_per_item, 5);
        assert_eq!(settings.manager.upstream_timeout, Duration::from_secs(60));
        assert_eq!(settings.upstream, UpstreamMode::OpenAi);
        assert_eq!(settings.embedding_dim, None);
    }

    #[test]
    fn env_fills_gaps_and_flags_win() {
        let env = env_of(&[
            (SNAPSHOT_DIR_ENV, "/data/index"),
            (METRIC_ENV, "cosine"),
            (UPSTREAM_MODE_ENV, "stub"),
            (TIMEOUT_ENV, "15"),
            (VARIANTS_ENV, "3"),
            (EMBEDDING_DIM_ENV, "64"),
        ]);
        let overrides = Overrides {
            variants: Some(2),
            metric: Some(Metric::Euclidean),
            ..Overrides::default()
        };
        let settings = Settings::resolve(overrides, env).unwrap();
        assert_eq!(settings.manager.snapshot_dir, PathBuf::from("/data/index"));
        assert_eq!(settings.manager.metric, Metric::Euclidean);
        assert_eq!(settings.manager.variants_per_item, 2);
        assert_eq!(settings.manager.upstream_timeout, Duration::from_secs(15));
        assert_eq!(settings.upstream, UpstreamMode::Stub);
        assert_eq!(settings.embedding_dim, Some(64));
    }

    #[test]
    fn rejects_invalid_values() {
        let err = Settings::resolve(Overrides::default(), env_of(&[(VARIANTS_ENV, "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid RECALL_VARIANTS"));

        let overrides = Overrides {
            variants: Some(9),
            ..Overrides::default()
        };
        assert!(Settings::resolve(overrides, env_of(&[])).is_err());

        let bad_metric = env_of(&[(METRIC_ENV, "manhattan")]);
        assert!(Settings::resolve(Overrides::default(), bad_metric).is_err());
        assert!(Settings::resolve(Overrides::default(), env_of(&[(TIMEOUT_ENV, "0")])).is_err());
    }
}

use crate::error::{IndexError, Result};
use recall_vector_store::Metric;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SNAPSHOT_DIR: &str = ".recall";
pub const DEFAULT_VARIANTS_PER_ITEM: u8 = 5;
pub const MAX_VARIANTS_PER_ITEM: u8 = 5;
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Directory holding `vectors.bin` and `metadata.json`.
    pub snapshot_dir: PathBuf,
    pub metric: Metric,
    /// Descriptions generated and indexed per added image.
    pub variants_per_item: u8,
    /// Applied to every single describer or embedder call.
    pub upstream_timeout: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            snapshot_dir: PathBuf::from(DEFAULT_SNAPSHOT_DIR),
            metric: Metric::Euclidean,
            variants_per_item: DEFAULT_VARIANTS_PER_ITEM,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
        }
    }
}

impl ManagerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_VARIANTS_PER_ITEM).contains(&self.variants_per_item) {
            return Err(IndexError::InvalidConfig(format!(
                "variants_per_item must be between 1 and {MAX_VARIANTS_PER_ITEM}, got {}",
                self.variants_per_item
            )));
        }
        if self.upstream_timeout.is_zero() {
            return Err(IndexError::InvalidConfig(
                "upstream_timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        ManagerConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range_variants_and_zero_timeout() {
        let config = ManagerConfig {
            variants_per_item: 0,
            ..ManagerConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(IndexError::InvalidConfig(_))
        ));

        let config = ManagerConfig {
            variants_per_item: 6,
            ..ManagerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ManagerConfig {
            upstream_timeout: Duration::ZERO,
            ..ManagerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}

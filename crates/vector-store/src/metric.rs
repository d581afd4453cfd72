use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Distance semantics of an index. Chosen once when the index is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// Squared L2 distance, smaller is closer.
    Euclidean,
    /// Inner product over unit vectors, larger is closer.
    Cosine,
}

impl Metric {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Euclidean => "euclidean",
            Self::Cosine => "cosine",
        }
    }

    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::Euclidean => 0,
            Self::Cosine => 1,
        }
    }

    pub(crate) const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Euclidean),
            1 => Some(Self::Cosine),
            _ => None,
        }
    }

    /// Whether vectors must be unit-normalized before they reach the store.
    #[must_use]
    pub const fn requires_normalized(self) -> bool {
        matches!(self, Self::Cosine)
    }

    /// Orders two scores so that the better match sorts first.
    /// NaN always sorts last.
    #[must_use]
    pub fn rank(self, a: f32, b: f32) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => match self {
                Self::Euclidean => a.total_cmp(&b),
                Self::Cosine => b.total_cmp(&a),
            },
        }
    }

    /// Converts a raw score into a similarity percentage rounded to two decimals.
    ///
    /// Euclidean maps distance `d` to `100 / (1 + d)`. Cosine maps the inner
    /// product to `100 * ip`, clamped to `[0, 100]`.
    #[must_use]
    pub fn similarity_percentage(self, score: f32) -> f64 {
        let score = f64::from(score);
        let pct = match self {
            Self::Euclidean => 100.0 / (1.0 + score),
            Self::Cosine => (score * 100.0).clamp(0.0, 100.0),
        };
        round2(pct)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "cosine" | "ip" => Ok(Self::Cosine),
            other => Err(format!(
                "Unsupported metric '{other}' (expected 'euclidean' or 'cosine')"
            )),
        }
    }
}

/// Scales `vec` to unit length in place. Zero vectors are left untouched.
pub fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

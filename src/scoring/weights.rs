//! Bucket weights and the built-in weight profiles.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result, ensure_non_negative};

/// Tolerance on the bucket weight sum.
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

/// The four score buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    Value,
    Robustness,
    Technical,
    Esg,
}

impl Bucket {
    pub const ALL: [Bucket; 4] = [Bucket::Value, Bucket::Robustness, Bucket::Technical, Bucket::Esg];

    pub fn label(self) -> &'static str {
        match self {
            Bucket::Value => "value",
            Bucket::Robustness => "robustness",
            Bucket::Technical => "technical",
            Bucket::Esg => "ESG",
        }
    }
}

/// Weight of each bucket in the total score. Must sum to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketWeights {
    pub value: f64,
    pub robustness: f64,
    pub technical: f64,
    pub esg: f64,
}

impl BucketWeights {
    pub fn get(&self, bucket: Bucket) -> f64 {
        match bucket {
            Bucket::Value => self.value,
            Bucket::Robustness => self.robustness,
            Bucket::Technical => self.technical,
            Bucket::Esg => self.esg,
        }
    }

    /// # Errors
    ///
    /// Returns `EngineError::Input` for a negative weight or a sum other than 1.
    pub fn validate(&self) -> Result<()> {
        for bucket in Bucket::ALL {
            ensure_non_negative(&format!("profile.{}", bucket.label().to_lowercase()), self.get(bucket))?;
        }
        let sum: f64 = Bucket::ALL.iter().map(|b| self.get(*b)).sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::input(
                "profile",
                format!("bucket weights sum to {sum}, expected 1.0"),
            ));
        }
        Ok(())
    }
}

/// Who the ranking is for.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightProfile {
    #[default]
    Balanced,
    /// Value first.
    Cfo,
    /// Emissions first.
    Esg,
    Technical,
    Custom(BucketWeights),
}

impl WeightProfile {
    pub fn weights(&self) -> BucketWeights {
        match self {
            WeightProfile::Balanced => BucketWeights {
                value: 0.30,
                robustness: 0.20,
                technical: 0.30,
                esg: 0.20,
            },
            WeightProfile::Cfo => BucketWeights {
                value: 0.50,
                robustness: 0.25,
                technical: 0.15,
                esg: 0.10,
            },
            WeightProfile::Esg => BucketWeights {
                value: 0.15,
                robustness: 0.15,
                technical: 0.20,
                esg: 0.50,
            },
            WeightProfile::Technical => BucketWeights {
                value: 0.15,
                robustness: 0.15,
                technical: 0.55,
                esg: 0.15,
            },
            WeightProfile::Custom(w) => *w,
        }
    }
}

//! Multi-criteria ranking of offers in four weighted buckets: value,
//! robustness, technical and ESG.

pub mod engine;
pub mod offer;
pub mod policy;
pub mod weights;

pub use engine::{
    BucketScore, Comparison, KpiPoints, OfferFlag, Reason, ScoredOffer, ScoringParameters,
    ScoringRequest, ScoringResponse, analyze, compare,
};
pub use offer::{DEFAULT_EMISSION_FACTOR_KG_PER_KWH, Offer, co2_reduction_tonnes};
pub use policy::{Kpi, KpiRule, ScoringPolicy, TransferFunction};
pub use weights::{Bucket, BucketWeights, WeightProfile};

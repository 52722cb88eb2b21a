//! Multi-criteria ranking of offers.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::offer::Offer;
use super::policy::{Kpi, ScoringPolicy};
use super::weights::{Bucket, WeightProfile};
use crate::error::{EngineError, Result, ensure_in_range, ensure_positive};

/// Reasons reported per compared pair.
const MAX_REASONS: usize = 3;

/// Assumptions shared by every offer in one ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScoringParameters {
    pub horizon_years: u32,
    pub discount_rate: f64,
    /// Multiplier on yield for the conservative NPV.
    pub conservative_yield_factor: f64,
    /// Multiplier on energy price for the conservative NPV.
    pub conservative_price_factor: f64,
    /// Autoconsumption (%) below which an offer is flagged.
    pub low_autoconsumption_pct: f64,
    pub profile: WeightProfile,
}

impl Default for ScoringParameters {
    fn default() -> Self {
        Self {
            horizon_years: 25,
            discount_rate: 0.07,
            conservative_yield_factor: 0.9,
            conservative_price_factor: 0.9,
            low_autoconsumption_pct: 60.0,
            profile: WeightProfile::default(),
        }
    }
}

impl ScoringParameters {
    /// # Errors
    ///
    /// Returns `EngineError::Input` naming the first malformed parameter.
    pub fn validate(&self) -> Result<()> {
        ensure_in_range("parameters.discount_rate", self.discount_rate, 0.0, 1.0)?;
        ensure_positive(
            "parameters.conservative_yield_factor",
            self.conservative_yield_factor,
        )?;
        ensure_positive(
            "parameters.conservative_price_factor",
            self.conservative_price_factor,
        )?;
        ensure_in_range(
            "parameters.low_autoconsumption_pct",
            self.low_autoconsumption_pct,
            0.0,
            100.0,
        )?;
        self.profile.weights().validate()
    }

    /// NPV with yield and price both reduced by the conservative factors.
    pub fn conservative_npv(&self, offer: &Offer) -> f64 {
        let revenue =
            offer.annual_revenue * self.conservative_yield_factor * self.conservative_price_factor;
        let net = revenue - offer.annual_opex;
        let discounted: f64 = (1..=self.horizon_years)
            .map(|y| net / (1.0 + self.discount_rate).powi(y as i32))
            .sum();
        discounted - offer.capex
    }
}

/// Qualitative remark on an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfferFlag {
    NegativeNpv,
    IrrUndefined,
    PaybackBeyondHorizon,
    LowAutoconsumption,
    ThresholdNotMet,
}

/// Points earned by one KPI inside one bucket.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KpiPoints {
    pub kpi: Kpi,
    pub value: Option<f64>,
    pub points: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketScore {
    pub bucket: Bucket,
    /// 0-100.
    pub score: f64,
    pub weight: f64,
    pub kpis: Vec<KpiPoints>,
}

/// One ranked offer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredOffer {
    pub id: String,
    /// 1 = best.
    pub rank: usize,
    /// 0-100.
    pub total: f64,
    pub npv: f64,
    pub conservative_npv: f64,
    pub buckets: Vec<BucketScore>,
    pub flags: Vec<OfferFlag>,
}

impl ScoredOffer {
    pub fn bucket_score(&self, bucket: Bucket) -> f64 {
        self.buckets
            .iter()
            .find(|b| b.bucket == bucket)
            .map_or(0.0, |b| b.score)
    }
}

/// One bucket difference between two offers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reason {
    pub bucket: Bucket,
    /// `first − second` bucket score.
    pub difference: f64,
    pub text: String,
}

/// The largest bucket differences between two offers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub first: String,
    pub second: String,
    pub reasons: Vec<Reason>,
}

/// Inputs of [`analyze`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScoringRequest {
    pub offers: Vec<Offer>,
    #[serde(default)]
    pub parameters: ScoringParameters,
    #[serde(default)]
    pub policy: ScoringPolicy,
    /// Offer id pairs to explain. The two best offers when empty.
    #[serde(default)]
    pub compare: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoringResponse {
    /// Best first.
    pub results: Vec<ScoredOffer>,
    pub comparisons: Vec<Comparison>,
}

fn kpi_value(kpi: Kpi, offer: &Offer, conservative_npv: f64, horizon_years: u32) -> Option<f64> {
    match kpi {
        Kpi::Npv => Some(offer.npv),
        Kpi::Irr => offer.irr,
        Kpi::PaybackYears => offer.payback_years,
        Kpi::ConservativeNpv => Some(conservative_npv),
        Kpi::PaybackMargin => offer.payback_years.map(|p| f64::from(horizon_years) - p),
        Kpi::Lcoe => offer.lcoe_per_mwh,
        Kpi::Autoconsumption => offer.autoconsumption_pct,
        Kpi::Coverage => offer.coverage_pct,
        Kpi::Co2Reduction => Some(offer.co2_reduction_t),
    }
}

fn flags(offer: &Offer, params: &ScoringParameters) -> Vec<OfferFlag> {
    let mut flags = Vec::new();
    if offer.npv < 0.0 {
        flags.push(OfferFlag::NegativeNpv);
    }
    if offer.irr.is_none() {
        flags.push(OfferFlag::IrrUndefined);
    }
    if offer
        .payback_years
        .is_none_or(|p| p > f64::from(params.horizon_years))
    {
        flags.push(OfferFlag::PaybackBeyondHorizon);
    }
    if offer
        .autoconsumption_pct
        .is_some_and(|a| a < params.low_autoconsumption_pct)
    {
        flags.push(OfferFlag::LowAutoconsumption);
    }
    if !offer.meets_threshold {
        flags.push(OfferFlag::ThresholdNotMet);
    }
    flags
}

fn score_offer(offer: &Offer, params: &ScoringParameters, policy: &ScoringPolicy) -> ScoredOffer {
    let weights = params.profile.weights();
    let conservative_npv = params.conservative_npv(offer);

    let buckets: Vec<BucketScore> = Bucket::ALL
        .iter()
        .map(|&bucket| {
            let kpis: Vec<KpiPoints> = policy
                .rules_for(bucket)
                .map(|rule| {
                    let value = kpi_value(rule.kpi, offer, conservative_npv, params.horizon_years);
                    KpiPoints {
                        kpi: rule.kpi,
                        value,
                        points: rule.transfer.points(value),
                        weight: rule.weight,
                    }
                })
                .collect();
            BucketScore {
                bucket,
                score: kpis.iter().map(|k| k.points * k.weight).sum(),
                weight: weights.get(bucket),
                kpis,
            }
        })
        .collect();
    let total = buckets.iter().map(|b| b.score * b.weight).sum();

    debug!(offer = %offer.id, total, conservative_npv, "scored offer");
    ScoredOffer {
        id: offer.id.clone(),
        rank: 0,
        total,
        npv: offer.npv,
        conservative_npv,
        buckets,
        flags: flags(offer, params),
    }
}

/// Ranking order: total descending, then NPV descending, then id.
fn rank_order(a: &ScoredOffer, b: &ScoredOffer) -> Ordering {
    b.total
        .total_cmp(&a.total)
        .then_with(|| b.npv.total_cmp(&a.npv))
        .then_with(|| a.id.cmp(&b.id))
}

/// Explains why `first` scores differently from `second`, largest bucket
/// differences first.
pub fn compare(first: &ScoredOffer, second: &ScoredOffer) -> Comparison {
    let mut reasons: Vec<Reason> = Bucket::ALL
        .iter()
        .map(|&bucket| {
            let difference = first.bucket_score(bucket) - second.bucket_score(bucket);
            let (leader, other) = if difference >= 0.0 {
                (&first.id, &second.id)
            } else {
                (&second.id, &first.id)
            };
            Reason {
                bucket,
                difference,
                text: format!(
                    "{leader} scores {:.1} points higher than {other} on {}",
                    difference.abs(),
                    bucket.label()
                ),
            }
        })
        .filter(|r| r.difference != 0.0)
        .collect();
    reasons.sort_by(|a, b| {
        b.difference
            .abs()
            .total_cmp(&a.difference.abs())
            .then(a.bucket.cmp(&b.bucket))
    });
    reasons.truncate(MAX_REASONS);

    Comparison {
        first: first.id.clone(),
        second: second.id.clone(),
        reasons,
    }
}

/// Scores, ranks and explains a set of offers.
///
/// # Errors
///
/// Returns `EngineError::Input` for an empty or duplicated offer list,
/// invalid parameters or policy, or a comparison naming an unknown offer.
pub fn analyze(request: &ScoringRequest) -> Result<ScoringResponse> {
    if request.offers.is_empty() {
        return Err(EngineError::input("offers", "at least one offer required"));
    }
    let mut seen = HashSet::new();
    for offer in &request.offers {
        if !seen.insert(offer.id.as_str()) {
            return Err(EngineError::input(
                "offers",
                format!("duplicate offer id {:?}", offer.id),
            ));
        }
    }
    request.parameters.validate()?;
    request.policy.validate()?;

    let mut results: Vec<ScoredOffer> = request
        .offers
        .iter()
        .map(|o| score_offer(o, &request.parameters, &request.policy))
        .collect();
    results.sort_by(rank_order);
    for (i, r) in results.iter_mut().enumerate() {
        r.rank = i + 1;
    }

    let find = |id: &str| {
        results
            .iter()
            .find(|r| r.id == id)
            .ok_or_else(|| EngineError::input("compare", format!("unknown offer id {id:?}")))
    };
    let comparisons = if request.compare.is_empty() {
        match results.as_slice() {
            [first, second, ..] => vec![compare(first, second)],
            _ => Vec::new(),
        }
    } else {
        request
            .compare
            .iter()
            .map(|(a, b)| Ok(compare(find(a)?, find(b)?)))
            .collect::<Result<Vec<_>>>()?
    };

    info!(
        offers = results.len(),
        best = results.first().map(|r| r.id.as_str()),
        profile = ?request.parameters.profile,
        "offers ranked"
    );
    Ok(ScoringResponse {
        results,
        comparisons,
    })
}

//! Tariffs, investment costs and discounting assumptions.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result, ensure_in_range, ensure_non_negative};
use crate::sim::types::BessConfig;

/// Per-kWp PV investment cost for installations up to `max_kwp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CapexTier {
    /// Upper bound of the band (inclusive); `None` for the open-ended top band.
    #[serde(default)]
    pub max_kwp: Option<f64>,
    pub per_kwp: f64,
}

/// Battery investment and running costs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BessFinance {
    pub capex_per_kwh: f64,
    pub capex_per_kw: f64,
    /// Annual OPEX, % of battery CAPEX.
    pub opex_pct: f64,
    /// Cost of an end-of-life replacement, % of the initial battery CAPEX.
    pub replacement_cost_pct: f64,
}

impl Default for BessFinance {
    fn default() -> Self {
        Self {
            capex_per_kwh: 1_400.0,
            capex_per_kw: 600.0,
            opex_pct: 1.5,
            replacement_cost_pct: 70.0,
        }
    }
}

/// Financial assumptions for one evaluation. All money amounts share one
/// (unspecified) currency; energy prices are per MWh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FinancialParameters {
    /// Avoided purchase price of self-consumed energy, per MWh.
    pub energy_price_per_mwh: f64,
    /// Revenue for exported energy, per MWh.
    pub feed_in_tariff_per_mwh: f64,
    /// Annual escalation of both prices, %.
    pub price_escalation_pct: f64,
    /// Capacity-banded PV CAPEX; the band containing the installed
    /// capacity prices every kWp.
    pub capex_tiers: Vec<CapexTier>,
    /// Annual PV OPEX, % of PV CAPEX.
    pub opex_pct: f64,
    /// Discount rate, fraction per year.
    pub discount_rate: f64,
    /// Annual PV output degradation, fraction per year.
    pub degradation_rate: f64,
    pub horizon_years: u32,
    pub bess: BessFinance,
}

impl Default for FinancialParameters {
    fn default() -> Self {
        Self {
            energy_price_per_mwh: 700.0,
            feed_in_tariff_per_mwh: 0.0,
            price_escalation_pct: 0.0,
            capex_tiers: vec![
                CapexTier {
                    max_kwp: Some(50.0),
                    per_kwp: 4_200.0,
                },
                CapexTier {
                    max_kwp: Some(500.0),
                    per_kwp: 3_500.0,
                },
                CapexTier {
                    max_kwp: Some(2_000.0),
                    per_kwp: 3_000.0,
                },
                CapexTier {
                    max_kwp: None,
                    per_kwp: 2_700.0,
                },
            ],
            opex_pct: 1.0,
            discount_rate: 0.07,
            degradation_rate: 0.005,
            horizon_years: 25,
            bess: BessFinance::default(),
        }
    }
}

impl FinancialParameters {
    /// # Errors
    ///
    /// Returns `EngineError::Input` naming the first malformed parameter.
    pub fn validate(&self) -> Result<()> {
        ensure_non_negative("finance.energy_price_per_mwh", self.energy_price_per_mwh)?;
        ensure_non_negative("finance.feed_in_tariff_per_mwh", self.feed_in_tariff_per_mwh)?;
        ensure_in_range(
            "finance.price_escalation_pct",
            self.price_escalation_pct,
            -50.0,
            100.0,
        )?;
        ensure_in_range("finance.opex_pct", self.opex_pct, 0.0, 100.0)?;
        ensure_in_range("finance.discount_rate", self.discount_rate, -0.5, 1.0)?;
        ensure_in_range("finance.degradation_rate", self.degradation_rate, 0.0, 1.0)?;
        if self.horizon_years > 100 {
            return Err(EngineError::input(
                "finance.horizon_years",
                format!("must be <= 100, got {}", self.horizon_years),
            ));
        }
        if self.capex_tiers.is_empty() {
            return Err(EngineError::input("finance.capex_tiers", "at least one tier required"));
        }
        let mut last_max = 0.0;
        for (i, tier) in self.capex_tiers.iter().enumerate() {
            ensure_non_negative(&format!("finance.capex_tiers[{i}].per_kwp"), tier.per_kwp)?;
            match tier.max_kwp {
                Some(max) if !max.is_finite() || max <= last_max => {
                    return Err(EngineError::input(
                        format!("finance.capex_tiers[{i}].max_kwp"),
                        "bands must be strictly increasing",
                    ));
                }
                Some(max) => last_max = max,
                None if i + 1 != self.capex_tiers.len() => {
                    return Err(EngineError::input(
                        format!("finance.capex_tiers[{i}].max_kwp"),
                        "only the last band may be open-ended",
                    ));
                }
                None => {}
            }
        }
        ensure_non_negative("finance.bess.capex_per_kwh", self.bess.capex_per_kwh)?;
        ensure_non_negative("finance.bess.capex_per_kw", self.bess.capex_per_kw)?;
        ensure_in_range("finance.bess.opex_pct", self.bess.opex_pct, 0.0, 100.0)?;
        ensure_in_range(
            "finance.bess.replacement_cost_pct",
            self.bess.replacement_cost_pct,
            0.0,
            200.0,
        )?;
        Ok(())
    }

    /// Per-kWp rate of the band containing `capacity_kwp`.
    ///
    /// Capacities beyond a closed top band use the top band's rate.
    pub fn capex_rate(&self, capacity_kwp: f64) -> f64 {
        self.capex_tiers
            .iter()
            .find(|t| t.max_kwp.is_none_or(|max| capacity_kwp <= max))
            .or(self.capex_tiers.last())
            .map_or(0.0, |t| t.per_kwp)
    }

    pub fn pv_capex(&self, capacity_kwp: f64) -> f64 {
        capacity_kwp * self.capex_rate(capacity_kwp)
    }

    pub fn bess_capex(&self, bess: &BessConfig) -> f64 {
        bess.energy_kwh * self.bess.capex_per_kwh + bess.power_kw * self.bess.capex_per_kw
    }

    /// Energy price in project year `year` (1-based), per kWh.
    pub(crate) fn energy_price_per_kwh(&self, year: u32) -> f64 {
        self.energy_price_per_mwh / 1000.0 * self.escalation(year)
    }

    pub(crate) fn feed_in_per_kwh(&self, year: u32) -> f64 {
        self.feed_in_tariff_per_mwh / 1000.0 * self.escalation(year)
    }

    fn escalation(&self, year: u32) -> f64 {
        (1.0 + self.price_escalation_pct / 100.0).powi(year.saturating_sub(1) as i32)
    }

    /// Discount factor `1 / (1 + r)^year`.
    pub(crate) fn discount(&self, year: u32) -> f64 {
        1.0 / (1.0 + self.discount_rate).powi(year as i32)
    }
}

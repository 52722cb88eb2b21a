//! Post-hoc aggregation of hourly dispatch records into annual results.

use std::fmt;

use super::types::{BessStatus, ExportMode, HourRecord, SimulationResult};

impl SimulationResult {
    /// Computes annual totals from the complete hourly record vector.
    ///
    /// # Arguments
    ///
    /// * `hours` - Complete dispatch records
    /// * `export_mode` - Surplus handling used for the run
    /// * `bess` - Battery outcome for the run
    /// * `nameplate_energy_kwh` - Battery size for the cycle count (0 without battery)
    ///
    /// # Returns
    ///
    /// A `SimulationResult` with all fields populated.
    pub fn from_hours(
        hours: &[HourRecord],
        export_mode: ExportMode,
        bess: BessStatus,
        nameplate_energy_kwh: f64,
    ) -> Self {
        let mut r = Self {
            production_kwh: 0.0,
            consumption_kwh: 0.0,
            self_consumed_kwh: 0.0,
            direct_kwh: 0.0,
            exported_kwh: 0.0,
            imported_kwh: 0.0,
            charged_kwh: 0.0,
            discharged_kwh: 0.0,
            curtailed_kwh: 0.0,
            equivalent_full_cycles: 0.0,
            export_mode,
            bess,
            monthly_production_kwh: [0.0; 12],
            monthly_self_consumed_kwh: [0.0; 12],
            monthly_discharged_kwh: [0.0; 12],
        };

        for h in hours {
            r.production_kwh += h.production;
            r.consumption_kwh += h.consumption;
            r.direct_kwh += h.direct;
            r.charged_kwh += h.charged;
            r.discharged_kwh += h.discharged;
            r.exported_kwh += h.exported;
            r.curtailed_kwh += h.curtailed;
            r.imported_kwh += h.imported;

            let m = h.month0.min(11);
            r.monthly_production_kwh[m] += h.production;
            r.monthly_self_consumed_kwh[m] += h.self_consumed();
            r.monthly_discharged_kwh[m] += h.discharged;
        }

        r.self_consumed_kwh = r.direct_kwh + r.discharged_kwh;
        r.equivalent_full_cycles = if nameplate_energy_kwh > 0.0 {
            r.discharged_kwh / nameplate_energy_kwh
        } else {
            0.0
        };
        r
    }
}

fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.1}%"))
}

impl fmt::Display for SimulationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Production:          {:.1} MWh", self.production_kwh / 1000.0)?;
        writeln!(f, "Consumption:         {:.1} MWh", self.consumption_kwh / 1000.0)?;
        writeln!(
            f,
            "Self-consumed:       {:.1} MWh (autoconsumption {}, coverage {})",
            self.self_consumed_kwh / 1000.0,
            pct(self.autoconsumption_pct()),
            pct(self.coverage_pct())
        )?;
        writeln!(f, "Exported:            {:.1} MWh", self.exported_kwh / 1000.0)?;
        writeln!(f, "Imported:            {:.1} MWh", self.imported_kwh / 1000.0)?;
        match &self.bess {
            BessStatus::Active => {
                writeln!(
                    f,
                    "Battery:             {:.1} MWh in, {:.1} MWh out ({:.0} equiv. cycles)",
                    self.charged_kwh / 1000.0,
                    self.discharged_kwh / 1000.0,
                    self.equivalent_full_cycles
                )?;
            }
            BessStatus::Disabled { reason } => writeln!(f, "Battery:             disabled ({reason})")?,
            BessStatus::NotConfigured => {}
        }
        write!(f, "Curtailed:           {:.1} MWh", self.curtailed_kwh / 1000.0)
    }
}

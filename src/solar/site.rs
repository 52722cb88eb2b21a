//! Site geometry, installation archetypes, and system loss factors.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ensure_in_range, ensure_positive};

/// Typical monthly mean ambient temperature for a central European site (°C).
pub const DEFAULT_MONTHLY_AMBIENT_C: [f64; 12] = [
    -1.5, -0.5, 3.0, 8.5, 14.0, 17.0, 19.0, 18.5, 14.0, 9.0, 4.0, 0.5,
];

/// Typical monthly ratio of all-sky to clear-sky irradiance for the same site.
pub const DEFAULT_MONTHLY_CLEARNESS: [f64; 12] = [
    0.42, 0.48, 0.55, 0.60, 0.62, 0.63, 0.64, 0.63, 0.60, 0.52, 0.42, 0.38,
];

/// Installation archetype; each maps to a default tilt, orientation and DC/AC ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    /// Ground-mounted, equator-facing.
    GroundSouth,
    /// Ground-mounted, east/west split.
    GroundEastWest,
    /// Flat-roof ballast system, east/west split.
    RoofEastWest,
    /// Carport canopy, shallow equator-facing tilt.
    Carport,
}

impl Archetype {
    pub const ALL: [Archetype; 4] = [
        Archetype::GroundSouth,
        Archetype::GroundEastWest,
        Archetype::RoofEastWest,
        Archetype::Carport,
    ];

    pub fn default_tilt_deg(self) -> f64 {
        match self {
            Archetype::GroundSouth => 35.0,
            Archetype::GroundEastWest => 15.0,
            Archetype::RoofEastWest => 10.0,
            Archetype::Carport => 8.0,
        }
    }

    pub fn default_dcac_ratio(self) -> f64 {
        match self {
            Archetype::GroundSouth => 1.20,
            Archetype::GroundEastWest | Archetype::RoofEastWest => 1.30,
            Archetype::Carport => 1.15,
        }
    }

    /// Equator-facing azimuth for `latitude` (degrees from north, clockwise).
    pub fn default_azimuth_deg(self, latitude: f64) -> f64 {
        if latitude >= 0.0 { 180.0 } else { 0.0 }
    }

    pub fn is_east_west(self) -> bool {
        matches!(self, Archetype::GroundEastWest | Archetype::RoofEastWest)
    }
}

/// One planar sub-array: orientation plus its share of installed capacity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Plane {
    pub tilt_deg: f64,
    pub azimuth_deg: f64,
    pub share: f64,
}

/// Site and array geometry for one analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_m: f64,
    /// Linke turbidity factor (2 very clear .. 7 polluted).
    pub linke_turbidity: f64,
    pub archetype: Archetype,
    pub tilt_deg: f64,
    /// Degrees from north, clockwise. Ignored by east/west archetypes.
    pub azimuth_deg: f64,
    pub albedo: f64,
    /// Offset of the series timestamps from UTC, hours.
    pub utc_offset_h: f64,
    pub monthly_ambient_c: [f64; 12],
    /// Half of the peak-to-trough daily temperature range (°C).
    pub diurnal_swing_c: f64,
    pub monthly_clearness: [f64; 12],
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self::for_archetype(Archetype::GroundSouth, 52.23, 21.01)
    }
}

impl SiteConfig {
    /// Site with every geometric parameter taken from the archetype defaults.
    pub fn for_archetype(archetype: Archetype, latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude_m: 100.0,
            linke_turbidity: 3.0,
            archetype,
            tilt_deg: archetype.default_tilt_deg(),
            azimuth_deg: archetype.default_azimuth_deg(latitude),
            albedo: 0.2,
            utc_offset_h: (longitude / 15.0).round(),
            monthly_ambient_c: DEFAULT_MONTHLY_AMBIENT_C,
            diurnal_swing_c: 4.0,
            monthly_clearness: DEFAULT_MONTHLY_CLEARNESS,
        }
    }

    /// Checks coordinates and atmospheric parameters.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Input` naming the first malformed field.
    pub fn validate(&self) -> Result<()> {
        ensure_in_range("site.latitude", self.latitude, -90.0, 90.0)?;
        ensure_in_range("site.longitude", self.longitude, -180.0, 180.0)?;
        ensure_in_range("site.altitude_m", self.altitude_m, -500.0, 9000.0)?;
        ensure_in_range("site.linke_turbidity", self.linke_turbidity, 1.0, 10.0)?;
        ensure_in_range("site.tilt_deg", self.tilt_deg, 0.0, 90.0)?;
        ensure_in_range("site.azimuth_deg", self.azimuth_deg, 0.0, 360.0)?;
        ensure_in_range("site.albedo", self.albedo, 0.0, 1.0)?;
        ensure_in_range("site.utc_offset_h", self.utc_offset_h, -14.0, 14.0)?;
        ensure_in_range("site.diurnal_swing_c", self.diurnal_swing_c, 0.0, 25.0)?;
        for (m, k) in self.monthly_clearness.iter().enumerate() {
            ensure_in_range(&format!("site.monthly_clearness[{m}]"), *k, 0.0, 1.0)?;
        }
        for (m, t) in self.monthly_ambient_c.iter().enumerate() {
            ensure_in_range(&format!("site.monthly_ambient_c[{m}]"), *t, -60.0, 60.0)?;
        }
        Ok(())
    }

    /// Sub-arrays making up the installation.
    ///
    /// East/west archetypes split capacity evenly between an east-facing and
    /// a west-facing plane; every other archetype is a single plane.
    pub fn planes(&self) -> Vec<Plane> {
        if self.archetype.is_east_west() {
            vec![
                Plane {
                    tilt_deg: self.tilt_deg,
                    azimuth_deg: 90.0,
                    share: 0.5,
                },
                Plane {
                    tilt_deg: self.tilt_deg,
                    azimuth_deg: 270.0,
                    share: 0.5,
                },
            ]
        } else {
            vec![Plane {
                tilt_deg: self.tilt_deg,
                azimuth_deg: self.azimuth_deg,
                share: 1.0,
            }]
        }
    }

    /// Month index adjusted so that profiles written for the northern
    /// hemisphere follow the seasons south of the equator.
    pub(crate) fn seasonal_month(&self, month0: usize) -> usize {
        if self.latitude < 0.0 {
            (month0 + 6) % 12
        } else {
            month0
        }
    }
}

/// System losses applied on top of the irradiance model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LossFactors {
    pub soiling_pct: f64,
    pub mismatch_pct: f64,
    pub wiring_pct: f64,
    pub inverter_efficiency_pct: f64,
    /// Power temperature coefficient, %/°C (negative for silicon).
    pub temp_coeff_pct_per_c: f64,
    /// Nominal operating cell temperature (°C).
    pub noct_c: f64,
}

impl Default for LossFactors {
    fn default() -> Self {
        Self {
            soiling_pct: 2.0,
            mismatch_pct: 1.5,
            wiring_pct: 1.5,
            inverter_efficiency_pct: 97.5,
            temp_coeff_pct_per_c: -0.37,
            noct_c: 45.0,
        }
    }
}

impl LossFactors {
    /// # Errors
    ///
    /// Returns `EngineError::Input` naming the first out-of-range factor.
    pub fn validate(&self) -> Result<()> {
        ensure_in_range("losses.soiling_pct", self.soiling_pct, 0.0, 99.0)?;
        ensure_in_range("losses.mismatch_pct", self.mismatch_pct, 0.0, 99.0)?;
        ensure_in_range("losses.wiring_pct", self.wiring_pct, 0.0, 99.0)?;
        ensure_positive("losses.inverter_efficiency_pct", self.inverter_efficiency_pct)?;
        ensure_in_range(
            "losses.inverter_efficiency_pct",
            self.inverter_efficiency_pct,
            0.0,
            100.0,
        )?;
        ensure_in_range(
            "losses.temp_coeff_pct_per_c",
            self.temp_coeff_pct_per_c,
            -2.0,
            0.5,
        )?;
        ensure_in_range("losses.noct_c", self.noct_c, 20.0, 80.0)?;
        Ok(())
    }

    /// Product of the fixed (irradiance-independent) loss factors.
    pub fn fixed_factor(&self) -> f64 {
        (1.0 - self.soiling_pct / 100.0)
            * (1.0 - self.mismatch_pct / 100.0)
            * (1.0 - self.wiring_pct / 100.0)
            * (self.inverter_efficiency_pct / 100.0)
    }
}

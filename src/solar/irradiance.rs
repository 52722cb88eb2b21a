//! Clear-sky irradiance, plane-of-array transposition and ambient temperature.
//!
//! Everything here is a pure function of a timestamp and a [`SiteConfig`].
//! Night hours (sun elevation at or below zero) produce zero irradiance by
//! construction rather than by clamping a negative intermediate.

use chrono::NaiveDateTime;
use serde::Serialize;

use super::position::{SolarPosition, solar_position};
use super::site::{Plane, SiteConfig};

/// Air mass reported when the sun is at or below the horizon.
pub const NIGHT_AIR_MASS: f64 = 1.0e6;

/// Kasten-Young (1989) relative optical air mass.
pub fn relative_air_mass(elevation_deg: f64) -> f64 {
    if elevation_deg <= 0.0 {
        return NIGHT_AIR_MASS;
    }
    1.0 / (elevation_deg.to_radians().sin()
        + 0.50572 * (elevation_deg + 6.07995).powf(-1.6364))
}

/// Pressure-corrected air mass for a site at `altitude_m`.
pub fn absolute_air_mass(relative: f64, altitude_m: f64) -> f64 {
    relative * (1.0 - 2.25577e-5 * altitude_m).powf(5.25588)
}

/// Extraterrestrial normal irradiance, W/m².
pub fn extraterrestrial_normal(day_of_year: u32) -> f64 {
    let n = f64::from(day_of_year);
    1367.7 * (1.0 + 0.033 * (2.0 * std::f64::consts::PI * n / 365.0).cos())
}

/// Direct-normal, diffuse-horizontal and global-horizontal irradiance, W/m².
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SkyIrradiance {
    pub dni: f64,
    pub dhi: f64,
    pub ghi: f64,
}

impl SkyIrradiance {
    fn scaled(self, k: f64) -> Self {
        Self {
            dni: self.dni * k,
            dhi: self.dhi * k,
            ghi: self.ghi * k,
        }
    }
}

/// Ineichen-Perez clear-sky model.
///
/// `air_mass` is the pressure-corrected air mass; the sun must be up.
pub fn ineichen_clear_sky(
    elevation_deg: f64,
    air_mass: f64,
    altitude_m: f64,
    linke_turbidity: f64,
    day_of_year: u32,
) -> SkyIrradiance {
    if elevation_deg <= 0.0 {
        return SkyIrradiance::default();
    }
    let cos_zenith = elevation_deg.to_radians().sin();
    let tl = linke_turbidity;
    let i0 = extraterrestrial_normal(day_of_year);

    let fh1 = (-altitude_m / 8000.0).exp();
    let fh2 = (-altitude_m / 1250.0).exp();
    let cg1 = 5.09e-5 * altitude_m + 0.868;
    let cg2 = 3.92e-5 * altitude_m + 0.0387;

    let ghi = cg1 * i0 * cos_zenith * (-cg2 * air_mass * (fh1 + fh2 * (tl - 1.0))).exp();

    let b = 0.664 + 0.163 / fh1;
    let beam_a = i0 * (b * (-0.09 * air_mass * (tl - 1.0)).exp()).max(0.0);
    let beam_b = ghi
        * ((1.0 - (0.1 - 0.2 * (-tl).exp()) / (0.1 + 0.882 / fh1)) / cos_zenith).max(0.0);
    let dni = beam_a.min(beam_b);
    let dhi = (ghi - dni * cos_zenith).max(0.0);

    SkyIrradiance { dni, dhi, ghi }
}

/// Irradiance components reaching one sub-array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlaneIrradiance {
    pub plane: Plane,
    /// Angle between the sun and the plane normal, degrees.
    pub aoi_deg: f64,
    pub beam: f64,
    pub sky_diffuse: f64,
    pub ground_reflected: f64,
}

impl PlaneIrradiance {
    pub fn total(&self) -> f64 {
        self.beam + self.sky_diffuse + self.ground_reflected
    }
}

/// Angle of incidence between the sun and a plane's normal, degrees.
pub fn angle_of_incidence(sun: &SolarPosition, plane: &Plane) -> f64 {
    let elev = sun.elevation_deg.to_radians();
    let tilt = plane.tilt_deg.to_radians();
    let daz = (sun.azimuth_deg - plane.azimuth_deg).to_radians();
    let cos_aoi = elev.sin() * tilt.cos() + elev.cos() * tilt.sin() * daz.cos();
    cos_aoi.clamp(-1.0, 1.0).acos().to_degrees()
}

/// Isotropic-sky transposition of `sky` onto `plane`.
pub fn transpose(sky: &SkyIrradiance, sun: &SolarPosition, plane: &Plane, albedo: f64) -> PlaneIrradiance {
    let aoi_deg = angle_of_incidence(sun, plane);
    let tilt = plane.tilt_deg.to_radians();
    PlaneIrradiance {
        plane: *plane,
        aoi_deg,
        beam: sky.dni * aoi_deg.to_radians().cos().max(0.0),
        sky_diffuse: sky.dhi * (1.0 + tilt.cos()) / 2.0,
        ground_reflected: sky.ghi * albedo * (1.0 - tilt.cos()) / 2.0,
    }
}

/// Ambient temperature from the monthly profile plus a diurnal cycle peaking
/// at 15:00 solar time.
pub fn ambient_temperature(site: &SiteConfig, month0: usize, hour_angle_deg: f64) -> f64 {
    let mean = site.monthly_ambient_c[site.seasonal_month(month0)];
    let solar_hour = 12.0 + hour_angle_deg / 15.0;
    let phase = 2.0 * std::f64::consts::PI * (solar_hour - 15.0) / 24.0;
    mean + site.diurnal_swing_c * phase.cos()
}

/// Output of the irradiance model for one hour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IrradianceSample {
    pub sun: SolarPosition,
    pub air_mass: f64,
    /// Clear-sky components before the monthly clearness scaling.
    pub clear_sky: SkyIrradiance,
    /// Typical-sky components used for transposition.
    pub sky: SkyIrradiance,
    /// One entry per sub-array; empty at night.
    pub planes: Vec<PlaneIrradiance>,
    pub ambient_c: f64,
}

impl IrradianceSample {
    /// Share-weighted plane-of-array irradiance, W/m².
    pub fn poa(&self) -> f64 {
        self.planes.iter().map(|p| p.plane.share * p.total()).sum()
    }

    pub fn ghi(&self) -> f64 {
        self.sky.ghi
    }

    pub fn dni(&self) -> f64 {
        self.sky.dni
    }

    pub fn dhi(&self) -> f64 {
        self.sky.dhi
    }
}

/// Irradiance model entry point: everything the production step needs for
/// the hour starting at `ts`.
pub fn irradiance_at(ts: &NaiveDateTime, month0: usize, site: &SiteConfig) -> IrradianceSample {
    let sun = solar_position(ts, site.latitude, site.longitude, site.utc_offset_h);
    let ambient_c = ambient_temperature(site, month0, sun.hour_angle_deg);

    if !sun.is_up() {
        return IrradianceSample {
            sun,
            air_mass: NIGHT_AIR_MASS,
            clear_sky: SkyIrradiance::default(),
            sky: SkyIrradiance::default(),
            planes: Vec::new(),
            ambient_c,
        };
    }

    let air_mass = absolute_air_mass(relative_air_mass(sun.elevation_deg), site.altitude_m);
    let clear_sky = ineichen_clear_sky(
        sun.elevation_deg,
        air_mass,
        site.altitude_m,
        site.linke_turbidity,
        sun.day_of_year,
    );
    let sky = clear_sky.scaled(site.monthly_clearness[site.seasonal_month(month0)]);
    let planes = site
        .planes()
        .iter()
        .map(|plane| transpose(&sky, &sun, plane, site.albedo))
        .collect();

    IrradianceSample {
        sun,
        air_mass,
        clear_sky,
        sky,
        planes,
        ambient_c,
    }
}

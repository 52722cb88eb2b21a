//! Apparent solar position from calendar time and site coordinates.

use chrono::{Datelike, NaiveDateTime};
use serde::Serialize;

use crate::series::mid_hour;

/// Sun position for one instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SolarPosition {
    /// Degrees above the horizon (negative at night).
    pub elevation_deg: f64,
    /// Degrees from north, clockwise.
    pub azimuth_deg: f64,
    pub declination_deg: f64,
    /// Degrees; negative before solar noon.
    pub hour_angle_deg: f64,
    pub day_of_year: u32,
}

impl SolarPosition {
    pub fn is_up(&self) -> bool {
        self.elevation_deg > 0.0
    }
}

/// Cooper (1969) declination for `day_of_year`, using a 365.25-day year.
pub fn declination_deg(day_of_year: f64) -> f64 {
    23.45 * (2.0 * std::f64::consts::PI * (284.0 + day_of_year) / 365.25).sin()
}

/// Equation of time in minutes (Earth's orbital eccentricity and obliquity).
pub fn equation_of_time_min(day_of_year: f64) -> f64 {
    let b = 2.0 * std::f64::consts::PI * (day_of_year - 81.0) / 364.0;
    9.87 * (2.0 * b).sin() - 7.53 * b.cos() - 1.5 * b.sin()
}

/// Solar position at the middle of the hour beginning at `ts`.
///
/// `ts` is read as local clock time at `utc_offset_h`; the longitude and
/// equation-of-time corrections turn it into local solar time.
pub fn solar_position(
    ts: &NaiveDateTime,
    latitude: f64,
    longitude: f64,
    utc_offset_h: f64,
) -> SolarPosition {
    let day_of_year = ts.ordinal();
    let n = f64::from(day_of_year);

    let clock_h = mid_hour(ts);
    let standard_meridian = 15.0 * utc_offset_h;
    let correction_min = 4.0 * (longitude - standard_meridian) + equation_of_time_min(n);
    let solar_time_h = clock_h + correction_min / 60.0;
    let hour_angle_deg = 15.0 * (solar_time_h - 12.0);

    let decl_deg = declination_deg(n);
    let decl = decl_deg.to_radians();
    let lat = latitude.to_radians();
    let omega = hour_angle_deg.to_radians();

    let sin_elev = (lat.sin() * decl.sin() + lat.cos() * decl.cos() * omega.cos()).clamp(-1.0, 1.0);
    let elev = sin_elev.asin();

    let azimuth_deg = if elev.cos().abs() < 1e-9 {
        180.0
    } else {
        let cos_az = (decl.sin() * lat.cos() - decl.cos() * lat.sin() * omega.cos()) / elev.cos();
        let az = cos_az.clamp(-1.0, 1.0).acos().to_degrees();
        if hour_angle_deg > 0.0 { 360.0 - az } else { az }
    };

    SolarPosition {
        elevation_deg: elev.to_degrees(),
        azimuth_deg,
        declination_deg: decl_deg,
        hour_angle_deg,
        day_of_year,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, m, d)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .expect("valid date")
    }

    #[test]
    fn declination_extremes_near_solstices() {
        assert!((declination_deg(172.0) - 23.45).abs() < 0.2);
        assert!((declination_deg(355.0) + 23.45).abs() < 0.2);
        assert!(declination_deg(81.0).abs() < 1.0);
    }

    #[test]
    fn equation_of_time_stays_within_bounds() {
        for n in 1..=365 {
            let e = equation_of_time_min(f64::from(n));
            assert!(e.abs() < 17.5, "EoT out of range on day {n}: {e}");
        }
    }

    #[test]
    fn summer_noon_in_warsaw_is_high_and_south() {
        // 11:00-12:00 UTC+1 spans solar noon at 21°E.
        let pos = solar_position(&at(6, 21, 11), 52.23, 21.01, 1.0);
        assert!(pos.elevation_deg > 58.0 && pos.elevation_deg < 62.0);
        assert!((pos.azimuth_deg - 180.0).abs() < 15.0);
    }

    #[test]
    fn midnight_sun_is_down() {
        let pos = solar_position(&at(6, 21, 0), 52.23, 21.01, 1.0);
        assert!(!pos.is_up());
    }

    #[test]
    fn morning_sun_is_east() {
        let pos = solar_position(&at(6, 21, 6), 52.23, 21.01, 1.0);
        assert!(pos.is_up());
        assert!(pos.azimuth_deg > 45.0 && pos.azimuth_deg < 135.0);
    }
}

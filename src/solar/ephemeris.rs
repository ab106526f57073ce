//! Local solar ephemeris for running without TheSkyX.
//!
//! Horizontal coordinates come from NREL's Solar Position Algorithm with
//! standard-atmosphere refraction. The equatorial position used for RA/Dec
//! slews uses the Astronomical Almanac's short series for the sun's apparent
//! longitude (good to about 0.01° between 1950 and 2050), which is more than
//! enough for a solar telescope whose field of view spans the whole disk.

use chrono::{DateTime, Datelike, Utc};
use solar_positioning::{RefractionCorrection, spa, time::DeltaT};

use super::SunLocator;
use crate::error::{ActionError, ActionResult};
use crate::mount::{Equatorial, Horizontal};

const UNIX_EPOCH_JULIAN_DAY: f64 = 2_440_587.5;
const J2000_JULIAN_DAY: f64 = 2_451_545.0;

// Sea-level standard atmosphere for the refraction correction
const PRESSURE_HPA: f64 = 1013.25;
const TEMPERATURE_C: f64 = 15.0;

/// Sun position computed locally for a fixed observing site.
#[derive(Debug, Clone, Copy)]
pub struct EphemerisLocator {
    latitude: f64,
    longitude: f64,
}

impl EphemerisLocator {
    /// Site latitude and longitude in degrees, east positive.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Apparent equatorial coordinates of the sun at `instant`.
    pub fn equatorial_at(&self, instant: DateTime<Utc>) -> Equatorial {
        sun_equatorial(days_since_j2000(instant))
    }

    /// Topocentric azimuth (north through east) and refracted altitude at `instant`.
    pub fn horizontal_at(&self, instant: DateTime<Utc>) -> ActionResult<Horizontal> {
        let delta_t = DeltaT::estimate_from_date(instant.year(), instant.month())
            .map_err(|e| ActionError::Ephemeris(e.to_string()))?;
        let refraction = RefractionCorrection::new(PRESSURE_HPA, TEMPERATURE_C)
            .map_err(|e| ActionError::Ephemeris(e.to_string()))?;
        let position = spa::solar_position(
            instant,
            self.latitude,
            self.longitude,
            0.0,
            delta_t,
            Some(refraction),
        )
        .map_err(|e| ActionError::Ephemeris(e.to_string()))?;

        Ok(Horizontal {
            azimuth: position.azimuth(),
            altitude: position.elevation_angle(),
        })
    }

    fn check_body(body: &str) -> ActionResult<()> {
        if body.trim().eq_ignore_ascii_case("sun") {
            Ok(())
        } else {
            Err(ActionError::Lookup(body.to_string()))
        }
    }
}

impl SunLocator for EphemerisLocator {
    fn name(&self) -> &'static str {
        "ephemeris"
    }

    fn locate(&self, body: &str) -> ActionResult<Equatorial> {
        Self::check_body(body)?;
        Ok(self.equatorial_at(crate::time::source::now().with_timezone(&Utc)))
    }

    fn current_az_alt(&self, body: &str) -> ActionResult<Horizontal> {
        Self::check_body(body)?;
        self.horizontal_at(crate::time::source::now().with_timezone(&Utc))
    }
}

fn days_since_j2000(instant: DateTime<Utc>) -> f64 {
    let unix = instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_millis()) / 1000.0;
    unix / 86_400.0 + UNIX_EPOCH_JULIAN_DAY - J2000_JULIAN_DAY
}

fn sun_equatorial(days: f64) -> Equatorial {
    let mean_longitude = (280.460 + 0.985_647_4 * days).rem_euclid(360.0);
    let mean_anomaly = (357.528 + 0.985_600_3 * days).rem_euclid(360.0).to_radians();

    let ecliptic_longitude = (mean_longitude
        + 1.915 * mean_anomaly.sin()
        + 0.020 * (2.0 * mean_anomaly).sin())
    .to_radians();
    let obliquity = (23.439 - 0.000_000_4 * days).to_radians();

    let ra = (obliquity.cos() * ecliptic_longitude.sin())
        .atan2(ecliptic_longitude.cos())
        .to_degrees()
        .rem_euclid(360.0);
    let dec = (obliquity.sin() * ecliptic_longitude.sin()).asin().to_degrees();

    Equatorial {
        ra_hours: ra / 15.0,
        dec_degrees: dec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_sun_at_j2000() {
        let eq = EphemerisLocator::new(0.0, 0.0).equatorial_at(utc(2000, 1, 1, 12));
        assert!((eq.ra_hours - 18.75).abs() < 0.02, "ra = {}", eq.ra_hours);
        assert!((eq.dec_degrees + 23.03).abs() < 0.05, "dec = {}", eq.dec_degrees);
    }

    #[test]
    fn test_equinox_noon_on_equator_is_near_zenith() {
        let locator = EphemerisLocator::new(0.0, 0.0);
        let eq = locator.equatorial_at(utc(2024, 3, 20, 12));
        let hz = locator.horizontal_at(utc(2024, 3, 20, 12)).unwrap();
        assert!(eq.dec_degrees.abs() < 0.5);
        assert!(hz.altitude > 80.0, "alt = {}", hz.altitude);
    }

    #[test]
    fn test_southern_winter_noon_faces_north() {
        // Sao Paulo, local noon at the June solstice
        let hz = EphemerisLocator::new(-23.0, -46.6)
            .horizontal_at(utc(2024, 6, 21, 15))
            .unwrap();
        assert!(hz.altitude > 40.0 && hz.altitude < 47.0, "alt = {}", hz.altitude);
        assert!(hz.azimuth < 15.0 || hz.azimuth > 345.0, "az = {}", hz.azimuth);
    }

    #[test]
    fn test_northern_summer_noon_faces_south() {
        let hz = EphemerisLocator::new(51.5, 0.0)
            .horizontal_at(utc(2024, 6, 21, 12))
            .unwrap();
        assert!((hz.azimuth - 180.0).abs() < 5.0, "az = {}", hz.azimuth);
        assert!((hz.altitude - 62.0).abs() < 1.0, "alt = {}", hz.altitude);
    }

    #[test]
    fn test_noon_altitude_matches_declination() {
        let locator = EphemerisLocator::new(51.5, 0.0);
        let eq = locator.equatorial_at(utc(2024, 6, 21, 12));
        let hz = locator.horizontal_at(utc(2024, 6, 21, 12)).unwrap();
        let expected = 90.0 - 51.5 + eq.dec_degrees;
        assert!((hz.altitude - expected).abs() < 0.3, "alt = {} vs {expected}", hz.altitude);
    }

    #[test]
    fn test_invalid_site_is_an_ephemeris_error() {
        let locator = EphemerisLocator::new(123.0, 0.0);
        assert!(matches!(
            locator.horizontal_at(utc(2024, 6, 21, 12)),
            Err(ActionError::Ephemeris(_))
        ));
    }

    #[test]
    fn test_only_the_sun_resolves() {
        let locator = EphemerisLocator::new(0.0, 0.0);
        assert!(locator.locate("Sun").is_ok());
        assert!(locator.current_az_alt("sun").is_ok());
        assert!(matches!(locator.locate("Moon"), Err(ActionError::Lookup(_))));
    }
}

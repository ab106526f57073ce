//! Sun position lookups.
//!
//! The scheduler resolves its target through a [`SunLocator`] every time it
//! points the mount, so the position is always computed "right now".

pub mod ephemeris;

pub use ephemeris::EphemerisLocator;

use anyhow::{Result, bail};

use crate::config::{Config, Locator};
use crate::error::ActionResult;
use crate::mount::skyx::{SkyXClient, SkyXLocator};
use crate::mount::{Equatorial, Horizontal};

/// Resolves a named body to its current coordinates.
pub trait SunLocator {
    fn name(&self) -> &'static str;

    /// Equatorial coordinates of date, or `ActionError::Lookup` for unknown bodies.
    fn locate(&self, body: &str) -> ActionResult<Equatorial>;

    /// Horizontal coordinates as seen from the observing site.
    fn current_az_alt(&self, body: &str) -> ActionResult<Horizontal>;
}

/// Create the locator selected by `locator` in the configuration.
pub fn create_locator(config: &Config) -> Result<Box<dyn SunLocator>> {
    match config.locator() {
        Locator::SkyX => Ok(Box::new(SkyXLocator::new(SkyXClient::new(
            config.skyx_host(),
            config.skyx_port(),
        )))),
        Locator::Ephemeris => {
            let (Some(latitude), Some(longitude)) = (config.latitude, config.longitude) else {
                bail!("locator = \"ephemeris\" requires latitude and longitude");
            };
            Ok(Box::new(EphemerisLocator::new(latitude, longitude)))
        }
    }
}

/// A locator that always answers with the same coordinates.
#[cfg(any(test, feature = "testing-support"))]
#[derive(Debug, Clone)]
pub struct FixedLocator {
    pub body: String,
    pub equatorial: Equatorial,
    pub horizontal: Horizontal,
}

#[cfg(any(test, feature = "testing-support"))]
impl FixedLocator {
    pub fn sun() -> Self {
        Self {
            body: crate::common::constants::DEFAULT_TARGET.to_string(),
            equatorial: Equatorial {
                ra_hours: 6.0,
                dec_degrees: 23.4,
            },
            horizontal: Horizontal {
                azimuth: 180.0,
                altitude: 45.0,
            },
        }
    }
}

#[cfg(any(test, feature = "testing-support"))]
impl SunLocator for FixedLocator {
    fn name(&self) -> &'static str {
        "fixed"
    }

    fn locate(&self, body: &str) -> ActionResult<Equatorial> {
        if body.eq_ignore_ascii_case(&self.body) {
            Ok(self.equatorial)
        } else {
            Err(crate::error::ActionError::Lookup(body.to_string()))
        }
    }

    fn current_az_alt(&self, body: &str) -> ActionResult<Horizontal> {
        self.locate(body).map(|_| self.horizontal)
    }
}

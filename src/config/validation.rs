//! Configuration validation functionality.
//!
//! Checks each field against its range first so the error names the key the
//! user has to fix, then builds the schedule to catch ordering problems.

use anyhow::{Result, bail};

use super::{Config, Locator, parse_clock_time};
use crate::common::constants::*;

/// Reject configurations the scheduler could not run with.
pub fn validate_config(config: &Config) -> Result<()> {
    validate_time_fields(config)?;

    if let Some(interval) = config.tick_interval
        && !(MINIMUM_TICK_INTERVAL..=MAXIMUM_TICK_INTERVAL).contains(&interval)
    {
        bail!(
            "tick_interval ({interval} s) must be between {MINIMUM_TICK_INTERVAL} and {MAXIMUM_TICK_INTERVAL} seconds"
        );
    }

    if let Some(timeout) = config.slew_timeout
        && !(MINIMUM_SLEW_TIMEOUT..=MAXIMUM_SLEW_TIMEOUT).contains(&timeout)
    {
        bail!(
            "slew_timeout ({timeout} s) must be between {MINIMUM_SLEW_TIMEOUT} and {MAXIMUM_SLEW_TIMEOUT} seconds"
        );
    }

    if config.target().trim().is_empty() {
        bail!("target must not be empty");
    }

    if config.skyx_port == Some(0) {
        bail!("skyx_port must not be 0");
    }

    for (name, rate) in [
        ("tracking_ra_rate", config.tracking_ra_rate),
        ("tracking_dec_rate", config.tracking_dec_rate),
    ] {
        if let Some(rate) = rate
            && !rate.is_finite()
        {
            bail!("{name} must be a finite number");
        }
    }

    validate_coordinates(config)?;

    config.schedule_timezone()?;

    for window in config.calibration_windows.iter().flatten() {
        parse_clock_time(&window.start)?;
        parse_clock_time(&window.end)?;
        if !window.azimuth_offset.is_finite()
            || window.azimuth_offset.abs() > MAXIMUM_AZIMUTH_OFFSET
        {
            bail!(
                "azimuth_offset ({}) of calibration window {} must be within ±{MAXIMUM_AZIMUTH_OFFSET} degrees",
                window.azimuth_offset,
                window.start
            );
        }
    }

    // Simulator fault times must parse even when another device is selected
    config.simulator_options()?;

    // Ordering of start, flip, turn off and the calibration windows
    config.schedule()?;

    Ok(())
}

fn validate_time_fields(config: &Config) -> Result<()> {
    let hours = [
        ("start_hour", config.start_hour),
        ("flip_hour", config.flip_hour),
        ("turn_off_hour", config.turn_off_hour),
    ];
    for (name, value) in hours {
        if let Some(hour) = value
            && hour > 23
        {
            bail!("{name} ({hour}) must be between 0 and 23");
        }
    }

    let minutes = [
        ("start_minutes", config.start_minutes),
        ("start_seconds", config.start_seconds),
        ("flip_minutes", config.flip_minutes),
        ("turn_off_minutes", config.turn_off_minutes),
    ];
    for (name, value) in minutes {
        if let Some(value) = value
            && value > 59
        {
            bail!("{name} ({value}) must be between 0 and 59");
        }
    }

    Ok(())
}

fn validate_coordinates(config: &Config) -> Result<()> {
    if let Some(lat) = config.latitude
        && !(MINIMUM_LATITUDE..=MAXIMUM_LATITUDE).contains(&lat)
    {
        bail!("latitude must be between -90 and 90 degrees (got {lat})");
    }

    if let Some(lon) = config.longitude
        && !(MINIMUM_LONGITUDE..=MAXIMUM_LONGITUDE).contains(&lon)
    {
        bail!("longitude must be between -180 and 180 degrees (got {lon})");
    }

    if config.locator() == Locator::Ephemeris
        && (config.latitude.is_none() || config.longitude.is_none())
    {
        bail!("locator = \"ephemeris\" requires latitude and longitude");
    }

    Ok(())
}

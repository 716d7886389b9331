use anyhow::{Result, anyhow};
use url::Url;

use crate::database::models::{DEFAULT_CHECK_INTERVAL_MINUTES, NewTarget, TargetUpdate};

/// Longest accepted display name, in characters
pub const MAX_DISPLAY_NAME_LEN: usize = 200;

/// Registration input after trimming, defaulting and validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidTarget {
    pub address: String,
    pub display_name: Option<String>,
    pub check_interval_minutes: u32,
}

/// Validate an HTTP/HTTPS address and return it trimmed
pub fn validate_address(address: &str) -> Result<String> {
    let address = address.trim();
    if address.is_empty() {
        return Err(anyhow!("Address cannot be empty"));
    }

    let url = Url::parse(address).map_err(|e| {
        if address.contains("://") {
            anyhow!("Invalid URL: {e}")
        } else {
            anyhow!("URL must include scheme (http:// or https://)")
        }
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid scheme '{other}'. Must be http or https")),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(anyhow!("URL must have a valid host"));
    }

    Ok(address.to_string())
}

/// Validate a check interval, at least one minute
pub fn validate_interval(minutes: u32) -> Result<u32> {
    if minutes == 0 {
        return Err(anyhow!("Check interval must be at least 1 minute"));
    }
    Ok(minutes)
}

/// Trim a display name, blank names count as absent
pub fn normalize_display_name(name: Option<&str>) -> Result<Option<String>> {
    let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };

    if name.chars().count() > MAX_DISPLAY_NAME_LEN {
        return Err(anyhow!("Display name must be at most {MAX_DISPLAY_NAME_LEN} characters"));
    }
    Ok(Some(name.to_string()))
}

/// Host part of an address, used as the default display name
pub fn default_display_name(address: &str) -> Option<String> {
    let url = Url::parse(address).ok()?;
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Validate registration input and fill in defaults
pub fn validate_new_target(input: &NewTarget) -> Result<ValidTarget> {
    let address = validate_address(&input.address)?;
    let display_name = normalize_display_name(input.display_name.as_deref())?
        .or_else(|| default_display_name(&address));
    let check_interval_minutes =
        validate_interval(input.check_interval_minutes.unwrap_or(DEFAULT_CHECK_INTERVAL_MINUTES))?;

    Ok(ValidTarget { address, display_name, check_interval_minutes })
}

/// Validate an edit; blank names are dropped rather than clearing the label
pub fn validate_update(update: &TargetUpdate) -> Result<TargetUpdate> {
    let check_interval_minutes = update.check_interval_minutes.map(validate_interval).transpose()?;
    let display_name = normalize_display_name(update.display_name.as_deref())?;

    Ok(TargetUpdate { display_name, check_interval_minutes })
}

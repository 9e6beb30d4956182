//! Conversions between byte counts and human-readable size strings

use anyhow::Result;
use num_format::{Locale, ToFormattedString};

const UNITS: [&str; 9] = ["B", "KB", "MB", "GB", "TB", "PB", "EB", "ZB", "YB"];

/// Convert bytes to human-readable format (e.g., "1.50 GB")
pub fn bytes_to_pretty(bytes: &u64, add_bytes: bool) -> String {
    let mut steps = 0;
    let mut val: f64 = *bytes as f64;

    while val > 1024. && steps < UNITS.len() - 1 {
        val /= 1024.;
        steps += 1;
    }

    let unit = UNITS[steps];

    if add_bytes {
        let bytes_str = bytes.to_formatted_string(&Locale::en);
        format!("{:.2} {} ({} bytes)", val, unit, bytes_str)
    } else {
        format!("{:.2} {}", val, unit)
    }
}

/// Parse a human-readable size to bytes.
///
/// Accepts `700`, `700m`, `700 MB`, `700 MiB` or `1.5 GB`. Every unit is a
/// binary multiple, so `1 KB`, `1 KiB` and `1k` are all 1024 bytes.
pub fn pretty_to_bytes(pretty: &str) -> Result<u64> {
    let pretty = pretty.trim();
    let split_at = pretty
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(pretty.len());
    let (number, unit) = pretty.split_at(split_at);

    if number.is_empty() {
        return Err(anyhow::anyhow!("Invalid size: '{}'", pretty));
    }

    let mut val: f64 = number.parse()?;
    if !val.is_finite() {
        return Err(anyhow::anyhow!("Invalid size: '{}'", pretty));
    }

    let mut steps = unit_steps(unit.trim())
        .ok_or_else(|| anyhow::anyhow!("Invalid unit: {}", unit.trim()))?;

    while steps > 0 {
        val *= 1024.;
        steps -= 1;
    }

    if val >= u64::MAX as f64 {
        return Ok(u64::MAX);
    }

    Ok(val.trunc() as u64)
}

fn unit_steps(unit: &str) -> Option<u32> {
    let unit = unit.to_ascii_uppercase();
    let unit = match unit.strip_suffix("IB") {
        // binary suffix needs a prefix, "iB" alone is not a unit
        Some("") => return None,
        Some(prefix) => prefix,
        None => unit.strip_suffix('B').unwrap_or(unit.as_str()),
    };

    match unit {
        "" => Some(0),
        "K" => Some(1),
        "M" => Some(2),
        "G" => Some(3),
        "T" => Some(4),
        "P" => Some(5),
        _ => None,
    }
}

//! Built-in helpers available to every conversion template.

use chrono::{NaiveDate, NaiveTime};
use handlebars::{Context, Handlebars, Helper, HelperResult, Output, RenderContext, RenderError};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub fn register_builtin_helpers(handlebars: &mut Handlebars<'static>) {
    handlebars.register_helper("generate_uuid", Box::new(generate_uuid_helper));
    handlebars.register_helper("format_as_date_time", Box::new(format_as_date_time_helper));
    handlebars.register_helper("json", Box::new(json_helper));
    handlebars.register_helper("escape_json", Box::new(escape_json_helper));
    handlebars.register_helper("upcase", Box::new(upcase_helper));
    handlebars.register_helper("downcase", Box::new(downcase_helper));
    handlebars.register_helper("trim", Box::new(trim_helper));
    handlebars.register_helper("default", Box::new(default_helper));
}

fn param_text(h: &Helper, index: usize) -> String {
    match h.param(index).map(|v| v.value()) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn generate_uuid_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let seed = param_text(h, 0);
    if seed.trim().is_empty() {
        return Ok(());
    }
    out.write(&generate_uuid(&seed))?;
    Ok(())
}

fn format_as_date_time_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let value = param_text(h, 0);
    if value.trim().is_empty() {
        return Ok(());
    }
    let formatted = format_as_date_time(&value)
        .ok_or_else(|| RenderError::new(format!("Invalid HL7v2 date time: '{value}'")))?;
    out.write(&formatted)?;
    Ok(())
}

fn json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let value = h.param(0).map(|v| v.value().clone()).unwrap_or(Value::Null);
    out.write(&value.to_string())?;
    Ok(())
}

fn escape_json_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&escape_json(&param_text(h, 0)))?;
    Ok(())
}

fn upcase_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_text(h, 0).to_uppercase())?;
    Ok(())
}

fn downcase_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(&param_text(h, 0).to_lowercase())?;
    Ok(())
}

fn trim_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(param_text(h, 0).trim())?;
    Ok(())
}

fn default_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let value = param_text(h, 0);
    if value.is_empty() {
        out.write(&param_text(h, 1))?;
    } else {
        out.write(&value)?;
    }
    Ok(())
}

/// Deterministic UUID derived from the SHA-256 digest of `seed`.
///
/// The same seed always yields the same id, which lets separate templates
/// reference a resource without sharing state.
pub fn generate_uuid(seed: &str) -> String {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&digest[..16]);
    uuid::Builder::from_random_bytes(bytes)
        .into_uuid()
        .to_string()
}

/// JSON string escaping without the surrounding quotes.
pub fn escape_json(value: &str) -> String {
    let quoted = Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

/// Convert an HL7v2 `DTM` value (`YYYY[MM[DD[HH[MM[SS[.S+]]]]]][+/-ZZZZ]`)
/// into a FHIR `dateTime`, keeping the precision of the source.
///
/// Returns `None` when the value is not a valid timestamp.
pub fn format_as_date_time(value: &str) -> Option<String> {
    let value = value.trim();
    let (stamp, offset) = match value.find(['+', '-']) {
        Some(index) => (&value[..index], Some(format_offset(&value[index..])?)),
        None => (value, None),
    };

    let (digits, fraction) = match stamp.split_once('.') {
        Some((digits, fraction)) => (digits, Some(fraction)),
        None => (stamp, None),
    };

    if !digits.chars().all(|c| c.is_ascii_digit())
        || !matches!(digits.len(), 4 | 6 | 8 | 10 | 12 | 14)
    {
        return None;
    }
    if fraction.is_some_and(|f| {
        f.is_empty() || !f.chars().all(|c| c.is_ascii_digit()) || digits.len() != 14
    }) {
        return None;
    }

    let part = |range: std::ops::Range<usize>| digits[range].parse::<u32>().ok();
    let year = digits[0..4].parse::<i32>().ok()?;

    let mut formatted = format!("{year:04}");
    if digits.len() == 4 {
        return Some(formatted);
    }

    let month = part(4..6)?;
    if !(1..=12).contains(&month) {
        return None;
    }
    formatted.push_str(&format!("-{month:02}"));
    if digits.len() == 6 {
        return Some(formatted);
    }

    let day = part(6..8)?;
    NaiveDate::from_ymd_opt(year, month, day)?;
    formatted.push_str(&format!("-{day:02}"));
    if digits.len() == 8 {
        return Some(formatted);
    }

    let hour = part(8..10)?;
    let minute = if digits.len() >= 12 { part(10..12)? } else { 0 };
    let second = if digits.len() >= 14 { part(12..14)? } else { 0 };
    NaiveTime::from_hms_opt(hour, minute, second)?;
    formatted.push_str(&format!("T{hour:02}:{minute:02}:{second:02}"));
    if let Some(fraction) = fraction {
        formatted.push('.');
        formatted.push_str(fraction);
    }

    if let Some(offset) = offset {
        formatted.push_str(&offset);
    }

    Some(formatted)
}

/// `+ZZZZ` / `-ZZZZ` as `+ZZ:ZZ`.
fn format_offset(offset: &str) -> Option<String> {
    let (sign, zone) = offset.split_at(1);
    if zone.len() != 4 || !zone.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let (hours, minutes) = zone.split_at(2);
    if hours.parse::<u32>().ok()? > 14 || minutes.parse::<u32>().ok()? > 59 {
        return None;
    }
    Some(format!("{sign}{hours}:{minutes}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_uuid_is_deterministic() {
        let first = generate_uuid("PID|1||12345");
        let second = generate_uuid("PID|1||12345");
        let other = generate_uuid("PID|1||67890");

        assert_eq!(first, second);
        assert_ne!(first, other);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn test_format_as_date_time_precision() {
        assert_eq!(format_as_date_time("2021").as_deref(), Some("2021"));
        assert_eq!(format_as_date_time("202103").as_deref(), Some("2021-03"));
        assert_eq!(format_as_date_time("20210314").as_deref(), Some("2021-03-14"));
        assert_eq!(
            format_as_date_time("2021031415").as_deref(),
            Some("2021-03-14T15:00:00")
        );
        assert_eq!(
            format_as_date_time("20210314153000+0100").as_deref(),
            Some("2021-03-14T15:30:00+01:00")
        );
        assert_eq!(
            format_as_date_time("20210314153000.123-0500").as_deref(),
            Some("2021-03-14T15:30:00.123-05:00")
        );
    }

    #[test]
    fn test_format_as_date_time_rejects_invalid() {
        assert_eq!(format_as_date_time("20211340"), None);
        assert_eq!(format_as_date_time("2021031425"), None);
        assert_eq!(format_as_date_time("abc"), None);
        assert_eq!(format_as_date_time("20210314+01"), None);
    }

    #[test]
    fn test_escape_json() {
        assert_eq!(escape_json(r#"say "hi"\now"#), r#"say \"hi\"\\now"#);
        assert_eq!(escape_json("line\nbreak"), "line\\nbreak");
    }
}

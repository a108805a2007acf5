//! Built-in conversion service.
//!
//! One deterministic function per catalog kind, each returning a value or
//! `None` for an unrepresentable input, never failing. Dispatch is a direct
//! match on the target [`ValueKind`]; callers fall through to custom
//! converters and nested mapping when a function declines.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeDelta};

use crate::value::{Decimal, TextEncoding, Uuid, Value, ValueKind};

/// Convert `value` to the catalog kind `target`. `None` means the catalog
/// has no converter for `target` or the value is not representable.
pub fn convert_builtin(target: ValueKind, value: &Value) -> Option<Value> {
    match target {
        ValueKind::Str => to_str(value).map(Value::Str),
        ValueKind::Bool => to_bool(value).map(Value::Bool),
        ValueKind::I8 => to_i128(value).and_then(|n| i8::try_from(n).ok()).map(Value::I8),
        ValueKind::I16 => to_i128(value).and_then(|n| i16::try_from(n).ok()).map(Value::I16),
        ValueKind::I32 => to_i128(value).and_then(|n| i32::try_from(n).ok()).map(Value::I32),
        ValueKind::I64 => to_i128(value).and_then(|n| i64::try_from(n).ok()).map(Value::I64),
        ValueKind::U8 => to_i128(value).and_then(|n| u8::try_from(n).ok()).map(Value::U8),
        ValueKind::U16 => to_i128(value).and_then(|n| u16::try_from(n).ok()).map(Value::U16),
        ValueKind::U32 => to_i128(value).and_then(|n| u32::try_from(n).ok()).map(Value::U32),
        ValueKind::U64 => to_i128(value).and_then(|n| u64::try_from(n).ok()).map(Value::U64),
        ValueKind::F32 => to_f64(value).map(|f| Value::F32(f as f32)),
        ValueKind::F64 => to_f64(value).map(Value::F64),
        ValueKind::Decimal => to_decimal(value).map(Value::Decimal),
        ValueKind::Uuid => to_uuid(value).map(Value::Uuid),
        ValueKind::Duration => to_duration(value).map(Value::Duration),
        ValueKind::Timestamp => to_timestamp(value).map(Value::Timestamp),
        ValueKind::TimestampTz => to_timestamp_tz(value).map(Value::TimestampTz),
        ValueKind::Encoding => to_encoding(value).map(Value::Encoding),
        _ => None,
    }
}

/// Enumeration conversion: case-insensitive variant-name match.
pub fn convert_enum(variants: &[&'static str], value: &Value) -> Option<Value> {
    let name = match value {
        Value::Str(s) => s.as_str(),
        Value::Enum(s) => s.as_str(),
        _ => return None,
    };
    variants
        .iter()
        .find(|v| v.eq_ignore_ascii_case(name))
        .map(|v| Value::Enum((*v).to_string()))
}

pub fn to_str(value: &Value) -> Option<String> {
    match value {
        Value::Bool(b) => Some(b.to_string()),
        Value::I8(n) => Some(n.to_string()),
        Value::I16(n) => Some(n.to_string()),
        Value::I32(n) => Some(n.to_string()),
        Value::I64(n) => Some(n.to_string()),
        Value::U8(n) => Some(n.to_string()),
        Value::U16(n) => Some(n.to_string()),
        Value::U32(n) => Some(n.to_string()),
        Value::U64(n) => Some(n.to_string()),
        Value::F32(n) => Some(n.to_string()),
        Value::F64(n) => Some(n.to_string()),
        Value::Decimal(d) => Some(d.to_string()),
        Value::Uuid(u) => Some(u.to_string()),
        Value::Duration(d) => Some(format_duration(*d)),
        Value::Timestamp(t) => Some(t.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
        Value::TimestampTz(t) => Some(t.to_rfc3339()),
        Value::Encoding(e) => Some(e.label().to_string()),
        Value::Str(s) => Some(s.clone()),
        Value::Enum(s) => Some(s.clone()),
        _ => None,
    }
}

pub fn to_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => to_i128(value).map(|n| n != 0),
    }
}

/// Common integer funnel for all signed and unsigned widths.
pub fn to_i128(value: &Value) -> Option<i128> {
    match value {
        Value::Bool(b) => Some(*b as i128),
        Value::I8(n) => Some(*n as i128),
        Value::I16(n) => Some(*n as i128),
        Value::I32(n) => Some(*n as i128),
        Value::I64(n) => Some(*n as i128),
        Value::U8(n) => Some(*n as i128),
        Value::U16(n) => Some(*n as i128),
        Value::U32(n) => Some(*n as i128),
        Value::U64(n) => Some(*n as i128),
        Value::F32(n) => float_to_i128(*n as f64),
        Value::F64(n) => float_to_i128(*n),
        Value::Decimal(d) => d.to_i128_exact(),
        Value::Str(s) => {
            let s = s.trim();
            s.parse::<i128>()
                .ok()
                .or_else(|| Decimal::parse(s)?.to_i128_exact())
        }
        _ => None,
    }
}

fn float_to_i128(f: f64) -> Option<i128> {
    if f.is_finite() && f.fract() == 0.0 && (i64::MIN as f64..=i64::MAX as f64).contains(&f) {
        Some(f as i128)
    } else {
        None
    }
}

pub fn to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::F32(n) => Some(*n as f64),
        Value::F64(n) => Some(*n),
        Value::Decimal(d) => Some(d.to_f64()),
        Value::Str(s) => s.trim().parse::<f64>().ok(),
        Value::I8(_)
        | Value::I16(_)
        | Value::I32(_)
        | Value::I64(_)
        | Value::U8(_)
        | Value::U16(_)
        | Value::U32(_)
        | Value::U64(_) => to_i128(value).map(|n| n as f64),
        _ => None,
    }
}

pub fn to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Decimal(d) => Some(*d),
        Value::Str(s) => Decimal::parse(s),
        Value::F32(n) => Decimal::parse(&n.to_string()),
        Value::F64(n) => Decimal::parse(&n.to_string()),
        _ => to_i128(value).map(|n| Decimal::new(n, 0)),
    }
}

pub fn to_uuid(value: &Value) -> Option<Uuid> {
    match value {
        Value::Uuid(u) => Some(*u),
        Value::Str(s) => Uuid::parse(s),
        _ => None,
    }
}

pub fn to_duration(value: &Value) -> Option<TimeDelta> {
    match value {
        Value::Duration(d) => Some(*d),
        Value::Str(s) => parse_duration(s),
        Value::F32(n) => seconds_to_delta(*n as f64),
        Value::F64(n) => seconds_to_delta(*n),
        _ => to_i128(value).and_then(|n| TimeDelta::new(i64::try_from(n).ok()?, 0)),
    }
}

pub fn to_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::Timestamp(t) => Some(*t),
        Value::TimestampTz(t) => Some(t.naive_utc()),
        Value::Str(s) => parse_timestamp(s),
        _ => None,
    }
}

pub fn to_timestamp_tz(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::TimestampTz(t) => Some(*t),
        Value::Timestamp(t) => t.and_local_timezone(FixedOffset::east_opt(0)?).single(),
        Value::Str(s) => DateTime::parse_from_rfc3339(s.trim()).ok(),
        _ => None,
    }
}

pub fn to_encoding(value: &Value) -> Option<TextEncoding> {
    match value {
        Value::Encoding(e) => Some(*e),
        Value::Str(s) => TextEncoding::from_label(s),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Time parsing / formatting helpers
// ---------------------------------------------------------------------------

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.naive_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(t) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(t);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// `"HH:MM:SS[.frac]"` or a plain second count.
fn parse_duration(s: &str) -> Option<TimeDelta> {
    let s = s.trim();
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s),
    };
    let delta = if s.contains(':') {
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() != 3 {
            return None;
        }
        let hours: i64 = parts[0].parse().ok()?;
        let minutes: i64 = parts[1].parse().ok()?;
        if minutes >= 60 {
            return None;
        }
        let seconds: f64 = parts[2].parse().ok()?;
        if !(0.0..60.0).contains(&seconds) {
            return None;
        }
        seconds_to_delta(hours as f64 * 3600.0 + minutes as f64 * 60.0 + seconds)?
    } else {
        seconds_to_delta(s.parse::<f64>().ok()?)?
    };
    Some(if negative { -delta } else { delta })
}

fn seconds_to_delta(seconds: f64) -> Option<TimeDelta> {
    if !seconds.is_finite() {
        return None;
    }
    let negative = seconds < 0.0;
    let abs = seconds.abs();
    if abs.trunc() >= i64::MAX as f64 {
        return None;
    }
    let mut whole = abs.trunc() as i64;
    let mut nanos = (abs.fract() * 1e9).round() as u32;
    if nanos >= 1_000_000_000 {
        whole = whole.checked_add(1)?;
        nanos = 0;
    }
    let delta = TimeDelta::new(whole, nanos)?;
    Some(if negative { -delta } else { delta })
}

fn format_duration(d: TimeDelta) -> String {
    let total = d.num_seconds();
    let sign = if total < 0 || (total == 0 && d.subsec_nanos() < 0) {
        "-"
    } else {
        ""
    };
    let abs = total.unsigned_abs();
    let (h, m, s) = (abs / 3600, (abs % 3600) / 60, abs % 60);
    let nanos = d.subsec_nanos().unsigned_abs();
    if nanos == 0 {
        format!("{sign}{h}:{m:02}:{s:02}")
    } else {
        format!("{sign}{h}:{m:02}:{s:02}.{:09}", nanos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integer_narrowing_respects_range() {
        assert_eq!(convert_builtin(ValueKind::I8, &Value::I64(42)), Some(Value::I8(42)));
        assert_eq!(convert_builtin(ValueKind::I8, &Value::I64(300)), None);
        assert_eq!(convert_builtin(ValueKind::U32, &Value::I64(-1)), None);
        assert_eq!(
            convert_builtin(ValueKind::U64, &Value::Str("18".into())),
            Some(Value::U64(18))
        );
    }

    #[test]
    fn floats_become_integers_only_when_whole() {
        assert_eq!(convert_builtin(ValueKind::I32, &Value::F64(5.0)), Some(Value::I32(5)));
        assert_eq!(convert_builtin(ValueKind::I32, &Value::F64(5.5)), None);
    }

    #[test]
    fn text_round_trips() {
        assert_eq!(
            convert_builtin(ValueKind::Str, &Value::Bool(true)),
            Some(Value::Str("true".into()))
        );
        assert_eq!(
            convert_builtin(ValueKind::Bool, &Value::Str("TRUE".into())),
            Some(Value::Bool(true))
        );
        assert_eq!(
            convert_builtin(ValueKind::Decimal, &Value::Str("12.50".into())),
            Some(Value::Decimal(Decimal::new(1250, 2)))
        );
        assert_eq!(convert_builtin(ValueKind::Bool, &Value::Str("maybe".into())), None);
    }

    #[test]
    fn timestamps_parse_common_shapes() {
        let t = to_timestamp(&Value::Str("2024-03-01T12:30:00".into())).unwrap();
        assert_eq!(t.format("%H:%M").to_string(), "12:30");

        let t = to_timestamp(&Value::Str("2024-03-01 12:30:00".into())).unwrap();
        assert_eq!(t.format("%Y-%m-%d").to_string(), "2024-03-01");

        let t = to_timestamp(&Value::Str("2024-03-01".into())).unwrap();
        assert_eq!(t.format("%H:%M:%S").to_string(), "00:00:00");

        let tz = to_timestamp_tz(&Value::Str("2024-03-01T12:30:00+02:00".into())).unwrap();
        assert_eq!(tz.offset().local_minus_utc(), 2 * 3600);

        assert!(to_timestamp(&Value::Str("yesterday".into())).is_none());
    }

    #[test]
    fn durations_parse_and_format() {
        let d = to_duration(&Value::Str("1:30:05".into())).unwrap();
        assert_eq!(d.num_seconds(), 5405);
        assert_eq!(format_duration(d), "1:30:05");

        let d = to_duration(&Value::I64(90)).unwrap();
        assert_eq!(d.num_seconds(), 90);

        assert!(to_duration(&Value::Str("1:99:00".into())).is_none());
    }

    #[test]
    fn enum_matches_by_name() {
        const VARIANTS: &[&str] = &["Red", "Green", "Blue"];
        assert_eq!(
            convert_enum(VARIANTS, &Value::Str("green".into())),
            Some(Value::Enum("Green".into()))
        );
        assert_eq!(convert_enum(VARIANTS, &Value::Str("Purple".into())), None);
        assert_eq!(convert_enum(VARIANTS, &Value::I64(1)), None);
    }

    #[test]
    fn catalog_declines_unknown_shapes() {
        assert_eq!(convert_builtin(ValueKind::Uuid, &Value::I64(5)), None);
        assert_eq!(convert_builtin(ValueKind::List, &Value::I64(5)), None);
    }
}

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeDelta};

/// Canonical dynamic value moved between properties.
///
/// Strategy by kind:
/// - numeric scalars: eager, fixed layout
/// - `Decimal`: `(unscaled, scale)` pair, no float round-trip
/// - time kinds: chrono types, the conversion catalog needs calendar parsing
/// - `List` / `Map`: recursive
/// - `Opaque`: type-erased custom scalar, only custom converters understand it
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Decimal(Decimal),
    Uuid(Uuid),
    /// Time interval.
    Duration(TimeDelta),
    /// Wall-clock timestamp without an offset.
    Timestamp(NaiveDateTime),
    /// Timestamp with a fixed UTC offset.
    TimestampTz(DateTime<FixedOffset>),
    /// Character-encoding identifier.
    Encoding(TextEncoding),
    Str(String),
    /// Enumeration value, carried as its variant name.
    Enum(String),
    List(Vec<Value>),
    Map(Vec<(String, Value)>),
    Opaque(OpaqueValue),
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::I8(_) => ValueKind::I8,
            Value::I16(_) => ValueKind::I16,
            Value::I32(_) => ValueKind::I32,
            Value::I64(_) => ValueKind::I64,
            Value::U8(_) => ValueKind::U8,
            Value::U16(_) => ValueKind::U16,
            Value::U32(_) => ValueKind::U32,
            Value::U64(_) => ValueKind::U64,
            Value::F32(_) => ValueKind::F32,
            Value::F64(_) => ValueKind::F64,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Uuid(_) => ValueKind::Uuid,
            Value::Duration(_) => ValueKind::Duration,
            Value::Timestamp(_) => ValueKind::Timestamp,
            Value::TimestampTz(_) => ValueKind::TimestampTz,
            Value::Encoding(_) => ValueKind::Encoding,
            Value::Str(_) => ValueKind::Str,
            Value::Enum(_) => ValueKind::Enum,
            Value::List(_) => ValueKind::List,
            Value::Map(_) => ValueKind::Map,
            Value::Opaque(_) => ValueKind::Opaque,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Kind tag of a [`Value`]. Used for dispatch and plan resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Null,
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Decimal,
    Uuid,
    Duration,
    Timestamp,
    TimestampTz,
    Encoding,
    Str,
    Enum,
    List,
    Map,
    Opaque,
}

impl ValueKind {
    /// Kinds the built-in conversion service has a converter for.
    pub fn in_catalog(self) -> bool {
        !matches!(
            self,
            ValueKind::Null | ValueKind::Enum | ValueKind::List | ValueKind::Map | ValueKind::Opaque
        )
    }
}

/// Fixed-point decimal: `unscaled * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    pub unscaled: i128,
    pub scale: u8,
}

impl Decimal {
    pub fn new(unscaled: i128, scale: u8) -> Self {
        Self { unscaled, scale }
    }

    /// Parse `"-12.50"` into `(-1250, 2)`. Plain integers get scale 0.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let (sign, digits) = match s.strip_prefix('-') {
            Some(rest) => (-1i128, rest),
            None => (1i128, s.strip_prefix('+').unwrap_or(s)),
        };
        if digits.is_empty() {
            return None;
        }
        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return None;
        }
        if frac_part.len() > u8::MAX as usize {
            return None;
        }
        let mut unscaled: i128 = 0;
        for c in int_part.chars().chain(frac_part.chars()) {
            let d = c.to_digit(10)? as i128;
            unscaled = unscaled.checked_mul(10)?.checked_add(d)?;
        }
        Some(Self::new(sign * unscaled, frac_part.len() as u8))
    }

    pub fn to_f64(self) -> f64 {
        self.unscaled as f64 / 10f64.powi(self.scale as i32)
    }

    /// Exact integer value, `None` when a fractional part remains.
    pub fn to_i128_exact(self) -> Option<i128> {
        let mut v = self.unscaled;
        for _ in 0..self.scale {
            if v % 10 != 0 {
                return None;
            }
            v /= 10;
        }
        Some(v)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.scale == 0 {
            return write!(f, "{}", self.unscaled);
        }
        let sign = if self.unscaled < 0 { "-" } else { "" };
        let abs = self.unscaled.unsigned_abs();
        let pow = 10u128.pow(self.scale as u32);
        write!(
            f,
            "{sign}{}.{:0width$}",
            abs / pow,
            abs % pow,
            width = self.scale as usize
        )
    }
}

/// 128-bit identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Uuid(pub [u8; 16]);

impl Uuid {
    /// Accepts the hyphenated form and plain 32-digit hex.
    pub fn parse(s: &str) -> Option<Self> {
        let hex: String = s.trim().chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 {
            return None;
        }
        let mut bytes = [0u8; 16];
        for (i, chunk) in hex.as_bytes().chunks(2).enumerate() {
            let hi = (chunk[0] as char).to_digit(16)?;
            let lo = (chunk[1] as char).to_digit(16)?;
            bytes[i] = ((hi << 4) | lo) as u8;
        }
        Some(Self(bytes))
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12], b[13],
            b[14], b[15]
        )
    }
}

/// Character-encoding identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Ascii,
    Latin1,
}

impl TextEncoding {
    pub fn label(self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Utf16Le => "utf-16le",
            TextEncoding::Utf16Be => "utf-16be",
            TextEncoding::Ascii => "us-ascii",
            TextEncoding::Latin1 => "latin-1",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" => Some(TextEncoding::Utf8),
            "utf-16le" | "utf-16" | "utf16" => Some(TextEncoding::Utf16Le),
            "utf-16be" => Some(TextEncoding::Utf16Be),
            "us-ascii" | "ascii" => Some(TextEncoding::Ascii),
            "latin-1" | "iso-8859-1" => Some(TextEncoding::Latin1),
            _ => None,
        }
    }
}

/// Type-erased custom scalar. The built-in catalog never touches these;
/// they only move through direct assignment and custom converters.
#[derive(Clone)]
pub struct OpaqueValue {
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl OpaqueValue {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn value_type_id(&self) -> TypeId {
        (*self.inner).type_id()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OpaqueValue({})", self.type_name)
    }
}

impl PartialEq for OpaqueValue {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

// ---------------------------------------------------------------------------
// Conversions from host types
// ---------------------------------------------------------------------------

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

value_from! {
    bool => Bool,
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    f32 => F32, f64 => F64,
    Decimal => Decimal,
    Uuid => Uuid,
    TimeDelta => Duration,
    NaiveDateTime => Timestamp,
    DateTime<FixedOffset> => TimestampTz,
    TextEncoding => Encoding,
    String => Str,
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

/// JSON values come in as plain dynamic values: objects become `Map`,
/// arrays become `List`, numbers pick the narrowest of i64/u64/f64.
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::I64(i)
                } else if let Some(u) = n.as_u64() {
                    Value::U64(u)
                } else {
                    Value::F64(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_parse_and_display() {
        let d = Decimal::parse("12.50").unwrap();
        assert_eq!(d, Decimal::new(1250, 2));
        assert_eq!(d.to_string(), "12.50");

        let neg = Decimal::parse("-0.07").unwrap();
        assert_eq!(neg, Decimal::new(-7, 2));
        assert_eq!(neg.to_string(), "-0.07");

        assert_eq!(Decimal::parse("42").unwrap(), Decimal::new(42, 0));
        assert!(Decimal::parse("").is_none());
        assert!(Decimal::parse("1.2.3").is_none());
    }

    #[test]
    fn decimal_exact_integer() {
        assert_eq!(Decimal::new(1200, 2).to_i128_exact(), Some(12));
        assert_eq!(Decimal::new(1250, 2).to_i128_exact(), None);
    }

    #[test]
    fn uuid_round_trip() {
        let text = "67e55044-10b1-426f-9247-bb680e5fe0c8";
        let id = Uuid::parse(text).unwrap();
        assert_eq!(id.to_string(), text);
        assert_eq!(Uuid::parse(&text.replace('-', "")), Some(id));
        assert!(Uuid::parse("not-a-uuid").is_none());
    }

    #[test]
    fn json_object_becomes_map() {
        let json: serde_json::Value =
            serde_json::from_str(r#"{"name":"Bob","age":30,"tags":["a"]}"#).unwrap();
        let v = Value::from(json);
        let Value::Map(entries) = v else {
            panic!("expected map");
        };
        assert!(entries.contains(&("name".to_string(), Value::Str("Bob".into()))));
        assert!(entries.contains(&("age".to_string(), Value::I64(30))));
    }
}

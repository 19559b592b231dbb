//! Value coercion engine.
//!
//! Converts the raw text on the right-hand side of a field assignment into a
//! [`Value`] matching a destination's declared [`Kind`]. The kind carries the
//! exact bit width, so overflow checks are performed against the destination
//! type rather than the engine's working precision.

use std::fmt;

use thiserror::Error;

/// Bit width of a sized integer destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntWidth {
    W8,
    W16,
    W32,
    W64,
}

impl IntWidth {
    /// Width in bits.
    pub const fn bits(self) -> u32 {
        match self {
            Self::W8 => 8,
            Self::W16 => 16,
            Self::W32 => 32,
            Self::W64 => 64,
        }
    }

    const fn signed_range(self) -> (i64, i64) {
        match self {
            Self::W8 => (i8::MIN as i64, i8::MAX as i64),
            Self::W16 => (i16::MIN as i64, i16::MAX as i64),
            Self::W32 => (i32::MIN as i64, i32::MAX as i64),
            Self::W64 => (i64::MIN, i64::MAX),
        }
    }

    const fn unsigned_max(self) -> u64 {
        match self {
            Self::W8 => u8::MAX as u64,
            Self::W16 => u16::MAX as u64,
            Self::W32 => u32::MAX as u64,
            Self::W64 => u64::MAX,
        }
    }
}

/// Bit width of a floating-point destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatWidth {
    W32,
    W64,
}

/// Declared kind of a bind destination.
///
/// An explicit tagged enumeration: the coercion engine dispatches on this
/// rather than inspecting the destination at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kind {
    Bool,
    Int(IntWidth),
    Uint(IntWidth),
    Float(FloatWidth),
    Text,
    /// Sequence with a uniform element kind, assigned from a JSON-style
    /// array literal.
    Seq(Box<Kind>),
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => f.write_str("bool"),
            Self::Int(width) => write!(f, "i{}", width.bits()),
            Self::Uint(width) => write!(f, "u{}", width.bits()),
            Self::Float(FloatWidth::W32) => f.write_str("f32"),
            Self::Float(FloatWidth::W64) => f.write_str("f64"),
            Self::Text => f.write_str("string"),
            Self::Seq(elem) => write!(f, "[{elem}]"),
        }
    }
}

/// A value coerced from record text, ready to store into a bind target.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Seq(Vec<Value>),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Uint(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Seq(items) => {
                f.write_str("[")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// A record value that could not be coerced into its destination kind.
///
/// Always identifies the offending text and the target kind; `for_field`
/// qualifies the error with the owning field name once it is known.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoerceError {
    #[error("cannot coerce {value:?} into value of kind {kind}")]
    Incompatible { value: String, kind: Kind },
    #[error("cannot coerce {value:?} into field {field} of kind {kind}")]
    IncompatibleField {
        value: String,
        kind: Kind,
        field: String,
    },
}

impl CoerceError {
    fn incompatible(value: &str, kind: &Kind) -> Self {
        Self::Incompatible {
            value: value.to_owned(),
            kind: kind.clone(),
        }
    }

    /// Attaches the owning field name to the error.
    pub fn for_field(self, field: &str) -> Self {
        match self {
            Self::Incompatible { value, kind } | Self::IncompatibleField { value, kind, .. } => {
                Self::IncompatibleField {
                    value,
                    kind,
                    field: field.to_owned(),
                }
            }
        }
    }
}

/// Coerces raw record text into a [`Value`] of the given kind.
///
/// # Errors
///
/// Returns [`CoerceError`] when the text does not parse as the kind or the
/// parsed value does not fit the declared bit width.
pub fn coerce(raw: &str, kind: &Kind) -> Result<Value, CoerceError> {
    match kind {
        Kind::Bool => coerce_bool(raw).ok_or_else(|| CoerceError::incompatible(raw, kind)),
        Kind::Int(width) => coerce_int(raw, *width)
            .ok_or_else(|| CoerceError::incompatible(raw, kind)),
        Kind::Uint(width) => coerce_uint(raw, *width)
            .ok_or_else(|| CoerceError::incompatible(raw, kind)),
        Kind::Float(width) => coerce_float(raw, *width)
            .ok_or_else(|| CoerceError::incompatible(raw, kind)),
        Kind::Text => Ok(Value::Text(raw.to_owned())),
        Kind::Seq(elem) => coerce_seq(raw, elem, kind),
    }
}

/// The boolean spellings the wire format accepts.
fn coerce_bool(raw: &str) -> Option<Value> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(Value::Bool(true)),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(Value::Bool(false)),
        _ => None,
    }
}

fn coerce_int(raw: &str, width: IntWidth) -> Option<Value> {
    let parsed: i64 = raw.parse().ok()?;
    let (min, max) = width.signed_range();
    (min..=max).contains(&parsed).then_some(Value::Int(parsed))
}

fn coerce_uint(raw: &str, width: IntWidth) -> Option<Value> {
    // `u64::from_str` tolerates a leading `+` but not `-`, matching the
    // no-sign rule for unsigned destinations.
    let parsed: u64 = raw.parse().ok()?;
    (parsed <= width.unsigned_max()).then_some(Value::Uint(parsed))
}

fn coerce_float(raw: &str, width: FloatWidth) -> Option<Value> {
    let parsed: f64 = raw.parse().ok()?;
    if width == FloatWidth::W32 && parsed.is_finite() && parsed.abs() > f64::from(f32::MAX) {
        return None;
    }
    Some(Value::Float(parsed))
}

fn coerce_seq(raw: &str, elem: &Kind, kind: &Kind) -> Result<Value, CoerceError> {
    let literal: serde_json::Value =
        serde_json::from_str(raw).map_err(|_| CoerceError::incompatible(raw, kind))?;
    let serde_json::Value::Array(items) = literal else {
        return Err(CoerceError::incompatible(raw, kind));
    };

    let mut values = Vec::with_capacity(items.len());
    for item in items {
        let text = match item {
            serde_json::Value::String(inner) => inner,
            other => other.to_string(),
        };
        values.push(coerce(&text, elem)?);
    }
    Ok(Value::Seq(values))
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    // -----------------------------------------------------------------------
    // booleans
    // -----------------------------------------------------------------------

    #[rstest]
    #[case::digit_one("1", true)]
    #[case::short_t("t", true)]
    #[case::upper_true("TRUE", true)]
    #[case::title_true("True", true)]
    #[case::lower_true("true", true)]
    #[case::digit_zero("0", false)]
    #[case::short_f("f", false)]
    #[case::upper_false("FALSE", false)]
    #[case::lower_false("false", false)]
    fn bool_spellings(#[case] raw: &str, #[case] expected: bool) {
        assert_eq!(coerce(raw, &Kind::Bool), Ok(Value::Bool(expected)));
    }

    #[rstest]
    #[case::word("yes")]
    #[case::shouting("tRuE")]
    #[case::empty("")]
    fn bool_rejects_other_spellings(#[case] raw: &str) {
        let error = coerce(raw, &Kind::Bool).unwrap_err();
        assert_eq!(
            error,
            CoerceError::Incompatible {
                value: raw.to_owned(),
                kind: Kind::Bool,
            }
        );
    }

    // -----------------------------------------------------------------------
    // integer widths
    // -----------------------------------------------------------------------

    #[rstest]
    #[case::i8_max(IntWidth::W8, "127", 127)]
    #[case::i8_min(IntWidth::W8, "-128", -128)]
    #[case::i16_max(IntWidth::W16, "32767", 32767)]
    #[case::i32_max(IntWidth::W32, "2147483647", 2_147_483_647)]
    #[case::i64_max(IntWidth::W64, "9223372036854775807", i64::MAX)]
    #[case::negative(IntWidth::W32, "-100", -100)]
    fn int_at_width_boundary(#[case] width: IntWidth, #[case] raw: &str, #[case] expected: i64) {
        assert_eq!(coerce(raw, &Kind::Int(width)), Ok(Value::Int(expected)));
    }

    #[rstest]
    #[case::i8_over(IntWidth::W8, "128")]
    #[case::i8_under(IntWidth::W8, "-129")]
    #[case::i16_over(IntWidth::W16, "32768")]
    #[case::i32_over(IntWidth::W32, "2147483648")]
    #[case::i64_over(IntWidth::W64, "9223372036854775808")]
    #[case::not_a_number(IntWidth::W32, "12x")]
    #[case::fractional(IntWidth::W32, "1.5")]
    fn int_rejects_out_of_width(#[case] width: IntWidth, #[case] raw: &str) {
        assert!(coerce(raw, &Kind::Int(width)).is_err());
    }

    #[rstest]
    #[case::u8_max(IntWidth::W8, "255", 255)]
    #[case::u16_max(IntWidth::W16, "65535", 65535)]
    #[case::u32_max(IntWidth::W32, "4294967295", 4_294_967_295)]
    #[case::u64_max(IntWidth::W64, "18446744073709551615", u64::MAX)]
    fn uint_at_width_boundary(#[case] width: IntWidth, #[case] raw: &str, #[case] expected: u64) {
        assert_eq!(coerce(raw, &Kind::Uint(width)), Ok(Value::Uint(expected)));
    }

    #[rstest]
    #[case::u8_over(IntWidth::W8, "256")]
    #[case::u16_over(IntWidth::W16, "65536")]
    #[case::u32_over(IntWidth::W32, "4294967296")]
    #[case::u64_over(IntWidth::W64, "18446744073709551616")]
    #[case::signed(IntWidth::W32, "-1")]
    fn uint_rejects_out_of_width(#[case] width: IntWidth, #[case] raw: &str) {
        assert!(coerce(raw, &Kind::Uint(width)).is_err());
    }

    // -----------------------------------------------------------------------
    // floats
    // -----------------------------------------------------------------------

    #[rstest]
    #[case::decimal("1.234")]
    #[case::exponent("2.5e3")]
    #[case::negative("-0.5")]
    fn float_parses_decimal_and_exponent(#[case] raw: &str) {
        let expected: f64 = raw.parse().expect("test literal");
        assert_eq!(
            coerce(raw, &Kind::Float(FloatWidth::W64)),
            Ok(Value::Float(expected))
        );
    }

    #[test]
    fn float_checks_destination_width() {
        // Finite in f64 but over f32::MAX.
        let raw = "3.5e38";
        assert!(coerce(raw, &Kind::Float(FloatWidth::W32)).is_err());
        assert!(coerce(raw, &Kind::Float(FloatWidth::W64)).is_ok());
    }

    #[test]
    fn float_rejects_garbage() {
        assert!(coerce("fast", &Kind::Float(FloatWidth::W64)).is_err());
    }

    // -----------------------------------------------------------------------
    // strings and sequences
    // -----------------------------------------------------------------------

    #[test]
    fn text_is_verbatim() {
        let raw = "  my test  ";
        assert_eq!(coerce(raw, &Kind::Text), Ok(Value::Text(raw.to_owned())));
    }

    #[test]
    fn seq_collects_all_elements() {
        let kind = Kind::Seq(Box::new(Kind::Int(IntWidth::W64)));
        let coerced = coerce("[1, 2, 3, 4]", &kind).expect("coerce array");
        assert_eq!(
            coerced,
            Value::Seq(vec![
                Value::Int(1),
                Value::Int(2),
                Value::Int(3),
                Value::Int(4),
            ])
        );
    }

    #[test]
    fn seq_of_strings_uses_inner_text() {
        let kind = Kind::Seq(Box::new(Kind::Text));
        let coerced = coerce(r#"["a", "b c"]"#, &kind).expect("coerce array");
        assert_eq!(
            coerced,
            Value::Seq(vec![
                Value::Text("a".to_owned()),
                Value::Text("b c".to_owned()),
            ])
        );
    }

    #[rstest]
    #[case::not_an_array("{\"a\": 1}")]
    #[case::unterminated("[1, 2")]
    #[case::plain_text("one two")]
    fn seq_rejects_non_array_literals(#[case] raw: &str) {
        let kind = Kind::Seq(Box::new(Kind::Int(IntWidth::W64)));
        assert!(coerce(raw, &kind).is_err());
    }

    #[test]
    fn seq_element_failure_names_element_kind() {
        let kind = Kind::Seq(Box::new(Kind::Uint(IntWidth::W8)));
        let error = coerce("[1, 300]", &kind).unwrap_err();
        assert_eq!(
            error,
            CoerceError::Incompatible {
                value: "300".to_owned(),
                kind: Kind::Uint(IntWidth::W8),
            }
        );
    }

    // -----------------------------------------------------------------------
    // rendering and errors
    // -----------------------------------------------------------------------

    #[rstest]
    #[case::boolean("true", Kind::Bool)]
    #[case::signed("-42", Kind::Int(IntWidth::W16))]
    #[case::unsigned("20000", Kind::Uint(IntWidth::W16))]
    #[case::float("1.234", Kind::Float(FloatWidth::W64))]
    #[case::text("my test", Kind::Text)]
    fn canonical_text_round_trips(#[case] raw: &str, #[case] kind: Kind) {
        let value = coerce(raw, &kind).expect("coerce canonical text");
        assert_eq!(value.to_string(), raw);
    }

    #[test]
    fn error_display_names_text_and_kind() {
        let error = coerce("300", &Kind::Uint(IntWidth::W8)).unwrap_err();
        assert_eq!(
            error.to_string(),
            "cannot coerce \"300\" into value of kind u8"
        );
        assert_eq!(
            error.for_field("app.level").to_string(),
            "cannot coerce \"300\" into field app.level of kind u8"
        );
    }

    #[test]
    fn kind_display() {
        let kind = Kind::Seq(Box::new(Kind::Float(FloatWidth::W32)));
        assert_eq!(kind.to_string(), "[f32]");
    }
}

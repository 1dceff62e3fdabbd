use std::num::IntErrorKind;

use regex::Regex;
use serde::Deserialize;

use crate::error::{DbError, Result, ValueErrorKind};

/// Simple type definition as written in the schema document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SimpleTypeDef {
    /// Primitive base type name.
    pub base: String,
    pub min_inclusive: Option<f64>,
    pub max_inclusive: Option<f64>,
    pub min_exclusive: Option<f64>,
    pub max_exclusive: Option<f64>,
    #[serde(default)]
    pub enumeration: Vec<String>,
    #[serde(default)]
    pub pattern: Vec<String>,
}

/// Bounds of a floating-point field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecimalFacets {
    pub min_inclusive: Option<f64>,
    pub max_inclusive: Option<f64>,
    pub min_exclusive: Option<f64>,
    pub max_exclusive: Option<f64>,
}

/// Value type of a simple-content element, compiled once from the schema.
#[derive(Debug, Clone)]
pub enum FieldType {
    /// Space separated list of floating-point numbers.
    NumberList,
    /// Floating-point number with optional inclusive and exclusive bounds.
    Decimal(DecimalFacets),
    /// Integer with inclusive bounds.
    Integer { min: Option<i64>, max: Option<i64> },
    /// Decimal number with inclusive bounds.
    Number { min: Option<f64>, max: Option<f64> },
    /// One of a fixed set of strings.
    Enum(Vec<String>),
    /// String matching at least one of the patterns.
    Pattern(Vec<Regex>),
    /// Unrestricted string.
    String,
}

impl FieldType {
    /// Compile a schema type definition. `name` is used in error messages.
    pub fn compile(def: &SimpleTypeDef, name: &str) -> Result<Self> {
        let base = def.base.to_ascii_lowercase();
        let invalid = |reason: String| DbError::Schema(format!("type `{name}`: {reason}"));

        let ft = match base.as_str() {
            "numberlist" => FieldType::NumberList,
            "double" | "float" => FieldType::Decimal(DecimalFacets {
                min_inclusive: def.min_inclusive,
                max_inclusive: def.max_inclusive,
                min_exclusive: def.min_exclusive,
                max_exclusive: def.max_exclusive,
            }),
            b if b.contains("integer") || matches!(b, "int" | "long" | "short") => {
                let implied_min = match b {
                    "positiveinteger" => Some(1),
                    "nonnegativeinteger" => Some(0),
                    _ => None,
                };
                let implied_max = match b {
                    "negativeinteger" => Some(-1),
                    "nonpositiveinteger" => Some(0),
                    _ => None,
                };
                let min = max_opt(
                    implied_min,
                    max_opt(
                        def.min_inclusive.map(|v| v.ceil() as i64),
                        def.min_exclusive.map(|v| v.floor() as i64 + 1),
                    ),
                );
                let max = min_opt(
                    implied_max,
                    min_opt(
                        def.max_inclusive.map(|v| v.floor() as i64),
                        def.max_exclusive.map(|v| v.ceil() as i64 - 1),
                    ),
                );
                FieldType::Integer { min, max }
            }
            "decimal" => {
                if def.min_exclusive.is_some() || def.max_exclusive.is_some() {
                    return Err(invalid("exclusive bounds require a double base".into()));
                }
                FieldType::Number {
                    min: def.min_inclusive,
                    max: def.max_inclusive,
                }
            }
            "boolean" => FieldType::Enum(vec!["true".into(), "false".into()]),
            "string" | "token" | "normalizedstring" => {
                if !def.enumeration.is_empty() {
                    FieldType::Enum(def.enumeration.clone())
                } else if !def.pattern.is_empty() {
                    let regexes = def
                        .pattern
                        .iter()
                        .map(|p| Regex::new(&format!("^(?:{p})$")))
                        .collect::<std::result::Result<Vec<_>, _>>()
                        .map_err(|e| invalid(e.to_string()))?;
                    FieldType::Pattern(regexes)
                } else {
                    FieldType::String
                }
            }
            other => return Err(invalid(format!("unknown base `{other}`"))),
        };
        Ok(ft)
    }

    /// Whether the field holds a number and may therefore reference a batch
    /// parameter value.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Decimal(_) | FieldType::Integer { .. } | FieldType::Number { .. }
        )
    }

    /// Validate a trimmed value and return its canonical form.
    ///
    /// Numeric values keep their original formatting, lower-cased; number
    /// lists are re-joined with single spaces.
    pub fn normalize(&self, value: &str) -> std::result::Result<String, ValueErrorKind> {
        match self {
            FieldType::NumberList => {
                let tokens: Vec<&str> = value.split_whitespace().collect();
                if tokens.iter().any(|t| t.parse::<f64>().is_err()) {
                    return Err(ValueErrorKind::FloatOnly);
                }
                Ok(tokens.join(" "))
            }
            FieldType::Decimal(facets) => {
                let v: f64 = value.parse().map_err(|_| ValueErrorKind::FloatOnly)?;
                let violated = facets.min_inclusive.is_some_and(|m| v < m)
                    || facets.max_inclusive.is_some_and(|m| v > m)
                    || facets.min_exclusive.is_some_and(|m| v <= m)
                    || facets.max_exclusive.is_some_and(|m| v >= m);
                if violated {
                    return Err(ValueErrorKind::OutOfRange);
                }
                Ok(value.to_lowercase())
            }
            FieldType::Integer { min, max } => {
                match value.parse::<i64>() {
                    Ok(v) if min.is_some_and(|m| v < m) || max.is_some_and(|m| v > m) => {
                        return Err(ValueErrorKind::OutOfRange);
                    }
                    Ok(_) => {}
                    // integers are unbounded unless the schema bounds them
                    Err(e) => match e.kind() {
                        IntErrorKind::PosOverflow if max.is_none() => {}
                        IntErrorKind::NegOverflow if min.is_none() => {}
                        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                            return Err(ValueErrorKind::OutOfRange);
                        }
                        _ => return Err(ValueErrorKind::IntegerOnly),
                    },
                }
                Ok(value.to_lowercase())
            }
            FieldType::Number { min, max } => {
                let v: f64 = value.parse().map_err(|_| ValueErrorKind::FloatOnly)?;
                if min.is_some_and(|m| v < m) || max.is_some_and(|m| v > m) {
                    return Err(ValueErrorKind::OutOfRange);
                }
                Ok(value.to_lowercase())
            }
            FieldType::Enum(values) => {
                if values.iter().any(|v| v == value) {
                    Ok(value.to_string())
                } else {
                    Err(ValueErrorKind::TypeMismatch)
                }
            }
            FieldType::Pattern(regexes) => {
                if regexes.iter().any(|r| r.is_match(value)) {
                    Ok(value.to_string())
                } else {
                    Err(ValueErrorKind::TypeMismatch)
                }
            }
            FieldType::String => Ok(value.to_string()),
        }
    }
}

fn max_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

fn min_opt(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile(json: &str) -> FieldType {
        let def: SimpleTypeDef = serde_json::from_str(json).unwrap();
        FieldType::compile(&def, "t").unwrap()
    }

    #[test]
    fn test_decimal_facets_are_checked_in_order() {
        let ft = compile(r#"{"base": "double", "minExclusive": 0, "maxInclusive": 10}"#);
        assert_eq!(ft.normalize("1.5E3"), Err(ValueErrorKind::OutOfRange));
        assert_eq!(ft.normalize("1.5E-3"), Ok("1.5e-3".to_string()));
        assert_eq!(ft.normalize("0"), Err(ValueErrorKind::OutOfRange));
        assert_eq!(ft.normalize("10"), Ok("10".to_string()));
        assert_eq!(ft.normalize("ten"), Err(ValueErrorKind::FloatOnly));
    }

    #[test]
    fn test_integer_parser_is_chosen_by_base_name() {
        let ft = compile(r#"{"base": "positiveInteger", "maxInclusive": 100}"#);
        assert!(matches!(ft, FieldType::Integer { min: Some(1), max: Some(100) }));
        assert_eq!(ft.normalize("1.0"), Err(ValueErrorKind::IntegerOnly));
        assert_eq!(ft.normalize("0"), Err(ValueErrorKind::OutOfRange));
        assert_eq!(ft.normalize("42"), Ok("42".to_string()));

        let ft = compile(r#"{"base": "decimal", "minInclusive": 0, "maxInclusive": 1}"#);
        assert_eq!(ft.normalize("0.7"), Ok("0.7".to_string()));
        assert_eq!(ft.normalize("1.1"), Err(ValueErrorKind::OutOfRange));
        assert_eq!(ft.normalize("x"), Err(ValueErrorKind::FloatOnly));
    }

    #[test]
    fn test_oversized_integers() {
        let huge = "123456789012345678901234567890";
        let ft = compile(r#"{"base": "integer", "minInclusive": 0, "maxInclusive": 100}"#);
        assert_eq!(ft.normalize(huge), Err(ValueErrorKind::OutOfRange));
        assert_eq!(ft.normalize(&format!("-{huge}")), Err(ValueErrorKind::OutOfRange));

        let ft = compile(r#"{"base": "nonNegativeInteger"}"#);
        assert_eq!(ft.normalize(huge), Ok(huge.to_string()));
        assert_eq!(ft.normalize(&format!("-{huge}")), Err(ValueErrorKind::OutOfRange));
        assert_eq!(ft.normalize("12x"), Err(ValueErrorKind::IntegerOnly));
    }

    #[test]
    fn test_number_list_rejoins_tokens() {
        let ft = compile(r#"{"base": "numberList"}"#);
        assert_eq!(ft.normalize("1   2.5\t3e2"), Ok("1 2.5 3e2".to_string()));
        assert_eq!(ft.normalize(""), Ok(String::new()));
        assert_eq!(ft.normalize("1 a"), Err(ValueErrorKind::FloatOnly));
    }

    #[test]
    fn test_enum_and_pattern() {
        let ft = compile(r#"{"base": "string", "enumeration": ["none", "mrf"]}"#);
        assert_eq!(ft.normalize("mrf"), Ok("mrf".to_string()));
        assert_eq!(ft.normalize("MRF"), Err(ValueErrorKind::TypeMismatch));

        let ft = compile(r#"{"base": "token", "pattern": ["[a-z]+", "[0-9]+"]}"#);
        assert_eq!(ft.normalize("abc"), Ok("abc".to_string()));
        assert_eq!(ft.normalize("123"), Ok("123".to_string()));
        assert_eq!(ft.normalize("abc123"), Err(ValueErrorKind::TypeMismatch));

        let ft = compile(r#"{"base": "boolean"}"#);
        assert_eq!(ft.normalize("true"), Ok("true".to_string()));
        assert_eq!(ft.normalize("yes"), Err(ValueErrorKind::TypeMismatch));
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let cases = [
            (r#"{"base": "double"}"#, "1.5E+3"),
            (r#"{"base": "numberList"}"#, " 1  2 3 "),
            (r#"{"base": "integer"}"#, "+7"),
            (r#"{"base": "string"}"#, "free text"),
        ];
        for (def, raw) in cases {
            let ft = compile(def);
            let once = ft.normalize(raw.trim()).unwrap();
            assert_eq!(ft.normalize(&once).unwrap(), once);
        }
    }

    #[test]
    fn test_unknown_base_is_a_schema_error() {
        let def: SimpleTypeDef = serde_json::from_str(r#"{"base": "date"}"#).unwrap();
        assert!(matches!(FieldType::compile(&def, "t"), Err(DbError::Schema(_))));
        let def: SimpleTypeDef =
            serde_json::from_str(r#"{"base": "decimal", "minExclusive": 0}"#).unwrap();
        assert!(FieldType::compile(&def, "t").is_err());
    }
}

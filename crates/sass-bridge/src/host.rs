//! Marshaling between `SassValue` and dynamically typed host data.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Scripting hosts exchange values with the bridge as tagged JSON objects:
//!
//! ```text
//! {"type": "number", "value": 42, "unit": "px"}
//! {"type": "list", "separator": "comma", "bracketed": false, "values": [...]}
//! {"type": "map", "entries": [{"key": ..., "value": ...}]}
//! ```
//!
//! This module also carries the host-facing constructor and setter contract:
//! arguments arrive untyped, so every constructor validates them and fails
//! with the same messages a scripting host would surface to its users.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::{SASS_VALUE_EXPECTED, ValueError};
use crate::value::{SassColor, SassList, SassMap, SassNumber, SassString, SassValue, Separator};

/// What a host callable hands back: a typed value or loosely typed host data.
#[derive(Debug, Clone, PartialEq)]
pub enum HostValue {
    Sass(SassValue),
    Json(Value),
}

impl HostValue {
    /// Resolve into a `SassValue`, rejecting anything that is not one.
    pub fn into_sass(self) -> Result<SassValue, ValueError> {
        match self {
            HostValue::Sass(value) => Ok(value),
            HostValue::Json(value) => SassValue::from_host(&value),
        }
    }
}

impl From<SassValue> for HostValue {
    fn from(value: SassValue) -> Self {
        HostValue::Sass(value)
    }
}

impl From<Value> for HostValue {
    fn from(value: Value) -> Self {
        HostValue::Json(value)
    }
}

impl From<bool> for HostValue {
    fn from(value: bool) -> Self {
        HostValue::Sass(SassValue::boolean(value))
    }
}

impl From<SassNumber> for HostValue {
    fn from(value: SassNumber) -> Self {
        HostValue::Sass(value.into())
    }
}

impl From<SassString> for HostValue {
    fn from(value: SassString) -> Self {
        HostValue::Sass(value.into())
    }
}

impl From<SassColor> for HostValue {
    fn from(value: SassColor) -> Self {
        HostValue::Sass(value.into())
    }
}

impl From<SassList> for HostValue {
    fn from(value: SassList) -> Self {
        HostValue::Sass(value.into())
    }
}

impl From<SassMap> for HostValue {
    fn from(value: SassMap) -> Self {
        HostValue::Sass(value.into())
    }
}

/// The value kinds a host can construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Boolean,
    Number,
    String,
    Color,
    List,
    Map,
    Error,
}

impl SassValue {
    /// Convert to the tagged JSON form. Never fails.
    pub fn to_host(&self) -> Value {
        match self {
            SassValue::Null => json!({"type": "null"}),
            SassValue::Boolean(b) => json!({"type": "boolean", "value": b}),
            SassValue::Number(n) => {
                json!({"type": "number", "value": number_to_host(n.value()), "unit": n.unit()})
            }
            SassValue::String(s) => json!({"type": "string", "value": s.value()}),
            SassValue::Color(c) => {
                json!({"type": "color", "r": c.r(), "g": c.g(), "b": c.b(), "a": c.a()})
            }
            SassValue::List(l) => json!({
                "type": "list",
                "separator": match l.separator() {
                    Separator::Comma => "comma",
                    Separator::Space => "space",
                },
                "bracketed": l.is_bracketed(),
                "values": l.iter().map(SassValue::to_host).collect::<Vec<_>>(),
            }),
            SassValue::Map(m) => json!({
                "type": "map",
                "entries": m
                    .iter()
                    .map(|(k, v)| json!({"key": k.to_host(), "value": v.to_host()}))
                    .collect::<Vec<_>>(),
            }),
            SassValue::Error(msg) => json!({"type": "error", "message": msg}),
        }
    }

    /// Convert from the tagged JSON form.
    ///
    /// Anything that is not a tagged value object fails with
    /// "A SassValue object was expected".
    pub fn from_host(value: &Value) -> Result<SassValue, ValueError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ValueError::type_error(SASS_VALUE_EXPECTED))?;
        let kind = obj
            .get("type")
            .and_then(|t| ValueKind::deserialize(t).ok())
            .ok_or_else(|| ValueError::type_error(SASS_VALUE_EXPECTED))?;

        match kind {
            ValueKind::Null => Ok(SassValue::NULL),
            ValueKind::Boolean => obj
                .get("value")
                .and_then(Value::as_bool)
                .map(SassValue::boolean)
                .ok_or_else(|| malformed("boolean")),
            ValueKind::Number => {
                let number = obj
                    .get("value")
                    .and_then(number_from_host)
                    .ok_or_else(|| malformed("number"))?;
                let unit = match obj.get("unit") {
                    None | Some(Value::Null) => "",
                    Some(Value::String(u)) => u.as_str(),
                    Some(_) => return Err(malformed("number")),
                };
                Ok(SassValue::number(number, unit))
            }
            ValueKind::String => obj
                .get("value")
                .and_then(Value::as_str)
                .map(SassValue::string)
                .ok_or_else(|| malformed("string")),
            ValueKind::Color => {
                let channel = |name: &str| obj.get(name).and_then(Value::as_f64);
                match (channel("r"), channel("g"), channel("b")) {
                    (Some(r), Some(g), Some(b)) => Ok(SassValue::Color(SassColor::new(
                        to_channel(r),
                        to_channel(g),
                        to_channel(b),
                        channel("a").unwrap_or(1.0),
                    ))),
                    _ => Err(malformed("color")),
                }
            }
            ValueKind::List => {
                let values = obj
                    .get("values")
                    .and_then(Value::as_array)
                    .ok_or_else(|| malformed("list"))?
                    .iter()
                    .map(SassValue::from_host)
                    .collect::<Result<Vec<_>, _>>()?;
                let separator = match obj.get("separator").and_then(Value::as_str) {
                    Some("space") => Separator::Space,
                    _ => Separator::Comma,
                };
                let mut list = SassList::from_values(values, separator);
                list.set_bracketed(
                    obj.get("bracketed")
                        .and_then(Value::as_bool)
                        .unwrap_or(false),
                );
                Ok(SassValue::List(list))
            }
            ValueKind::Map => {
                let entries = obj
                    .get("entries")
                    .and_then(Value::as_array)
                    .ok_or_else(|| malformed("map"))?
                    .iter()
                    .map(|entry| {
                        let key = entry.get("key").ok_or_else(|| malformed("map"))?;
                        let value = entry.get("value").ok_or_else(|| malformed("map"))?;
                        Ok((SassValue::from_host(key)?, SassValue::from_host(value)?))
                    })
                    .collect::<Result<Vec<_>, ValueError>>()?;
                Ok(SassValue::Map(SassMap::from_entries(entries)))
            }
            ValueKind::Error => obj
                .get("message")
                .and_then(Value::as_str)
                .map(SassValue::error)
                .ok_or_else(|| malformed("error")),
        }
    }
}

fn malformed(kind: &str) -> ValueError {
    ValueError::type_error(format!("{}: malformed {} object", SASS_VALUE_EXPECTED, kind))
}

fn number_to_host(value: f64) -> Value {
    if value.is_finite() {
        json!(value)
    } else if value.is_nan() {
        json!("NaN")
    } else if value > 0.0 {
        json!("Infinity")
    } else {
        json!("-Infinity")
    }
}

fn number_from_host(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => match s.as_str() {
            "NaN" => Some(f64::NAN),
            "Infinity" => Some(f64::INFINITY),
            "-Infinity" => Some(f64::NEG_INFINITY),
            _ => None,
        },
        _ => None,
    }
}

fn to_channel(value: f64) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}

/// Construct a value the way a host's `new Kind(...)` expression does.
///
/// The null and boolean singletons cannot be instantiated this way.
pub fn construct(kind: ValueKind, args: &[Value]) -> Result<SassValue, ValueError> {
    match kind {
        ValueKind::Null => Err(ValueError::construction("Cannot instantiate SassNull")),
        ValueKind::Boolean => Err(ValueError::construction("Cannot instantiate SassBoolean")),
        _ => call(kind, args),
    }
}

/// Construct a value the way a host's plain `Kind(...)` call does.
///
/// `Null()` and `Boolean(b)` return the canonical singletons.
pub fn call(kind: ValueKind, args: &[Value]) -> Result<SassValue, ValueError> {
    match kind {
        ValueKind::Null => Ok(SassValue::NULL),
        ValueKind::Boolean => match args {
            [Value::Bool(b)] => Ok(SassValue::boolean(*b)),
            _ => Err(ValueError::construction("Expected one boolean argument")),
        },
        ValueKind::Number => {
            let value = match args.first() {
                None => 0.0,
                Some(v) => v.as_f64().ok_or_else(|| {
                    ValueError::construction("First argument should be a number.")
                })?,
            };
            let unit = match args.get(1) {
                None => "",
                Some(Value::String(u)) => u.as_str(),
                Some(_) => {
                    return Err(ValueError::construction(
                        "Second argument should be a string.",
                    ));
                }
            };
            Ok(SassValue::number(value, unit))
        }
        ValueKind::String => match args {
            [] => Ok(SassValue::string("")),
            [Value::String(s)] => Ok(SassValue::string(s.as_str())),
            _ => Err(ValueError::construction("Argument should be a string.")),
        },
        ValueKind::Color => construct_color(args),
        ValueKind::List => {
            let len = length_argument(args.first())?;
            let separator = match args.get(1) {
                None | Some(Value::Bool(true)) => Separator::Comma,
                Some(Value::Bool(false)) => Separator::Space,
                Some(_) => {
                    return Err(ValueError::construction(
                        "Second argument should be a boolean.",
                    ));
                }
            };
            Ok(SassValue::List(SassList::new(len, separator, false)))
        }
        ValueKind::Map => Ok(SassValue::Map(SassMap::new(length_argument(args.first())?))),
        ValueKind::Error => match args {
            [Value::String(msg)] => Ok(SassValue::error(msg.as_str())),
            _ => Err(ValueError::construction("Argument should be a string.")),
        },
    }
}

fn construct_color(args: &[Value]) -> Result<SassValue, ValueError> {
    let numbers = args
        .iter()
        .map(Value::as_f64)
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| ValueError::construction("Constructor arguments should be numbers exactly."))?;

    let color = match numbers.as_slice() {
        [] => SassColor::rgb(0, 0, 0),
        [argb] => {
            if *argb < 0.0 || *argb > f64::from(u32::MAX) || argb.fract() != 0.0 {
                return Err(ValueError::construction(
                    "Only argument should be an integer.",
                ));
            }
            SassColor::from_argb(*argb as u32)
        }
        [r, g, b] => SassColor::rgb(to_channel(*r), to_channel(*g), to_channel(*b)),
        [r, g, b, a] => SassColor::new(to_channel(*r), to_channel(*g), to_channel(*b), *a),
        _ => {
            return Err(ValueError::construction(
                "Constructor should be invoked with either 0, 1, 3 or 4 arguments.",
            ));
        }
    };
    Ok(SassValue::Color(color))
}

fn length_argument(arg: Option<&Value>) -> Result<usize, ValueError> {
    match arg {
        None => Ok(0),
        Some(v) => v
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| ValueError::construction("First argument should be an integer.")),
    }
}

/// Host-side `setUnit`.
pub fn set_unit(number: &mut SassNumber, unit: &Value) -> Result<(), ValueError> {
    let unit = unit
        .as_str()
        .ok_or_else(|| ValueError::type_error("Supplied value should be a string"))?;
    number.set_unit(unit);
    Ok(())
}

/// Host-side `setValue` on a number.
pub fn set_number_value(number: &mut SassNumber, value: &Value) -> Result<(), ValueError> {
    let value = value
        .as_f64()
        .ok_or_else(|| ValueError::type_error("Supplied value should be a number"))?;
    number.set_value(value);
    Ok(())
}

/// Host-side `setValue` on a string.
pub fn set_string_value(string: &mut SassString, value: &Value) -> Result<(), ValueError> {
    let value = value
        .as_str()
        .ok_or_else(|| ValueError::type_error("Supplied value should be a string"))?;
    string.set_value(value);
    Ok(())
}

/// Color channel addressed by a host-side setter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    R,
    G,
    B,
    A,
}

/// Host-side `setR`/`setG`/`setB`/`setA`.
pub fn set_channel(color: &mut SassColor, channel: Channel, value: &Value) -> Result<(), ValueError> {
    let value = value
        .as_f64()
        .ok_or_else(|| ValueError::type_error("Supplied value should be a number"))?;
    match channel {
        Channel::R => color.set_r(to_channel(value)),
        Channel::G => color.set_g(to_channel(value)),
        Channel::B => color.set_b(to_channel(value)),
        Channel::A => color.set_a(value),
    }
    Ok(())
}

//! Tagged SASS values exchanged with the native engine.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! `SassValue` is a closed sum type with one variant per value kind the
//! engine knows about. Null and the two booleans are unit-like, so the
//! canonical `SassValue::NULL`, `SassValue::TRUE` and `SassValue::FALSE`
//! are the only values of their kind that can exist: whatever path a null
//! or boolean takes through the bridge, it compares identical to them.
//!
//! Lists and maps have their length fixed at construction. Elements can be
//! replaced by index, never added or removed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ValueError;

/// Separator between list elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Separator {
    #[default]
    Comma,
    Space,
}

impl Separator {
    fn as_css(self) -> &'static str {
        match self {
            Separator::Comma => ", ",
            Separator::Space => " ",
        }
    }
}

/// A value crossing the boundary between the engine and host code.
#[derive(Debug, Clone, PartialEq)]
pub enum SassValue {
    Null,
    Boolean(bool),
    Number(SassNumber),
    String(SassString),
    Color(SassColor),
    List(SassList),
    Map(SassMap),
    /// A user-raised failure; never rendered into CSS
    Error(String),
}

impl SassValue {
    pub const NULL: SassValue = SassValue::Null;
    pub const TRUE: SassValue = SassValue::Boolean(true);
    pub const FALSE: SassValue = SassValue::Boolean(false);

    /// The canonical boolean for `value`.
    pub fn boolean(value: bool) -> SassValue {
        if value { Self::TRUE } else { Self::FALSE }
    }

    pub fn number(value: f64, unit: impl Into<String>) -> SassValue {
        SassValue::Number(SassNumber::new(value, unit))
    }

    pub fn unitless(value: f64) -> SassValue {
        SassValue::Number(SassNumber::unitless(value))
    }

    pub fn string(text: impl Into<String>) -> SassValue {
        SassValue::String(SassString::new(text))
    }

    pub fn error(message: impl Into<String>) -> SassValue {
        SassValue::Error(message.into())
    }

    /// Short lowercase name of the value kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SassValue::Null => "null",
            SassValue::Boolean(_) => "boolean",
            SassValue::Number(_) => "number",
            SassValue::String(_) => "string",
            SassValue::Color(_) => "color",
            SassValue::List(_) => "list",
            SassValue::Map(_) => "map",
            SassValue::Error(_) => "error",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, SassValue::Null)
    }

    /// Everything except `null` and `false` is truthy.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, SassValue::Null | SassValue::Boolean(false))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SassValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&SassNumber> {
        match self {
            SassValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_number_mut(&mut self) -> Option<&mut SassNumber> {
        match self {
            SassValue::Number(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&SassString> {
        match self {
            SassValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_string_mut(&mut self) -> Option<&mut SassString> {
        match self {
            SassValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<&SassColor> {
        match self {
            SassValue::Color(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&SassList> {
        match self {
            SassValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut SassList> {
        match self {
            SassValue::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&SassMap> {
        match self {
            SassValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut SassMap> {
        match self {
            SassValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_error(&self) -> Option<&str> {
        match self {
            SassValue::Error(msg) => Some(msg),
            _ => None,
        }
    }
}

impl From<bool> for SassValue {
    fn from(value: bool) -> Self {
        SassValue::boolean(value)
    }
}

impl From<SassNumber> for SassValue {
    fn from(value: SassNumber) -> Self {
        SassValue::Number(value)
    }
}

impl From<SassString> for SassValue {
    fn from(value: SassString) -> Self {
        SassValue::String(value)
    }
}

impl From<SassColor> for SassValue {
    fn from(value: SassColor) -> Self {
        SassValue::Color(value)
    }
}

impl From<SassList> for SassValue {
    fn from(value: SassList) -> Self {
        SassValue::List(value)
    }
}

impl From<SassMap> for SassValue {
    fn from(value: SassMap) -> Self {
        SassValue::Map(value)
    }
}

/// A number with an optional unit (`""` for unitless numbers).
#[derive(Debug, Clone, PartialEq)]
pub struct SassNumber {
    value: f64,
    unit: String,
}

impl SassNumber {
    pub fn new(value: f64, unit: impl Into<String>) -> Self {
        Self {
            value,
            unit: unit.into(),
        }
    }

    pub fn unitless(value: f64) -> Self {
        Self::new(value, "")
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn set_value(&mut self, value: f64) {
        self.value = value;
    }

    pub fn set_unit(&mut self, unit: impl Into<String>) {
        self.unit = unit.into();
    }
}

/// String text exactly as the producer wrote it.
///
/// Quoted (`"bar"`) and unquoted (`bar`) strings are different values;
/// the quotes are part of the text and are never added or stripped here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SassString {
    text: String,
}

impl SassString {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn value(&self) -> &str {
        &self.text
    }

    pub fn set_value(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// Whether the text is wrapped in matching single or double quotes.
    pub fn is_quoted(&self) -> bool {
        let bytes = self.text.as_bytes();
        bytes.len() >= 2
            && (bytes[0] == b'"' || bytes[0] == b'\'')
            && bytes[bytes.len() - 1] == bytes[0]
    }

    /// The text with one level of surrounding quotes removed.
    pub fn unquoted(&self) -> &str {
        if self.is_quoted() {
            &self.text[1..self.text.len() - 1]
        } else {
            &self.text
        }
    }
}

/// An RGBA color. Channels are 0-255, alpha is 0.0-1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct SassColor {
    r: u8,
    g: u8,
    b: u8,
    a: f64,
}

impl SassColor {
    /// Alpha is clamped into `0.0..=1.0`.
    pub fn new(r: u8, g: u8, b: u8, a: f64) -> Self {
        Self {
            r,
            g,
            b,
            a: clamp_alpha(a),
        }
    }

    pub fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// Unpack a `0xAARRGGBB` integer. Alpha is the high byte.
    pub fn from_argb(argb: u32) -> Self {
        let [a, r, g, b] = argb.to_be_bytes();
        Self {
            r,
            g,
            b,
            a: f64::from(a) / 255.0,
        }
    }

    /// Pack into `0xAARRGGBB`, the inverse of [`SassColor::from_argb`].
    pub fn to_argb(&self) -> u32 {
        let a = (self.a * 255.0).round() as u8;
        u32::from_be_bytes([a, self.r, self.g, self.b])
    }

    pub fn r(&self) -> u8 {
        self.r
    }

    pub fn g(&self) -> u8 {
        self.g
    }

    pub fn b(&self) -> u8 {
        self.b
    }

    pub fn a(&self) -> f64 {
        self.a
    }

    pub fn set_r(&mut self, r: u8) {
        self.r = r;
    }

    pub fn set_g(&mut self, g: u8) {
        self.g = g;
    }

    pub fn set_b(&mut self, b: u8) {
        self.b = b;
    }

    pub fn set_a(&mut self, a: f64) {
        self.a = clamp_alpha(a);
    }
}

fn clamp_alpha(a: f64) -> f64 {
    if a.is_nan() { 1.0 } else { a.clamp(0.0, 1.0) }
}

/// A fixed-length ordered list.
#[derive(Debug, Clone, PartialEq)]
pub struct SassList {
    items: Vec<SassValue>,
    separator: Separator,
    bracketed: bool,
}

impl SassList {
    /// A list of `len` nulls.
    pub fn new(len: usize, separator: Separator, bracketed: bool) -> Self {
        Self {
            items: vec![SassValue::NULL; len],
            separator,
            bracketed,
        }
    }

    /// A list holding exactly `items`.
    pub fn from_values(items: Vec<SassValue>, separator: Separator) -> Self {
        Self {
            items,
            separator,
            bracketed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&SassValue, ValueError> {
        let len = self.items.len();
        self.items.get(index).ok_or(ValueError::Range { index, len })
    }

    pub fn set(&mut self, index: usize, value: SassValue) -> Result<(), ValueError> {
        let len = self.items.len();
        let slot = self
            .items
            .get_mut(index)
            .ok_or(ValueError::Range { index, len })?;
        *slot = value;
        Ok(())
    }

    pub fn separator(&self) -> Separator {
        self.separator
    }

    pub fn set_separator(&mut self, separator: Separator) {
        self.separator = separator;
    }

    pub fn is_bracketed(&self) -> bool {
        self.bracketed
    }

    pub fn set_bracketed(&mut self, bracketed: bool) {
        self.bracketed = bracketed;
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SassValue> {
        self.items.iter()
    }
}

/// A fixed-length ordered sequence of key/value pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct SassMap {
    entries: Vec<(SassValue, SassValue)>,
}

impl SassMap {
    /// A map of `len` null/null pairs.
    pub fn new(len: usize) -> Self {
        Self {
            entries: vec![(SassValue::NULL, SassValue::NULL); len],
        }
    }

    pub fn from_entries(entries: Vec<(SassValue, SassValue)>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn key(&self, index: usize) -> Result<&SassValue, ValueError> {
        self.entry(index).map(|(k, _)| k)
    }

    pub fn value(&self, index: usize) -> Result<&SassValue, ValueError> {
        self.entry(index).map(|(_, v)| v)
    }

    pub fn set_key(&mut self, index: usize, key: SassValue) -> Result<(), ValueError> {
        self.entry_mut(index)?.0 = key;
        Ok(())
    }

    pub fn set_value(&mut self, index: usize, value: SassValue) -> Result<(), ValueError> {
        self.entry_mut(index)?.1 = value;
        Ok(())
    }

    /// Value of the first entry whose key equals `key`.
    pub fn get(&self, key: &SassValue) -> Option<&SassValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SassValue, &SassValue)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    fn entry(&self, index: usize) -> Result<&(SassValue, SassValue), ValueError> {
        let len = self.entries.len();
        self.entries.get(index).ok_or(ValueError::Range { index, len })
    }

    fn entry_mut(&mut self, index: usize) -> Result<&mut (SassValue, SassValue), ValueError> {
        let len = self.entries.len();
        self.entries
            .get_mut(index)
            .ok_or(ValueError::Range { index, len })
    }
}

/// Format a number the way CSS output expects: no trailing zeros,
/// at most ten fractional digits.
pub(crate) fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return if value.is_nan() {
            "NaN".to_string()
        } else if value > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        };
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let fixed = format!("{:.10}", value);
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

impl fmt::Display for SassValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SassValue::Null => Ok(()),
            SassValue::Boolean(b) => write!(f, "{}", b),
            SassValue::Number(n) => write!(f, "{}{}", format_number(n.value), n.unit),
            SassValue::String(s) => write!(f, "{}", s.text),
            SassValue::Color(c) => {
                if c.a >= 1.0 {
                    write!(f, "#{:02x}{:02x}{:02x}", c.r, c.g, c.b)
                } else {
                    write!(
                        f,
                        "rgba({}, {}, {}, {})",
                        c.r,
                        c.g,
                        c.b,
                        format_number(c.a)
                    )
                }
            }
            SassValue::List(l) => {
                let body = l
                    .items
                    .iter()
                    .map(|item| item.to_string())
                    .collect::<Vec<_>>()
                    .join(l.separator.as_css());
                if l.bracketed {
                    write!(f, "[{}]", body)
                } else {
                    write!(f, "{}", body)
                }
            }
            SassValue::Map(m) => {
                let body = m
                    .entries
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v))
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "({})", body)
            }
            SassValue::Error(msg) => write!(f, "{}", msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_constructor_returns_singletons() {
        assert_eq!(SassValue::boolean(true), SassValue::TRUE);
        assert_eq!(SassValue::boolean(false), SassValue::FALSE);
        assert_ne!(SassValue::TRUE, SassValue::FALSE);
        assert_eq!(SassValue::from(true), SassValue::boolean(true));
    }

    #[test]
    fn test_truthiness() {
        assert!(!SassValue::NULL.is_truthy());
        assert!(!SassValue::FALSE.is_truthy());
        assert!(SassValue::unitless(0.0).is_truthy());
        assert!(SassValue::string("").is_truthy());
    }

    #[test]
    fn test_packed_color_alpha_is_high_byte() {
        let color = SassColor::from_argb(0x33ff00ff);
        assert_eq!(color.r(), 255);
        assert_eq!(color.g(), 0);
        assert_eq!(color.b(), 255);
        assert!((color.a() - 0.2).abs() < 1e-9);

        let same = SassColor::new(255, 0, 255, 0.2);
        assert_eq!(same.to_argb(), 0x33ff00ff);
        assert_eq!(SassColor::from_argb(same.to_argb()), color);
    }

    #[test]
    fn test_opaque_packed_color() {
        let red = SassColor::from_argb(0xffff0000);
        assert_eq!((red.r(), red.g(), red.b()), (255, 0, 0));
        assert_eq!(red.a(), 1.0);
    }

    #[test]
    fn test_alpha_is_clamped() {
        let mut color = SassColor::new(0, 0, 0, 3.0);
        assert_eq!(color.a(), 1.0);
        color.set_a(-1.0);
        assert_eq!(color.a(), 0.0);
    }

    #[test]
    fn test_list_is_fixed_length() {
        let mut list = SassList::new(3, Separator::Comma, false);
        assert_eq!(list.len(), 3);
        assert!(list.get(0).unwrap().is_null());

        list.set(2, SassValue::string("baz")).unwrap();
        assert_eq!(list.get(2).unwrap(), &SassValue::string("baz"));

        let err = list.set(3, SassValue::NULL).unwrap_err();
        assert_eq!(err, ValueError::Range { index: 3, len: 3 });
        assert!(list.get(5).is_err());
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn test_map_is_fixed_length() {
        let mut map = SassMap::new(2);
        map.set_key(0, SassValue::string("hello")).unwrap();
        map.set_value(0, SassValue::string("world")).unwrap();

        assert_eq!(map.key(0).unwrap(), &SassValue::string("hello"));
        assert_eq!(
            map.get(&SassValue::string("hello")),
            Some(&SassValue::string("world"))
        );
        assert!(map.value(1).unwrap().is_null());
        assert!(matches!(
            map.set_key(2, SassValue::NULL),
            Err(ValueError::Range { index: 2, len: 2 })
        ));
    }

    #[test]
    fn test_string_quoting_is_preserved() {
        let quoted = SassString::new("\"barbar\"");
        assert!(quoted.is_quoted());
        assert_eq!(quoted.value(), "\"barbar\"");
        assert_eq!(quoted.unquoted(), "barbar");

        let bare = SassString::new("bar");
        assert!(!bare.is_quoted());
        assert_eq!(bare.unquoted(), "bar");
    }

    #[test]
    fn test_number_setters() {
        let mut n = SassNumber::new(42.0, "px");
        n.set_unit("rem");
        assert_eq!(SassValue::from(n.clone()).to_string(), "42rem");
        n.set_value(n.value() * 2.0);
        assert_eq!(n.value(), 84.0);
    }

    #[test]
    fn test_display_css_text() {
        assert_eq!(SassValue::number(66.0, "em").to_string(), "66em");
        assert_eq!(SassValue::unitless(0.5).to_string(), "0.5");
        assert_eq!(SassValue::NULL.to_string(), "");
        assert_eq!(SassValue::from(SassColor::rgb(255, 0, 0)).to_string(), "#ff0000");
        assert_eq!(
            SassValue::from(SassColor::new(255, 255, 0, 0.5)).to_string(),
            "rgba(255, 255, 0, 0.5)"
        );

        let list = SassList::from_values(
            vec![SassValue::string("h2"), SassValue::string("h3")],
            Separator::Comma,
        );
        assert_eq!(SassValue::from(list).to_string(), "h2, h3");

        let mut spaced = SassList::from_values(
            vec![SassValue::number(1.0, "px"), SassValue::string("solid")],
            Separator::Space,
        );
        spaced.set_bracketed(true);
        assert_eq!(SassValue::from(spaced).to_string(), "[1px solid]");

        let map = SassMap::from_entries(vec![(
            SassValue::string("abc"),
            SassValue::unitless(123.0),
        )]);
        assert_eq!(SassValue::from(map).to_string(), "(abc: 123)");
    }

    #[test]
    fn test_format_number_trims() {
        assert_eq!(format_number(126.0), "126");
        assert_eq!(format_number(0.2), "0.2");
        assert_eq!(format_number(1.0 / 3.0), "0.3333333333");
        assert_eq!(format_number(-0.0), "0");
    }
}

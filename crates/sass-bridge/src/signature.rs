//! Custom function signature parsing.
//!
//! Copyright (c) 2025 Posit, PBC
//!
//! Functions are registered either by bare name (`foo`) or by a full
//! signature (`headings($from: 0, $to: 6)`). Defaults are kept as raw
//! source text: the engine evaluates and applies them before a call ever
//! reaches the dispatcher.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::SignatureError;

/// `name` optionally followed by a parenthesized parameter list.
static SIGNATURE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*(-?[A-Za-z_][A-Za-z0-9_-]*)\s*(?:\((.*)\))?\s*$").unwrap()
});

/// A single declared parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    /// Name without the leading `$`
    pub name: String,
    /// Default expression as written, if any
    pub default: Option<String>,
    /// `$args...` collects the remaining arguments
    pub rest: bool,
}

/// A parsed custom function signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    name: String,
    /// `None` when registered by bare name (arity unknown)
    params: Option<Vec<Param>>,
}

impl FunctionSignature {
    pub fn parse(signature: &str) -> Result<Self, SignatureError> {
        let fail = |reason: &str| SignatureError {
            signature: signature.to_string(),
            reason: reason.to_string(),
        };

        let caps = SIGNATURE
            .captures(signature)
            .ok_or_else(|| fail("expected `name` or `name($arg, ...)`"))?;
        let name = caps[1].to_string();

        let Some(list) = caps.get(2) else {
            return Ok(Self { name, params: None });
        };

        let pieces = split_top_level(list.as_str()).map_err(|reason| fail(reason))?;
        let mut params = Vec::with_capacity(pieces.len());
        for (index, piece) in pieces.iter().enumerate() {
            let param = parse_param(piece).map_err(|reason| fail(reason))?;
            if param.rest && index + 1 != pieces.len() {
                return Err(fail("only the last parameter may be variadic"));
            }
            params.push(param);
        }

        Ok(Self {
            name,
            params: Some(params),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name with `-` and `_` unified, as the style-sheet language compares them.
    pub fn lookup_key(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn params(&self) -> Option<&[Param]> {
        self.params.as_deref()
    }

    /// Number of declared parameters, or `None` when unknown or variadic.
    pub fn arity(&self) -> Option<usize> {
        let params = self.params.as_ref()?;
        if params.iter().any(|p| p.rest) {
            None
        } else {
            Some(params.len())
        }
    }

    /// Canonical declaration handed to the engine.
    ///
    /// Bare names are declared variadic so every call is passed through
    /// positionally.
    pub fn declaration(&self) -> String {
        let Some(params) = &self.params else {
            return format!("{}($args...)", self.name);
        };
        let params = params
            .iter()
            .map(|p| match (&p.default, p.rest) {
                (_, true) => format!("${}...", p.name),
                (Some(default), false) => format!("${}: {}", p.name, default),
                (None, false) => format!("${}", p.name),
            })
            .collect::<Vec<_>>()
            .join(", ");
        format!("{}({})", self.name, params)
    }
}

/// Unify `-` and `_` in a function name.
pub fn normalize_name(name: &str) -> String {
    name.replace('-', "_")
}

fn parse_param(piece: &str) -> Result<Param, &'static str> {
    let piece = piece.trim();
    let Some(rest_of) = piece.strip_prefix('$') else {
        return Err("parameters must start with `$`");
    };

    let (head, default) = match rest_of.split_once(':') {
        Some((head, default)) => {
            let default = default.trim();
            if default.is_empty() {
                return Err("default value is empty");
            }
            (head.trim(), Some(default.to_string()))
        }
        None => (rest_of.trim(), None),
    };

    let (name, rest) = match head.strip_suffix("...") {
        Some(name) => (name.trim(), true),
        None => (head, false),
    };

    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err("invalid parameter name");
    }
    if rest && default.is_some() {
        return Err("variadic parameters cannot have defaults");
    }

    Ok(Param {
        name: name.to_string(),
        default,
        rest,
    })
}

/// Split a parameter list on commas that are not nested in brackets or quotes.
fn split_top_level(list: &str) -> Result<Vec<&str>, &'static str> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut pieces = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in list.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, '(' | '[') => depth += 1,
            (None, ')' | ']') => {
                depth = depth.checked_sub(1).ok_or("unbalanced brackets")?;
            }
            (None, ',') if depth == 0 => {
                pieces.push(&list[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 || quote.is_some() {
        return Err("unbalanced brackets or quotes");
    }
    pieces.push(&list[start..]);

    if pieces.iter().any(|p| p.trim().is_empty()) {
        return Err("empty parameter");
    }
    Ok(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_name_has_unknown_arity() {
        let sig = FunctionSignature::parse("foo").unwrap();
        assert_eq!(sig.name(), "foo");
        assert!(sig.params().is_none());
        assert_eq!(sig.arity(), None);
        assert_eq!(sig.declaration(), "foo($args...)");
    }

    #[test]
    fn test_nullary() {
        let sig = FunctionSignature::parse("foo()").unwrap();
        assert_eq!(sig.params(), Some(&[][..]));
        assert_eq!(sig.arity(), Some(0));
    }

    #[test]
    fn test_parameters_and_defaults() {
        let sig = FunctionSignature::parse("headings($from: 0, $to: 6)").unwrap();
        let params = sig.params().unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].name, "from");
        assert_eq!(params[0].default.as_deref(), Some("0"));
        assert_eq!(params[1].name, "to");
        assert_eq!(sig.declaration(), "headings($from: 0, $to: 6)");
    }

    #[test]
    fn test_default_with_nested_commas() {
        let sig = FunctionSignature::parse("pick($list: (a, b, c), $sep: ', ')").unwrap();
        let params = sig.params().unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params[0].default.as_deref(), Some("(a, b, c)"));
        assert_eq!(params[1].default.as_deref(), Some("', '"));
    }

    #[test]
    fn test_variadic() {
        let sig = FunctionSignature::parse("sum($first, $rest...)").unwrap();
        assert!(sig.params().unwrap()[1].rest);
        assert_eq!(sig.arity(), None);

        assert!(FunctionSignature::parse("bad($rest..., $after)").is_err());
    }

    #[test]
    fn test_lookup_key_unifies_dashes() {
        let sig = FunctionSignature::parse("my-func($a)").unwrap();
        assert_eq!(sig.lookup_key(), normalize_name("my_func"));
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "foo(a)", "foo($a,)", "foo($a: )", "foo(($a)", "1foo()"] {
            assert!(FunctionSignature::parse(bad).is_err(), "{bad:?} should fail");
        }
    }
}

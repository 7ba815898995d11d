//! Expression evaluation capability
//!
//! The expression language itself lives outside the engine; configuration
//! values are handed to an [`ExpressionEvaluator`] together with the active
//! environment's values. [`PlaceholderEvaluator`] is the built-in default and
//! understands plain `${name}` substitution (`$${` escapes a literal `${`).

use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Evaluates an expression against a set of named values
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate `expression`, resolving variables from `values`
    fn evaluate(&self, expression: &str, values: &BTreeMap<String, String>) -> Result<String>;
}

/// `${name}` substitution
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderEvaluator;

impl ExpressionEvaluator for PlaceholderEvaluator {
    fn evaluate(&self, expression: &str, values: &BTreeMap<String, String>) -> Result<String> {
        let mut out = String::with_capacity(expression.len());
        let mut rest = expression;

        while let Some(start) = rest.find('$') {
            out.push_str(&rest[..start]);
            let tail = &rest[start..];

            if let Some(escaped) = tail.strip_prefix("$${") {
                out.push_str("${");
                rest = escaped;
            } else if let Some(open) = tail.strip_prefix("${") {
                let end = open.find('}').ok_or_else(|| {
                    Error::Expression(format!("unterminated placeholder in '{}'", expression))
                })?;
                let name = open[..end].trim();
                let value = values.get(name).ok_or_else(|| {
                    Error::Expression(format!("unknown variable '{}'", name))
                })?;
                out.push_str(value);
                rest = &open[end + 1..];
            } else {
                out.push('$');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values() -> BTreeMap<String, String> {
        let mut values = BTreeMap::new();
        values.insert("host".to_string(), "db.local".to_string());
        values.insert("port".to_string(), "5432".to_string());
        values
    }

    #[test]
    fn test_substitutes_placeholders() {
        let out = PlaceholderEvaluator
            .evaluate("${host}:${ port }/app", &values())
            .unwrap();
        assert_eq!(out, "db.local:5432/app");
    }

    #[test]
    fn test_plain_text_untouched() {
        let out = PlaceholderEvaluator.evaluate("cost $5", &values()).unwrap();
        assert_eq!(out, "cost $5");
    }

    #[test]
    fn test_escape() {
        let out = PlaceholderEvaluator.evaluate("$${host}", &values()).unwrap();
        assert_eq!(out, "${host}");
    }

    #[test]
    fn test_unknown_variable() {
        let err = PlaceholderEvaluator.evaluate("${user}", &values()).unwrap_err();
        assert!(matches!(err, Error::Expression(_)));
        assert!(err.to_string().contains("user"));
    }

    #[test]
    fn test_unterminated() {
        assert!(PlaceholderEvaluator.evaluate("${host", &values()).is_err());
    }
}

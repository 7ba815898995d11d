//! Flattened configuration
//!
//! Configuration is a flat, ordered map of dotted keys to string values:
//!
//! ```toml
//! [changes]
//! directory = "db/changes"
//!
//! [connectors.main]
//! type = "jdbc"
//! url = "sqlite:${data_dir}/app.db"
//!
//! [environments.DEV]
//! data_dir = "/var/lib/app-dev"
//! ```
//!
//! flattens to `changes.directory`, `connectors.main.type`,
//! `connectors.main.url` and `environments.DEV.data_dir`. Flat maps compare
//! and hash cheaply, which the named-config caches rely on.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::expression::ExpressionEvaluator;

/// Flattened key/value configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Configuration {
    values: BTreeMap<String, String>,
}

impl Configuration {
    /// Create an empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration from already-flattened entries
    pub fn from_map(values: BTreeMap<String, String>) -> Self {
        Configuration { values }
    }

    /// Parse TOML text, flattening nested tables into dotted keys
    ///
    /// Scalars are stringified; arrays of scalars are joined with `,`.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let table: toml::Table = content
            .parse()
            .map_err(|e| Error::configuration(format!("invalid TOML: {}", e)))?;
        let mut values = BTreeMap::new();
        flatten_table("", &table, &mut values)?;
        Ok(Configuration { values })
    }

    /// Read and parse a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::configuration(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content).map_err(|e| match e {
            Error::Configuration(reason) => {
                Error::configuration(format!("{}: {}", path.display(), reason))
            }
            other => other,
        })
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Look up a value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Look up a value that must be present and non-blank
    pub fn require(&self, key: &str) -> Result<&str> {
        match self.get(key) {
            Some(value) if !value.trim().is_empty() => Ok(value),
            _ => Err(Error::configuration(format!("missing required key '{}'", key))),
        }
    }

    /// Look up a value with a fallback
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Look up a boolean (`true`/`false`, case-insensitive)
    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key) {
            None => Ok(default),
            Some(value) if value.eq_ignore_ascii_case("true") => Ok(true),
            Some(value) if value.eq_ignore_ascii_case("false") => Ok(false),
            Some(value) => Err(Error::configuration(format!(
                "'{}' must be true or false, got '{}'",
                key, value
            ))),
        }
    }

    /// Look up a non-negative integer
    pub fn get_u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.get(key) {
            None => Ok(default),
            Some(value) => value.trim().parse().map_err(|_| {
                Error::configuration(format!(
                    "'{}' must be a non-negative integer, got '{}'",
                    key, value
                ))
            }),
        }
    }

    /// Look up a whole number of seconds
    pub fn get_duration_secs(&self, key: &str, default: Duration) -> Result<Duration> {
        match self.get(key) {
            None => Ok(default),
            Some(_) => Ok(Duration::from_secs(self.get_u64(key, 0)?)),
        }
    }

    /// Entries under `prefix.`, with the prefix stripped
    ///
    /// `subset("connectors.main")` turns `connectors.main.url` into `url`.
    pub fn subset(&self, prefix: &str) -> Configuration {
        let prefix = format!("{}.", prefix.trim_end_matches('.'));
        let values = self
            .values
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(key, value)| (key[prefix.len()..].to_string(), value.clone()))
            .collect();
        Configuration { values }
    }

    /// Evaluate every value as an expression against `values`
    pub fn evaluate(
        &self,
        evaluator: &dyn ExpressionEvaluator,
        values: &BTreeMap<String, String>,
    ) -> Result<Configuration> {
        let mut evaluated = BTreeMap::new();
        for (key, expression) in &self.values {
            let value = evaluator.evaluate(expression, values).map_err(|e| match e {
                Error::Expression(reason) => {
                    Error::Expression(format!("while evaluating '{}': {}", key, reason))
                }
                other => other,
            })?;
            evaluated.insert(key.clone(), value);
        }
        Ok(Configuration { values: evaluated })
    }

    /// Iterate over entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Borrow the underlying map
    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True if there are no entries
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl FromIterator<(String, String)> for Configuration {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Configuration {
            values: iter.into_iter().collect(),
        }
    }
}

fn flatten_table(
    prefix: &str,
    table: &toml::Table,
    out: &mut BTreeMap<String, String>,
) -> Result<()> {
    for (key, value) in table {
        let full_key = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{}.{}", prefix, key)
        };
        match value {
            toml::Value::Table(nested) => flatten_table(&full_key, nested, out)?,
            toml::Value::Array(items) => {
                let joined = items
                    .iter()
                    .map(|item| scalar_to_string(&full_key, item))
                    .collect::<Result<Vec<_>>>()?
                    .join(",");
                out.insert(full_key, joined);
            }
            scalar => {
                let value = scalar_to_string(&full_key, scalar)?;
                out.insert(full_key, value);
            }
        }
    }
    Ok(())
}

fn scalar_to_string(key: &str, value: &toml::Value) -> Result<String> {
    match value {
        toml::Value::String(s) => Ok(s.clone()),
        toml::Value::Integer(i) => Ok(i.to_string()),
        toml::Value::Float(f) => Ok(f.to_string()),
        toml::Value::Boolean(b) => Ok(b.to_string()),
        toml::Value::Datetime(d) => Ok(d.to_string()),
        toml::Value::Array(_) | toml::Value::Table(_) => Err(Error::configuration(format!(
            "'{}' must be a scalar or an array of scalars",
            key
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::PlaceholderEvaluator;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
[changes]
directory = "db/changes"
max-path-length = 128

[lock]
enabled = false

[connectors.main]
type = "jdbc"
url = "sqlite:${data_dir}/app.db"
hosts = ["a", "b"]

[environments.DEV]
data_dir = "/tmp/dev"
"#;

    #[test]
    fn test_flatten_toml() {
        let config = Configuration::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.get("changes.directory"), Some("db/changes"));
        assert_eq!(config.get("changes.max-path-length"), Some("128"));
        assert_eq!(config.get("lock.enabled"), Some("false"));
        assert_eq!(config.get("connectors.main.hosts"), Some("a,b"));
        assert_eq!(config.get("environments.DEV.data_dir"), Some("/tmp/dev"));
    }

    #[test]
    fn test_invalid_toml() {
        let err = Configuration::from_toml_str("[broken").unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_nested_array_rejected() {
        let err = Configuration::from_toml_str("x = [[1], [2]]").unwrap_err();
        assert!(err.to_string().contains("'x'"));
    }

    #[test]
    fn test_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("schemata.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = Configuration::from_file(&path).unwrap();
        assert_eq!(config.get("connectors.main.type"), Some("jdbc"));

        let missing = Configuration::from_file(&dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_subset_strips_prefix() {
        let config = Configuration::from_toml_str(SAMPLE).unwrap();
        let main = config.subset("connectors.main");
        assert_eq!(main.get("type"), Some("jdbc"));
        assert_eq!(main.len(), 3);
        assert!(config.subset("connectors.other").is_empty());
        assert_eq!(config.subset("connectors.main."), main);
    }

    #[test]
    fn test_subset_does_not_match_partial_segment() {
        let config = Configuration::new()
            .with("connectors.main.type", "jdbc")
            .with("connectors.mainframe.type", "shell");
        let main = config.subset("connectors.main");
        assert_eq!(main.len(), 1);
        assert_eq!(main.get("type"), Some("jdbc"));
    }

    #[test]
    fn test_typed_getters() {
        let config = Configuration::new()
            .with("flag", "TRUE")
            .with("bad_flag", "yes")
            .with("count", " 42 ")
            .with("bad_count", "-3");
        assert!(config.get_bool("flag", false).unwrap());
        assert!(config.get_bool("absent", true).unwrap());
        assert!(config.get_bool("bad_flag", false).is_err());
        assert_eq!(config.get_u64("count", 0).unwrap(), 42);
        assert_eq!(config.get_u64("absent", 7).unwrap(), 7);
        assert!(config.get_u64("bad_count", 0).is_err());
        assert_eq!(
            config.get_duration_secs("count", Duration::ZERO).unwrap(),
            Duration::from_secs(42)
        );
        assert_eq!(
            config.get_duration_secs("absent", Duration::from_secs(60)).unwrap(),
            Duration::from_secs(60)
        );
        assert!(config.get_duration_secs("bad_count", Duration::ZERO).is_err());
    }

    #[test]
    fn test_require() {
        let config = Configuration::new().with("a", "x").with("blank", "  ");
        assert_eq!(config.require("a").unwrap(), "x");
        assert!(config.require("blank").is_err());
        assert!(config.require("absent").is_err());
    }

    #[test]
    fn test_evaluate() {
        let config = Configuration::from_toml_str(SAMPLE).unwrap();
        let mut values = BTreeMap::new();
        values.insert("data_dir".to_string(), "/srv".to_string());
        let evaluated = config.evaluate(&PlaceholderEvaluator, &values).unwrap();
        assert_eq!(evaluated.get("connectors.main.url"), Some("sqlite:/srv/app.db"));

        let err = config
            .evaluate(&PlaceholderEvaluator, &BTreeMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("connectors.main.url"));
    }
}

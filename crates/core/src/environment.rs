//! Target environment of a run

use std::collections::BTreeMap;
use std::fmt;

use crate::config::Configuration;

/// Variable name under which the environment name is exposed to expressions
pub const ENVIRONMENT_VARIABLE: &str = "environment";

/// The environment a run targets (e.g. `DEV`, `PROD`)
///
/// Carries the variables used to evaluate configuration expressions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    name: String,
    values: BTreeMap<String, String>,
}

impl Environment {
    /// Create an environment with no variables
    pub fn new(name: impl Into<String>) -> Self {
        Environment {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    /// Create an environment whose variables come from `environments.<name>.*`
    pub fn from_configuration(name: impl Into<String>, config: &Configuration) -> Self {
        let name = name.into();
        let values = config
            .subset(&format!("environments.{}", name))
            .as_map()
            .clone();
        Environment { name, values }
    }

    /// Builder-style variable insert
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Environment name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared variables
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Variables visible to expression evaluation
    ///
    /// The declared variables plus `environment` bound to the name, unless a
    /// variable of that name is declared explicitly.
    pub fn expression_values(&self) -> BTreeMap<String, String> {
        let mut values = self.values.clone();
        values
            .entry(ENVIRONMENT_VARIABLE.to_string())
            .or_insert_with(|| self.name.clone());
        values
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_configuration() {
        let config = Configuration::new()
            .with("environments.DEV.host", "localhost")
            .with("environments.PROD.host", "db.prod");
        let dev = Environment::from_configuration("DEV", &config);
        assert_eq!(dev.name(), "DEV");
        assert_eq!(dev.values().get("host").map(String::as_str), Some("localhost"));
        assert_eq!(dev.values().len(), 1);
    }

    #[test]
    fn test_expression_values_include_name() {
        let env = Environment::new("QA").with_value("x", "1");
        let values = env.expression_values();
        assert_eq!(values.get("environment").map(String::as_str), Some("QA"));
        assert_eq!(values.get("x").map(String::as_str), Some("1"));

        let overridden = Environment::new("QA").with_value("environment", "qa-eu");
        assert_eq!(
            overridden.expression_values().get("environment").map(String::as_str),
            Some("qa-eu")
        );
    }
}

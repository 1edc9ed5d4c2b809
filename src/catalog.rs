//! Transformation vocabulary and global naming rules.
//!
//! The built-in catalog is an embedded YAML document parsed once per process.
//! Custom, user-defined transformations are merged on top with
//! [`RuleCatalog::with_custom`]; the mapping engine itself never checks that a
//! transformation identifier is known.

use std::{fs, path::Path, sync::OnceLock};

use anyhow::Context;
use heck::ToTitleCase;
use itertools::Itertools;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const BUILTIN_CATALOG: &str = include_str!("catalog.yaml");
const CUSTOM_CATEGORY: &str = "Custom";

static BUILTIN: OnceLock<RuleCatalog> = OnceLock::new();

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to parse transformation catalog: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Global rule '{rule}' has an invalid pattern: {source}")]
    InvalidPattern {
        rule: String,
        #[source]
        source: regex::Error,
    },
    #[error("Transformation '{transformation}' has no parameter named '{name}'")]
    UnknownParameter {
        transformation: String,
        name: String,
    },
    #[error("Parameter '{name}' of '{transformation}' {reason}")]
    InvalidParameter {
        transformation: String,
        name: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    #[default]
    Text,
    Integer,
    Choice,
}

/// One entry of a transformation's parameter schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterField {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub kind: ParameterKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
}

impl ParameterField {
    /// Explains why `value` is unacceptable, or `None` when it is fine.
    fn rejection(&self, value: &Value) -> Option<String> {
        let text = match value {
            Value::Null if self.required => return Some("is required".to_string()),
            Value::Null => return None,
            Value::String(text) => text.trim().to_string(),
            Value::Number(number) => number.to_string(),
            Value::Bool(flag) => flag.to_string(),
            _ => return Some("must be a scalar value".to_string()),
        };
        if text.is_empty() {
            return self.required.then(|| "is required".to_string());
        }
        match self.kind {
            ParameterKind::Text => None,
            ParameterKind::Integer => text
                .parse::<i64>()
                .is_err()
                .then(|| format!("must be an integer (got '{text}')")),
            ParameterKind::Choice => (!self.options.iter().any(|option| option == &text))
                .then(|| format!("must be one of {} (got '{text}')", self.options.join(", "))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub id: String,
    pub label: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<ParameterField>,
}

/// A transformation definition supplied at runtime. Label and category are
/// optional and filled in when merged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CustomDefinition {
    pub id: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub params: Vec<ParameterField>,
}

impl From<CustomDefinition> for RuleDefinition {
    fn from(custom: CustomDefinition) -> Self {
        let label = custom
            .label
            .filter(|label| !label.trim().is_empty())
            .unwrap_or_else(|| custom.id.to_title_case());
        let category = custom
            .category
            .filter(|category| !category.trim().is_empty())
            .unwrap_or_else(|| CUSTOM_CATEGORY.to_string());
        RuleDefinition {
            id: custom.id,
            label,
            category,
            params: custom.params,
        }
    }
}

/// Maps column names matching `pattern` (case-insensitively) to a transformation.
#[derive(Debug, Clone)]
pub struct GlobalRule {
    pub id: String,
    pub pattern: String,
    pub transformation: String,
    regex: Regex,
}

impl GlobalRule {
    pub fn new(
        id: impl Into<String>,
        pattern: impl Into<String>,
        transformation: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        let id = id.into();
        let pattern = pattern.into();
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(true)
            .build()
            .map_err(|source| CatalogError::InvalidPattern {
                rule: id.clone(),
                source,
            })?;
        Ok(Self {
            id,
            pattern,
            transformation: transformation.into(),
            regex,
        })
    }

    pub fn matches(&self, column: &str) -> bool {
        self.regex.is_match(column)
    }
}

#[derive(Debug, Deserialize)]
struct RawRule {
    id: String,
    pattern: String,
    transformation: String,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    transformations: Vec<RuleDefinition>,
    #[serde(default)]
    global_rules: Vec<RawRule>,
}

/// Definitions sharing a category, in catalog order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleGroup<'a> {
    pub category: &'a str,
    pub definitions: Vec<&'a RuleDefinition>,
}

#[derive(Debug, Clone)]
pub struct RuleCatalog {
    definitions: Vec<RuleDefinition>,
    rules: Vec<GlobalRule>,
}

impl RuleCatalog {
    /// The catalog shipped with the crate.
    ///
    /// # Panics
    ///
    /// Panics if the embedded catalog is malformed, which the test suite rules out.
    pub fn builtin() -> &'static RuleCatalog {
        BUILTIN.get_or_init(|| {
            RuleCatalog::from_yaml_str(BUILTIN_CATALOG).expect("embedded catalog is valid")
        })
    }

    pub fn from_yaml_str(input: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_yaml::from_str(input)?;
        let rules = raw
            .global_rules
            .into_iter()
            .map(|rule| GlobalRule::new(rule.id, rule.pattern, rule.transformation))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            definitions: raw.transformations,
            rules,
        })
    }

    pub fn new(definitions: Vec<RuleDefinition>, rules: Vec<GlobalRule>) -> Self {
        Self { definitions, rules }
    }

    /// Returns a copy of this catalog with `custom` merged in. A custom
    /// definition reusing an existing id replaces it in place; others are
    /// appended in the order given.
    pub fn with_custom<I>(&self, custom: I) -> Self
    where
        I: IntoIterator<Item = CustomDefinition>,
    {
        let mut merged = self.clone();
        for definition in custom.into_iter().map(RuleDefinition::from) {
            match merged
                .definitions
                .iter_mut()
                .find(|existing| existing.id == definition.id)
            {
                Some(existing) => *existing = definition,
                None => merged.definitions.push(definition),
            }
        }
        merged
    }

    pub fn definitions(&self) -> &[RuleDefinition] {
        &self.definitions
    }

    pub fn definition(&self, id: &str) -> Option<&RuleDefinition> {
        self.definitions.iter().find(|definition| definition.id == id)
    }

    /// Definitions grouped by category, categories in order of first appearance.
    pub fn list_transformations(&self) -> Vec<RuleGroup<'_>> {
        self.definitions
            .iter()
            .map(|definition| definition.category.as_str())
            .unique()
            .map(|category| RuleGroup {
                category,
                definitions: self
                    .definitions
                    .iter()
                    .filter(|definition| definition.category == category)
                    .collect(),
            })
            .collect()
    }

    pub fn list_global_rules(&self) -> &[GlobalRule] {
        &self.rules
    }

    /// First global rule matching `column`, in catalog order.
    pub fn match_rule(&self, column: &str) -> Option<&GlobalRule> {
        self.rules.iter().find(|rule| rule.matches(column))
    }

    /// Parameter schema of `transformation`; `None` when unknown or parameterless.
    pub fn parameter_schema(&self, transformation: &str) -> Option<&[ParameterField]> {
        self.definition(transformation)
            .map(|definition| definition.params.as_slice())
            .filter(|params| !params.is_empty())
    }

    /// Validates a parameter edit against the declared schema. Transformations
    /// without a schema accept anything.
    pub fn check_parameter(
        &self,
        transformation: &str,
        name: &str,
        value: &Value,
    ) -> Result<(), CatalogError> {
        let Some(schema) = self.parameter_schema(transformation) else {
            return Ok(());
        };
        let field = schema.iter().find(|field| field.name == name).ok_or_else(|| {
            CatalogError::UnknownParameter {
                transformation: transformation.to_string(),
                name: name.to_string(),
            }
        })?;
        match field.rejection(value) {
            Some(reason) => Err(CatalogError::InvalidParameter {
                transformation: transformation.to_string(),
                name: name.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Reads custom transformation definitions from a YAML (or JSON) list.
pub fn load_custom_definitions(path: &Path) -> anyhow::Result<Vec<CustomDefinition>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Reading custom transformations from {path:?}"))?;
    serde_yaml::from_str(&raw)
        .with_context(|| format!("Parsing custom transformations from {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_catalog_parses() {
        let catalog = RuleCatalog::builtin();
        assert!(catalog.definition("direct").is_some());
        assert!(catalog.definition("custom_sql").is_some());
        assert!(!catalog.list_global_rules().is_empty());
    }

    #[test]
    fn choice_parameters_reject_unknown_options() {
        let catalog = RuleCatalog::builtin();
        assert!(catalog.check_parameter("mask", "strategy", &json!("email")).is_ok());
        let err = catalog
            .check_parameter("mask", "strategy", &json!("rot13"))
            .unwrap_err();
        assert!(err.to_string().contains("must be one of"));
    }

    #[test]
    fn integer_parameters_accept_numbers_and_numeric_text() {
        let catalog = RuleCatalog::builtin();
        assert!(catalog.check_parameter("substring", "start", &json!(3)).is_ok());
        assert!(catalog.check_parameter("substring", "start", &json!(" 7 ")).is_ok());
        assert!(catalog.check_parameter("substring", "start", &json!("x")).is_err());
        assert!(catalog.check_parameter("substring", "start", &Value::Null).is_err());
        assert!(catalog.check_parameter("substring", "length", &Value::Null).is_ok());
    }
}

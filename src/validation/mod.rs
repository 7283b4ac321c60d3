//! Field-level validation of resource models.
//!
//! Models describe their rules in [`Model::validate`](crate::dsl::Model::validate)
//! against a [`Validation`] accumulator. Custom named rules live in a
//! [`Validator`] assembled once at startup and shared by every handler.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

pub type Rule = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Registry of custom validation rules, keyed by rule name
#[derive(Clone, Default)]
pub struct Validator {
    rules: Arc<HashMap<String, Rule>>,
}

impl Validator {
    pub fn builder() -> ValidatorBuilder {
        ValidatorBuilder::default()
    }

    pub fn has_rule(&self, name: &str) -> bool {
        self.rules.contains_key(name)
    }

    fn rule(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.rules.keys().collect();
        names.sort();
        f.debug_struct("Validator").field("rules", &names).finish()
    }
}

#[derive(Default)]
pub struct ValidatorBuilder {
    rules: HashMap<String, Rule>,
}

impl ValidatorBuilder {
    pub fn rule<F>(mut self, name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.rules.insert(name.into(), Arc::new(check));
        self
    }

    pub fn build(self) -> Validator {
        Validator { rules: Arc::new(self.rules) }
    }
}

/// A failed rule on a field, rendered as `"<field>: <rule>"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: String,
    pub rule: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.rule)
    }
}

impl Serialize for Violation {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Collects violations while a model checks its fields.
pub struct Validation<'a> {
    validator: &'a Validator,
    prefix: String,
    violations: Vec<Violation>,
}

impl<'a> Validation<'a> {
    pub fn new(validator: &'a Validator) -> Self {
        Self { validator, prefix: String::new(), violations: Vec::new() }
    }

    pub fn violation(&mut self, field: &str, rule: &str) -> &mut Self {
        self.violations.push(Violation {
            field: format!("{}{}", self.prefix, field),
            rule: rule.to_string(),
        });
        self
    }

    pub fn check(&mut self, field: &str, rule: &str, ok: bool) -> &mut Self {
        if !ok {
            self.violation(field, rule);
        }
        self
    }

    pub fn required_str(&mut self, field: &str, value: &str) -> &mut Self {
        self.check(field, "required", !value.is_empty())
    }

    pub fn required<T>(&mut self, field: &str, value: &Option<T>) -> &mut Self {
        self.check(field, "required", value.is_some())
    }

    pub fn gt(&mut self, field: &str, value: f64, bound: f64) -> &mut Self {
        self.check(field, "gt", value > bound)
    }

    pub fn gte(&mut self, field: &str, value: f64, bound: f64) -> &mut Self {
        self.check(field, "gte", value >= bound)
    }

    pub fn lt(&mut self, field: &str, value: f64, bound: f64) -> &mut Self {
        self.check(field, "lt", value < bound)
    }

    pub fn lte(&mut self, field: &str, value: f64, bound: f64) -> &mut Self {
        self.check(field, "lte", value <= bound)
    }

    pub fn max_len(&mut self, field: &str, value: &str, max: usize) -> &mut Self {
        self.check(field, "max", value.chars().count() <= max)
    }

    pub fn one_of(&mut self, field: &str, value: &str, options: &[&str]) -> &mut Self {
        self.check(field, "oneof", options.contains(&value))
    }

    /// Runs the custom rule registered under `rule`. An unregistered rule
    /// always fails.
    pub fn custom<T: Serialize + ?Sized>(&mut self, field: &str, rule: &str, value: &T) -> &mut Self {
        let ok = match (self.validator.rule(rule), serde_json::to_value(value)) {
            (Some(check), Ok(json)) => check(&json),
            (None, _) => {
                tracing::warn!("validation rule '{}' is not registered", rule);
                false
            }
            (_, Err(e)) => {
                tracing::warn!("cannot serialize '{}' for rule '{}': {}", field, rule, e);
                false
            }
        };
        self.check(field, rule, ok)
    }

    /// Validates a nested structure, prefixing its field names with `field.`
    pub fn nested<F>(&mut self, field: &str, check: F) -> &mut Self
    where
        F: FnOnce(&mut Validation<'a>),
    {
        let mut inner = Validation {
            validator: self.validator,
            prefix: format!("{}{}.", self.prefix, field),
            violations: Vec::new(),
        };
        check(&mut inner);
        self.violations.extend(inner.violations);
        self
    }

    pub fn finish(self) -> Result<(), Vec<Violation>> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(self.violations)
        }
    }
}

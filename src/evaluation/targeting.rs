use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Comparison operator of a targeting rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    In,
    NotIn,
    GreaterThan,
    LessThan,
}

/// Attribute comparison that maps matching requests to a variation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetingRule {
    pub attribute: String,
    pub operator: Operator,
    #[serde(default)]
    pub values: Vec<String>,
    pub variation: String,
}

/// The first rule that matched, by position in the rule list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleMatch<'a> {
    pub index: usize,
    pub variation: &'a str,
}

/// Textual form of a scalar attribute. Arrays, objects and null have none.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Equality used by `Equals`/`In` and their negations: numeric when both
/// sides parse as numbers, textual otherwise.
fn same_value(attr: &Value, expected: &str) -> Option<bool> {
    if let (Some(lhs), Some(rhs)) = (numeric(attr), parse_number(expected)) {
        return Some(lhs == rhs);
    }
    scalar_text(attr).map(|text| text == expected)
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

impl TargetingRule {
    pub fn new(
        attribute: impl Into<String>,
        operator: Operator,
        values: Vec<String>,
        variation: impl Into<String>,
    ) -> Self {
        Self {
            attribute: attribute.into(),
            operator,
            values,
            variation: variation.into(),
        }
    }

    /// `None` when the attribute is not a scalar.
    fn any_equal(&self, attr: &Value) -> Option<bool> {
        scalar_text(attr)?;
        Some(self.values.iter().any(|v| same_value(attr, v) == Some(true)))
    }

    /// A missing or null attribute never matches, whatever the operator.
    /// Rules without comparison values never match either.
    pub fn matches(&self, attributes: &HashMap<String, Value>) -> bool {
        let attr = match attributes.get(&self.attribute) {
            Some(Value::Null) | None => return false,
            Some(v) => v,
        };
        let Some(first) = self.values.first() else {
            return false;
        };

        match self.operator {
            Operator::Equals => same_value(attr, first) == Some(true),
            Operator::NotEquals => same_value(attr, first) == Some(false),
            Operator::Contains => attr
                .as_str()
                .is_some_and(|s| self.values.iter().any(|v| s.contains(v.as_str()))),
            Operator::NotContains => attr
                .as_str()
                .is_some_and(|s| !self.values.iter().any(|v| s.contains(v.as_str()))),
            Operator::In => self.any_equal(attr) == Some(true),
            Operator::NotIn => self.any_equal(attr) == Some(false),
            Operator::GreaterThan => match (numeric(attr), parse_number(first)) {
                (Some(lhs), Some(rhs)) => lhs > rhs,
                _ => false,
            },
            Operator::LessThan => match (numeric(attr), parse_number(first)) {
                (Some(lhs), Some(rhs)) => lhs < rhs,
                _ => false,
            },
        }
    }
}

/// First rule in list order that matches the attributes.
pub fn resolve<'a>(
    rules: &'a [TargetingRule],
    attributes: &HashMap<String, Value>,
) -> Option<RuleMatch<'a>> {
    rules
        .iter()
        .enumerate()
        .find(|(_, rule)| rule.matches(attributes))
        .map(|(index, rule)| RuleMatch {
            index,
            variation: rule.variation.as_str(),
        })
}

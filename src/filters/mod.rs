//! Device filter expressions for `--filter`.
//!
//! `key=value` selects devices whose attribute equals `value`. `key=a|b` is an
//! OR over values of one key. Repeating `--filter` ANDs the clauses together.
//! Matching is exact and case-sensitive. There is no escape for a literal `|`.

use std::collections::{BTreeMap, HashMap};

use crate::errors::ValidationError;
use crate::models::{FilterClause, FilterExpression, NO_FILTERS_TEXT};

/// Name -> value lookup a device exposes to the filter predicate.
/// The predicate never touches the inventory representation directly.
pub trait DeviceAttributes {
    fn get_attribute(&self, key: &str) -> Option<String>;

    /// Every value the device holds for `key`. Multi-valued attributes
    /// (group membership) override this; a clause matches if any value does.
    fn get_attribute_values(&self, key: &str) -> Vec<String> {
        self.get_attribute(key).into_iter().collect()
    }
}

impl DeviceAttributes for HashMap<String, String> {
    fn get_attribute(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl DeviceAttributes for BTreeMap<String, String> {
    fn get_attribute(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

fn syntax_error(reason: &str, raw: &str) -> ValidationError {
    ValidationError::InvalidFilterSyntax(format!("{} in filter expression '{}'", reason, raw))
}

/// Validate a raw `key=value` string before parsing
pub fn validate_syntax(raw: &str) -> Result<(), ValidationError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| syntax_error("Missing '='", raw))?;

    if key.trim().is_empty() {
        return Err(syntax_error("Empty key", raw));
    }
    if value.trim().is_empty() {
        return Err(syntax_error("Empty value", raw));
    }
    Ok(())
}

/// Parse one `key=v1|v2` string. Splits on the first `=` only.
pub fn parse_one(raw: &str) -> Result<FilterClause, ValidationError> {
    validate_syntax(raw)?;

    // validate_syntax guarantees the separator is present
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| syntax_error("Missing '='", raw))?;

    let values: Vec<String> = value.split('|').map(|v| v.trim().to_string()).collect();
    if values.is_empty() || values.iter().any(|v| v.is_empty()) {
        return Err(syntax_error("No valid values in OR expression", raw));
    }

    Ok(FilterClause::new(key.trim(), values))
}

/// Parse every `--filter` argument in order, failing on the first bad one.
/// `None` and an empty list both mean "no filter" and return `Ok(None)`.
pub fn parse_many<S: AsRef<str>>(
    raw_list: Option<&[S]>,
) -> Result<Option<FilterExpression>, ValidationError> {
    let raw_list = match raw_list {
        Some(list) if !list.is_empty() => list,
        _ => return Ok(None),
    };

    let clauses = raw_list
        .iter()
        .map(|raw| parse_one(raw.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Some(FilterExpression::new(clauses)))
}

/// Human-readable form of an expression, e.g. `role=leaf AND name=l1|l2`
pub fn format_expression(expression: &FilterExpression) -> String {
    if expression.is_empty() {
        return NO_FILTERS_TEXT.to_string();
    }

    expression
        .iter()
        .map(|clause| clause.to_string())
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Display text for an optional expression (absent means no filtering)
pub fn describe(expression: Option<&FilterExpression>) -> String {
    expression.map_or_else(|| NO_FILTERS_TEXT.to_string(), format_expression)
}

/// True iff the device has `clause.key` and some value equals one of `clause.values`
pub fn matches<D: DeviceAttributes + ?Sized>(clause: &FilterClause, device: &D) -> bool {
    device
        .get_attribute_values(&clause.key)
        .iter()
        .any(|actual| clause.values.iter().any(|wanted| wanted == actual))
}

/// AND over every clause; vacuously true for an empty expression
pub fn matches_all<D: DeviceAttributes + ?Sized>(expression: &FilterExpression, device: &D) -> bool {
    expression.iter().all(|clause| matches(clause, device))
}

/// `matches_all` where an absent expression selects everything
pub fn matches_filter<D: DeviceAttributes + ?Sized>(
    expression: Option<&FilterExpression>,
    device: &D,
) -> bool {
    expression.map_or(true, |expr| matches_all(expr, device))
}

// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Label selector parsing and matching
//!
//! Supports the Kubernetes selector syntax:
//!
//! - equality: `app=nginx`, `app==nginx`, `tier!=frontend`
//! - set-based: `env in (prod, staging)`, `env notin (dev)`
//! - existence: `app`, `!canary`
//!
//! Requirements are comma-separated and ANDed. `!=` and `notin` match objects
//! that do not carry the key at all, as in Kubernetes.
//!
//! Keys are qualified names (`[dns-subdomain/]name`) and values are empty or
//! names, with the Kubernetes length limits. Anything else is rejected when
//! the selector is built.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use regex::Regex;

use crate::error::CacheError;

/// Longest name part of a key, and longest value
const MAX_NAME_LEN: usize = 63;
/// Longest DNS subdomain prefix of a key
const MAX_PREFIX_LEN: usize = 253;

/// Name part of a key; also the shape of a non-empty value
static LABEL_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]([-A-Za-z0-9_.]*[A-Za-z0-9])?$").unwrap());

/// Optional key prefix (RFC 1123 subdomain)
static DNS_SUBDOMAIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$").unwrap()
});

fn validate_key(key: &str) -> Result<(), CacheError> {
    let (prefix, name) = match key.split_once('/') {
        Some((prefix, name)) => (Some(prefix), name),
        None => (None, key),
    };

    if let Some(prefix) = prefix
        && (prefix.is_empty() || prefix.len() > MAX_PREFIX_LEN || !DNS_SUBDOMAIN.is_match(prefix))
    {
        return Err(CacheError::InvalidSelector(format!(
            "label key '{}': prefix must be a DNS subdomain of at most {} characters",
            key, MAX_PREFIX_LEN
        )));
    }
    if name.is_empty() || name.len() > MAX_NAME_LEN || !LABEL_NAME.is_match(name) {
        return Err(CacheError::InvalidSelector(format!(
            "label key '{}': name must be 1-{} alphanumeric characters, '-', '_' or '.', \
             starting and ending with an alphanumeric character",
            key, MAX_NAME_LEN
        )));
    }
    Ok(())
}

fn validate_value(key: &str, value: &str) -> Result<(), CacheError> {
    if value.is_empty() {
        return Ok(());
    }
    if value.len() > MAX_NAME_LEN || !LABEL_NAME.is_match(value) {
        return Err(CacheError::InvalidSelector(format!(
            "label '{}': value '{}' must be at most {} alphanumeric characters, '-', '_' or '.', \
             starting and ending with an alphanumeric character",
            key, value, MAX_NAME_LEN
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelOperator {
    Equals,
    DoubleEquals,
    NotEquals,
    In,
    NotIn,
    Exists,
    DoesNotExist,
}

/// One requirement of a label selector, validated on construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelRequirement {
    key: String,
    operator: LabelOperator,
    /// Empty for `Exists` / `DoesNotExist`, one value for the equality operators
    values: BTreeSet<String>,
}

impl LabelRequirement {
    pub fn new(
        key: impl Into<String>,
        operator: LabelOperator,
        values: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, CacheError> {
        let key = key.into();
        let values: BTreeSet<String> = values.into_iter().map(Into::into).collect();
        validate_key(&key)?;
        for value in &values {
            validate_value(&key, value)?;
        }
        match operator {
            LabelOperator::Equals | LabelOperator::DoubleEquals | LabelOperator::NotEquals
                if values.len() != 1 =>
            {
                return Err(CacheError::InvalidSelector(format!(
                    "label '{}': exactly one value required for equality operators",
                    key
                )));
            }
            LabelOperator::In | LabelOperator::NotIn if values.is_empty() => {
                return Err(CacheError::InvalidSelector(format!(
                    "label '{}': values set can't be empty for in/notin",
                    key
                )));
            }
            LabelOperator::Exists | LabelOperator::DoesNotExist if !values.is_empty() => {
                return Err(CacheError::InvalidSelector(format!(
                    "label '{}': values set must be empty for exists/does not exist",
                    key
                )));
            }
            _ => {}
        }
        Ok(Self {
            key,
            operator,
            values,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn operator(&self) -> LabelOperator {
        self.operator
    }

    pub fn values(&self) -> &BTreeSet<String> {
        &self.values
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        let value = labels.get(&self.key);
        match self.operator {
            LabelOperator::Equals | LabelOperator::DoubleEquals | LabelOperator::In => {
                value.is_some_and(|v| self.values.contains(v))
            }
            LabelOperator::NotEquals | LabelOperator::NotIn => {
                value.is_none_or(|v| !self.values.contains(v))
            }
            LabelOperator::Exists => value.is_some(),
            LabelOperator::DoesNotExist => value.is_none(),
        }
    }
}

impl fmt::Display for LabelRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let first = self.values.iter().next().map(String::as_str).unwrap_or("");
        match self.operator {
            LabelOperator::Equals => write!(f, "{}={}", self.key, first),
            LabelOperator::DoubleEquals => write!(f, "{}=={}", self.key, first),
            LabelOperator::NotEquals => write!(f, "{}!={}", self.key, first),
            LabelOperator::In | LabelOperator::NotIn => {
                let op = if self.operator == LabelOperator::In {
                    "in"
                } else {
                    "notin"
                };
                let values: Vec<&str> = self.values.iter().map(String::as_str).collect();
                write!(f, "{} {} ({})", self.key, op, values.join(","))
            }
            LabelOperator::Exists => write!(f, "{}", self.key),
            LabelOperator::DoesNotExist => write!(f, "!{}", self.key),
        }
    }
}

/// A conjunction of label requirements. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<LabelRequirement>,
}

impl LabelSelector {
    /// Equality selector from a label set, e.g. `{app: "x"}` → `app=x`
    pub fn from_labels<K, V>(labels: impl IntoIterator<Item = (K, V)>) -> Result<Self, CacheError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let requirements = labels
            .into_iter()
            .map(|(k, v)| LabelRequirement::new(k, LabelOperator::Equals, [v]))
            .collect::<Result<_, _>>()?;
        Ok(Self { requirements })
    }

    pub fn from_requirements(requirements: Vec<LabelRequirement>) -> Self {
        Self { requirements }
    }

    pub fn requirements(&self) -> &[LabelRequirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.requirements.iter().all(|r| r.matches(labels))
    }
}

impl fmt::Display for LabelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, req) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{}", req)?;
        }
        Ok(())
    }
}

impl FromStr for LabelSelector {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let requirements = split_terms(s)?
            .into_iter()
            .map(parse_requirement)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { requirements })
    }
}

impl TryFrom<&metav1::LabelSelector> for LabelSelector {
    type Error = CacheError;

    /// Convert the structured API form (`matchLabels` + `matchExpressions`)
    fn try_from(sel: &metav1::LabelSelector) -> Result<Self, Self::Error> {
        let mut selector = match &sel.match_labels {
            Some(labels) => LabelSelector::from_labels(labels.clone())?,
            None => LabelSelector::default(),
        };

        for expr in sel.match_expressions.iter().flatten() {
            let operator = match expr.operator.as_str() {
                "In" => LabelOperator::In,
                "NotIn" => LabelOperator::NotIn,
                "Exists" => LabelOperator::Exists,
                "DoesNotExist" => LabelOperator::DoesNotExist,
                other => {
                    return Err(CacheError::InvalidSelector(format!(
                        "{:?} is not a valid label selector operator",
                        other
                    )));
                }
            };
            let values = expr.values.clone().unwrap_or_default();
            selector
                .requirements
                .push(LabelRequirement::new(expr.key.clone(), operator, values)?);
        }

        Ok(selector)
    }
}

/// Split on commas that are not inside a `( ... )` value list
fn split_terms(s: &str) -> Result<Vec<&str>, CacheError> {
    let mut terms = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    CacheError::InvalidSelector(format!("unbalanced ')' in '{}'", s))
                })?
            }
            ',' if depth == 0 => {
                terms.push(&s[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth != 0 {
        return Err(CacheError::InvalidSelector(format!("unbalanced '(' in '{}'", s)));
    }
    terms.push(&s[start..]);

    Ok(terms.into_iter().map(str::trim).filter(|t| !t.is_empty()).collect())
}

fn parse_requirement(term: &str) -> Result<LabelRequirement, CacheError> {
    if let Some(key) = term.strip_prefix('!') {
        return LabelRequirement::new(key.trim(), LabelOperator::DoesNotExist, Vec::<String>::new());
    }

    if let Some(open) = term.find('(') {
        let close = term.rfind(')').filter(|&c| c > open).ok_or_else(|| {
            CacheError::InvalidSelector(format!("missing ')' in '{}'", term))
        })?;
        if !term[close + 1..].trim().is_empty() {
            return Err(CacheError::InvalidSelector(format!(
                "unexpected text after ')' in '{}'",
                term
            )));
        }
        let head: Vec<&str> = term[..open].split_whitespace().collect();
        let (key, operator) = match head.as_slice() {
            [key, "in"] => (*key, LabelOperator::In),
            [key, "notin"] => (*key, LabelOperator::NotIn),
            _ => {
                return Err(CacheError::InvalidSelector(format!(
                    "expected 'key in (...)' or 'key notin (...)', got '{}'",
                    term
                )));
            }
        };
        let values = term[open + 1..close]
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty());
        return LabelRequirement::new(key, operator, values);
    }

    let (idx, operator, width) = if let Some(i) = term.find("!=") {
        (i, LabelOperator::NotEquals, 2)
    } else if let Some(i) = term.find("==") {
        (i, LabelOperator::DoubleEquals, 2)
    } else if let Some(i) = term.find('=') {
        (i, LabelOperator::Equals, 1)
    } else {
        if term.contains(char::is_whitespace) {
            return Err(CacheError::InvalidSelector(format!(
                "invalid label selector term '{}'",
                term
            )));
        }
        return LabelRequirement::new(term, LabelOperator::Exists, Vec::<String>::new());
    };

    LabelRequirement::new(
        term[..idx].trim(),
        operator,
        [term[idx + width..].trim()],
    )
}

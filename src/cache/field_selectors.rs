// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! Field selector parsing
//!
//! Field selectors filter objects by the value of a structured field path,
//! e.g. `status.phase=Running` or `spec.nodeName!=node-1`.
//!
//! ## Field Selector Basics
//!
//! - Only `=`, `==` and `!=` operators exist (no `in`, `notin`, `exists`)
//! - Requirements are comma-separated and ANDed together
//! - Field paths use dot notation: `metadata.name`, `status.phase`
//!
//! The cache can only serve a selector made of a single equality requirement,
//! since it maps directly onto one field index. See [`FieldSelector::requires_exact_match`].

use std::fmt;
use std::str::FromStr;

use crate::error::CacheError;

/// Represents a field selector operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSelectorOperator {
    /// Equals operator (=)
    Equals,
    /// Double equals operator (==), same meaning as `=`
    DoubleEquals,
    /// Not equals operator (!=)
    NotEquals,
}

impl FieldSelectorOperator {
    fn as_str(self) -> &'static str {
        match self {
            FieldSelectorOperator::Equals => "=",
            FieldSelectorOperator::DoubleEquals => "==",
            FieldSelectorOperator::NotEquals => "!=",
        }
    }

    /// True for `=` and `==`
    pub fn is_equality(self) -> bool {
        matches!(
            self,
            FieldSelectorOperator::Equals | FieldSelectorOperator::DoubleEquals
        )
    }
}

/// One `path op value` term of a field selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRequirement {
    /// Field path in Kubernetes notation (e.g., "status.phase", "metadata.name")
    pub path: String,
    pub operator: FieldSelectorOperator,
    pub value: String,
}

impl fmt::Display for FieldRequirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.path, self.operator.as_str(), self.value)
    }
}

/// A parsed field selector: a conjunction of requirements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<FieldRequirement>,
}

impl FieldSelector {
    /// Selector with a single `path=value` requirement
    pub fn equals(path: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            requirements: vec![FieldRequirement {
                path: path.into(),
                operator: FieldSelectorOperator::Equals,
                value: value.into(),
            }],
        }
    }

    pub fn from_requirements(requirements: Vec<FieldRequirement>) -> Self {
        Self { requirements }
    }

    pub fn requirements(&self) -> &[FieldRequirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Returns `(path, value)` when the selector is exactly one `k=v` or `k==v` requirement
    pub fn requires_exact_match(&self) -> Option<(&str, &str)> {
        match self.requirements.as_slice() {
            [req] if req.operator.is_equality() => Some((req.path.as_str(), req.value.as_str())),
            _ => None,
        }
    }
}

impl fmt::Display for FieldSelector {
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

impl FromStr for FieldSelector {
    type Err = CacheError;

    /// Parse `path=value,path!=value` syntax.
    ///
    /// Whitespace around terms is ignored; an empty string is the empty selector.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut requirements = Vec::new();
        for term in s.split(',') {
            let term = term.trim();
            if term.is_empty() {
                continue;
            }
            requirements.push(parse_requirement(term)?);
        }
        Ok(Self { requirements })
    }
}

fn parse_requirement(term: &str) -> Result<FieldRequirement, CacheError> {
    // Order matters: "!=" and "==" must be tried before "="
    let (idx, operator) = if let Some(i) = term.find("!=") {
        (i, FieldSelectorOperator::NotEquals)
    } else if let Some(i) = term.find("==") {
        (i, FieldSelectorOperator::DoubleEquals)
    } else if let Some(i) = term.find('=') {
        (i, FieldSelectorOperator::Equals)
    } else {
        return Err(CacheError::InvalidSelector(format!(
            "invalid field selector term '{}': expected =, == or !=",
            term
        )));
    };

    let path = term[..idx].trim();
    let value = term[idx + operator.as_str().len()..].trim();
    if path.is_empty() {
        return Err(CacheError::InvalidSelector(format!(
            "invalid field selector term '{}': empty field path",
            term
        )));
    }

    Ok(FieldRequirement {
        path: path.to_string(),
        operator,
        value: value.to_string(),
    })
}

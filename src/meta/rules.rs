//! Attribute validation rules.
//!
//! A rule looks at one attribute value and either passes or reports a
//! [`Violation`]: an error code plus the parameters its message template needs.
//! `Record::check` collects violations into the record's
//! [`Errors`](crate::Errors).

use crate::errors::Params;
use crate::value;
use regex::Regex;
use sea_query::Value;
use std::fmt;

/// A failed rule
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub code: &'static str,
    pub params: Params,
}

impl Violation {
    pub fn new(code: &'static str) -> Self {
        Self {
            code,
            params: Params::new(),
        }
    }

    pub fn with(mut self, name: &str, param: impl Into<crate::errors::Param>) -> Self {
        self.params = self.params.with(name, param);
        self
    }
}

/// Validation rule for a single attribute
pub trait Rule: fmt::Debug {
    fn check(&self, value: &Value) -> Result<(), Violation>;
}

/// The value must be present (not NULL, not blank)
#[derive(Debug, Clone, Copy, Default)]
pub struct Present;

impl Rule for Present {
    fn check(&self, value: &Value) -> Result<(), Violation> {
        if value::is_blank(value) {
            Err(Violation::new("present"))
        } else {
            Ok(())
        }
    }
}

/// Character length bounds for text values; NULL passes
#[derive(Debug, Clone, Copy, Default)]
pub struct Length {
    pub minimum: Option<usize>,
    pub maximum: Option<usize>,
}

impl Length {
    pub fn between(minimum: usize, maximum: usize) -> Self {
        Self {
            minimum: Some(minimum),
            maximum: Some(maximum),
        }
    }

    pub fn minimum(minimum: usize) -> Self {
        Self {
            minimum: Some(minimum),
            maximum: None,
        }
    }

    pub fn maximum(maximum: usize) -> Self {
        Self {
            minimum: None,
            maximum: Some(maximum),
        }
    }
}

impl Rule for Length {
    fn check(&self, value: &Value) -> Result<(), Violation> {
        if value::is_null(value) {
            return Ok(());
        }
        let length = value::display(value).chars().count();
        if let Some(minimum) = self.minimum.filter(|m| length < *m) {
            return Err(Violation::new("min_length").with("minimum", minimum.to_string()));
        }
        if let Some(maximum) = self.maximum.filter(|m| length > *m) {
            return Err(Violation::new("max_length").with("maximum", maximum.to_string()));
        }
        Ok(())
    }
}

/// The rendered value must match a regular expression; NULL passes
#[derive(Debug, Clone)]
pub struct Format(pub Regex);

impl Format {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Regex::new(pattern).map(Format)
    }
}

impl Rule for Format {
    fn check(&self, value: &Value) -> Result<(), Violation> {
        if value::is_null(value) || self.0.is_match(&value::display(value)) {
            Ok(())
        } else {
            Err(Violation::new("format").with("regex", self.0.as_str()))
        }
    }
}

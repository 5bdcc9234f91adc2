/*!
# Variable Metadata

A [`VariableSpecification`] describes one modeled variable: its name, whether it is discrete
(and if so whether it is ordinal or Boolean), the labels of its levels, and an optional numeric
range. Every specification carries a [`VarId`], an opaque handle allocated once when the
specification is created. Models, samplers and samples are all keyed by that handle, so two
specifications with identical metadata are still two different variables, while a clone of a
specification refers to the same variable.

```rust
use depnet::variable::VariableSpecification;

let color = VariableSpecification::discrete("color", ["red", "green", "blue"]);
assert!(color.is_discrete());
assert_eq!(color.num_levels(), 3);
assert_eq!(color.level_name(2), Some("blue"));

let height = VariableSpecification::continuous("height").with_range(0.0, 3.0);
assert!(height.has_range());
assert!(height.validate().is_ok());
```
*/

use num_traits::ToPrimitive;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{Error, Result};

static NEXT_VAR_ID: AtomicU64 = AtomicU64::new(0);

/// Stable opaque handle of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(u64);

impl VarId {
    fn fresh() -> Self {
        VarId(NEXT_VAR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "var#{}", self.0)
    }
}

/// Metadata about a variable, used to decide how it is initialized, modeled and encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpecification {
    id: VarId,
    name: String,
    discrete: bool,
    ordinal: bool,
    boolean: bool,
    levels: Vec<String>,
    min: f64,
    max: f64,
}

impl Default for VariableSpecification {
    fn default() -> Self {
        Self::new("")
    }
}

impl VariableSpecification {
    /// Creates an unnamed-by-default continuous, unbounded variable with a fresh id.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: VarId::fresh(),
            name: name.into(),
            discrete: false,
            ordinal: false,
            boolean: false,
            levels: Vec::new(),
            min: f64::NEG_INFINITY,
            max: f64::INFINITY,
        }
    }

    pub fn continuous(name: impl Into<String>) -> Self {
        Self::new(name)
    }

    /// A discrete variable whose integer codes are the positions of `levels`.
    pub fn discrete<I, S>(name: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = Self::new(name);
        spec.set_levels(levels.into_iter().map(Into::into).collect());
        spec
    }

    /// A discrete variable with ordered levels.
    pub fn ordinal<I, S>(name: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut spec = Self::discrete(name, levels);
        spec.set_ordinal(true);
        spec
    }

    /// A two-level indicator with levels `false` (0) and `true` (1).
    pub fn boolean(name: impl Into<String>) -> Self {
        let mut spec = Self::new(name);
        spec.set_boolean(true);
        spec
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.set_range(min, max);
        self
    }

    pub fn id(&self) -> VarId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// True when at least one bound of the range is finite.
    pub fn has_range(&self) -> bool {
        self.min.is_finite() || self.max.is_finite()
    }

    /// `(min, max)`; unbounded sides are infinite.
    pub fn range(&self) -> (f64, f64) {
        (self.min, self.max)
    }

    pub fn set_range(&mut self, min: f64, max: f64) {
        self.min = min;
        self.max = max;
    }

    pub fn is_discrete(&self) -> bool {
        self.discrete
    }

    /// Remember to call [`Self::set_levels`] when marking a variable discrete.
    pub fn set_discrete(&mut self, discrete: bool) {
        self.discrete = discrete;
        if !discrete {
            self.ordinal = false;
            self.boolean = false;
        }
    }

    pub fn is_ordinal(&self) -> bool {
        self.ordinal
    }

    /// Marking a variable ordinal also marks it discrete.
    pub fn set_ordinal(&mut self, ordinal: bool) {
        self.ordinal = ordinal;
        if ordinal {
            self.discrete = true;
        }
    }

    pub fn is_boolean(&self) -> bool {
        self.boolean
    }

    /// Marking a variable Boolean also marks it discrete and, when it has no
    /// levels yet, installs `["false", "true"]`.
    pub fn set_boolean(&mut self, boolean: bool) {
        self.boolean = boolean;
        if boolean {
            self.discrete = true;
            if self.levels.is_empty() {
                self.levels = vec!["false".to_string(), "true".to_string()];
            }
        }
    }

    pub fn levels(&self) -> &[String] {
        &self.levels
    }

    /// Stores the level labels and marks the variable discrete. Ordinal levels
    /// must be supplied in order.
    pub fn set_levels(&mut self, levels: Vec<String>) {
        self.levels = levels;
        self.discrete = true;
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    /// Map from integer level code to level label.
    pub fn level_map(&self) -> BTreeMap<usize, String> {
        self.levels.iter().cloned().enumerate().collect()
    }

    pub fn level_name(&self, code: usize) -> Option<&str> {
        self.levels.get(code).map(String::as_str)
    }

    /// Interprets `value` as a level code. Returns `None` for non-integral,
    /// negative or out-of-range values, and for continuous variables.
    pub fn level_code(&self, value: f64) -> Option<usize> {
        if !self.discrete || value.fract() != 0.0 {
            return None;
        }
        value.to_usize().filter(|&code| code < self.levels.len())
    }

    /// Checks the metadata invariants.
    pub fn validate(&self) -> Result<()> {
        if self.discrete && !self.boolean && self.levels.is_empty() {
            return Err(Error::config(format!(
                "discrete variable `{}` has no levels",
                self.name
            )));
        }
        if self.boolean && self.levels.len() != 2 {
            return Err(Error::config(format!(
                "Boolean variable `{}` must have exactly 2 levels, got {}",
                self.name,
                self.levels.len()
            )));
        }
        if self.min.is_nan() || self.max.is_nan() || self.min > self.max {
            return Err(Error::config(format!(
                "variable `{}` has an invalid range ({}, {})",
                self.name, self.min, self.max
            )));
        }
        Ok(())
    }
}

//! Search space definitions and hyperparameter configurations.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::errors::{HbError, HbResult};

/// A concrete hyperparameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(v) => Some(v),
            _ => None,
        }
    }
}

impl std::fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(v) => write!(f, "{v}"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

/// A hyperparameter configuration. Inactive conditional parameters are absent.
pub type Configuration = BTreeMap<String, ParameterValue>;

/// Describes the range a parameter is drawn from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    /// Continuous range [low, high].
    Float { low: f64, high: f64 },
    /// Integer range [low, high] inclusive.
    Int { low: i64, high: i64 },
    /// Categorical choices.
    Categorical { choices: Vec<ParameterValue> },
}

/// A single parameter dimension in the search space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDef {
    pub name: String,
    pub kind: ParameterKind,
    pub default: ParameterValue,
    /// Sample and discretise in log-space (numeric kinds only).
    #[serde(default)]
    pub log: bool,
}

impl ParameterDef {
    /// Check that `value` is admissible for this parameter.
    pub fn admits(&self, value: &ParameterValue) -> bool {
        match (&self.kind, value) {
            (ParameterKind::Float { low, high }, v) => match v.as_f64() {
                Some(x) => x.is_finite() && x >= *low && x <= *high,
                None => false,
            },
            (ParameterKind::Int { low, high }, ParameterValue::Int(x)) => x >= low && x <= high,
            (ParameterKind::Int { .. }, _) => false,
            (ParameterKind::Categorical { choices }, v) => choices.contains(v),
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParameterValue {
        match &self.kind {
            ParameterKind::Float { low, high } => {
                if self.log {
                    let log_val: f64 = rng.gen_range(low.ln()..=high.ln());
                    ParameterValue::Float(log_val.exp().clamp(*low, *high))
                } else {
                    ParameterValue::Float(rng.gen_range(*low..=*high))
                }
            }
            ParameterKind::Int { low, high } => {
                if self.log {
                    let log_val: f64 = rng.gen_range((*low as f64).ln()..=(*high as f64).ln());
                    ParameterValue::Int((log_val.exp().round() as i64).clamp(*low, *high))
                } else {
                    ParameterValue::Int(rng.gen_range(*low..=*high))
                }
            }
            ParameterKind::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                choices[idx].clone()
            }
        }
    }

    /// Discretise this dimension into at most `steps` values (all choices for
    /// categoricals, all integers when the range is small enough).
    fn axis(&self, steps: usize) -> Vec<ParameterValue> {
        let steps = steps.max(2);
        let spaced = |low: f64, high: f64| -> Vec<f64> {
            let (a, b) = if self.log { (low.ln(), high.ln()) } else { (low, high) };
            (0..steps)
                .map(|i| {
                    let t = i as f64 / (steps - 1) as f64;
                    let x = a + t * (b - a);
                    if self.log {
                        x.exp()
                    } else {
                        x
                    }
                })
                .collect()
        };

        match &self.kind {
            ParameterKind::Float { low, high } => spaced(*low, *high)
                .into_iter()
                .map(|v| ParameterValue::Float(v.clamp(*low, *high)))
                .collect(),
            ParameterKind::Int { low, high } => {
                if (high - low + 1) as usize <= steps {
                    return (*low..=*high).map(ParameterValue::Int).collect();
                }
                let mut values: Vec<i64> = spaced(*low as f64, *high as f64)
                    .into_iter()
                    .map(|v| (v.round() as i64).clamp(*low, *high))
                    .collect();
                values.dedup();
                values.into_iter().map(ParameterValue::Int).collect()
            }
            ParameterKind::Categorical { choices } => choices.clone(),
        }
    }
}

/// Activation rule: `child` is active only when `parent` equals `equals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub child: String,
    pub parent: String,
    pub equals: ParameterValue,
}

/// The full search space: an ordered list of parameter definitions plus the
/// conditions that switch parameters on and off.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SearchSpace {
    pub parameters: Vec<ParameterDef>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

impl SearchSpace {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, name: impl Into<String>, kind: ParameterKind, default: ParameterValue, log: bool) -> Self {
        self.parameters.push(ParameterDef {
            name: name.into(),
            kind,
            default,
            log,
        });
        self
    }

    pub fn add_float(self, name: impl Into<String>, low: f64, high: f64, default: f64) -> Self {
        self.push(name, ParameterKind::Float { low, high }, ParameterValue::Float(default), false)
    }

    pub fn add_log_float(self, name: impl Into<String>, low: f64, high: f64, default: f64) -> Self {
        self.push(name, ParameterKind::Float { low, high }, ParameterValue::Float(default), true)
    }

    pub fn add_int(self, name: impl Into<String>, low: i64, high: i64, default: i64) -> Self {
        self.push(name, ParameterKind::Int { low, high }, ParameterValue::Int(default), false)
    }

    pub fn add_log_int(self, name: impl Into<String>, low: i64, high: i64, default: i64) -> Self {
        self.push(name, ParameterKind::Int { low, high }, ParameterValue::Int(default), true)
    }

    pub fn add_choice(
        self,
        name: impl Into<String>,
        choices: Vec<ParameterValue>,
        default: impl Into<ParameterValue>,
    ) -> Self {
        self.push(name, ParameterKind::Categorical { choices }, default.into(), false)
    }

    pub fn add_condition(
        mut self,
        child: impl Into<String>,
        parent: impl Into<String>,
        equals: impl Into<ParameterValue>,
    ) -> Self {
        self.conditions.push(Condition {
            child: child.into(),
            parent: parent.into(),
            equals: equals.into(),
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterDef> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Check the space itself: bounds, defaults, and that every condition
    /// refers to a parameter declared before its child.
    pub fn check(&self) -> HbResult<()> {
        for (idx, param) in self.parameters.iter().enumerate() {
            if self.parameters[..idx].iter().any(|p| p.name == param.name) {
                return Err(HbError::Validation(format!("duplicate parameter {}", param.name)));
            }
            let bounds_ok = match &param.kind {
                ParameterKind::Float { low, high } => low <= high && (!param.log || *low > 0.0),
                ParameterKind::Int { low, high } => low <= high && (!param.log || *low > 0),
                ParameterKind::Categorical { choices } => !choices.is_empty() && !param.log,
            };
            if !bounds_ok {
                return Err(HbError::Validation(format!("invalid range for {}", param.name)));
            }
            if !param.admits(&param.default) {
                return Err(HbError::Validation(format!(
                    "default {} out of range for {}",
                    param.default, param.name
                )));
            }
        }

        for condition in &self.conditions {
            let position = |name: &str| self.parameters.iter().position(|p| p.name == name);
            match (position(&condition.parent), position(&condition.child)) {
                (Some(parent), Some(child)) if parent < child => {}
                _ => {
                    return Err(HbError::Validation(format!(
                        "condition {} <- {} must reference a parent declared before its child",
                        condition.child, condition.parent
                    )))
                }
            }
        }
        Ok(())
    }

    /// Whether `name` is active given the (partial) configuration.
    pub fn is_active(&self, name: &str, config: &Configuration) -> bool {
        self.conditions
            .iter()
            .filter(|c| c.child == name)
            .all(|c| config.get(&c.parent) == Some(&c.equals))
    }

    /// The default configuration, with inactive parameters left out.
    pub fn default_configuration(&self) -> Configuration {
        let mut config = Configuration::new();
        for param in &self.parameters {
            if self.is_active(&param.name, &config) {
                config.insert(param.name.clone(), param.default.clone());
            }
        }
        config
    }

    /// Draw one configuration uniformly (log-uniformly for log parameters).
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Configuration {
        let mut config = Configuration::new();
        for param in &self.parameters {
            if self.is_active(&param.name, &config) {
                let value = param.sample(rng);
                config.insert(param.name.clone(), value);
            }
        }
        config
    }

    /// Cartesian grid over the active sub-spaces, with `steps` points per
    /// continuous dimension.
    pub fn grid(&self, steps: usize) -> Vec<Configuration> {
        let mut result = vec![Configuration::new()];
        for param in &self.parameters {
            let axis = param.axis(steps);
            let mut next = Vec::with_capacity(result.len() * axis.len());
            for partial in result {
                if self.is_active(&param.name, &partial) {
                    for value in &axis {
                        let mut combo = partial.clone();
                        combo.insert(param.name.clone(), value.clone());
                        next.push(combo);
                    }
                } else {
                    next.push(partial);
                }
            }
            result = next;
        }
        result
    }

    /// Validate a configuration against the space.
    pub fn validate(&self, config: &Configuration) -> HbResult<()> {
        if let Some(unknown) = config.keys().find(|k| self.get(k).is_none()) {
            return Err(HbError::Validation(format!("unknown parameter {unknown}")));
        }

        for param in &self.parameters {
            let active = self.is_active(&param.name, config);
            match (active, config.get(&param.name)) {
                (true, None) => {
                    return Err(HbError::Validation(format!("missing active parameter {}", param.name)))
                }
                (false, Some(_)) => {
                    return Err(HbError::Validation(format!("inactive parameter {} is set", param.name)))
                }
                (true, Some(value)) if !param.admits(value) => {
                    return Err(HbError::Validation(format!(
                        "value {value} out of range for {}",
                        param.name
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }
}

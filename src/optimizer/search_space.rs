//! Grid definition for hyperparameter search

use crate::error::{GalaxyError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hyperparameters the grid search recognises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyperParameter {
    NEstimators,
    MaxFeatures,
    MinSamplesLeaf,
    Alpha,
    C,
    Epsilon,
}

impl HyperParameter {
    pub fn name(&self) -> &'static str {
        match self {
            HyperParameter::NEstimators => "n_estimators",
            HyperParameter::MaxFeatures => "max_features",
            HyperParameter::MinSamplesLeaf => "min_samples_leaf",
            HyperParameter::Alpha => "alpha",
            HyperParameter::C => "c",
            HyperParameter::Epsilon => "epsilon",
        }
    }
}

impl fmt::Display for HyperParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single candidate value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ParameterValue {
    Int(usize),
    Float(f64),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> f64 {
        match *self {
            ParameterValue::Int(v) => v as f64,
            ParameterValue::Float(v) => v,
        }
    }

    /// Get as a count, rounding floats
    pub fn as_usize(&self) -> usize {
        match *self {
            ParameterValue::Int(v) => v,
            ParameterValue::Float(v) => v.round().max(0.0) as usize,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// One point of the grid, in declaration order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialParams(pub Vec<(HyperParameter, ParameterValue)>);

impl TrialParams {
    pub fn get(&self, param: HyperParameter) -> Option<ParameterValue> {
        self.0.iter().find(|(p, _)| *p == param).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(HyperParameter, ParameterValue)> {
        self.0.iter()
    }
}

impl fmt::Display for TrialParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (param, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", param, value)?;
        }
        f.write_str("}")
    }
}

/// Candidate lists per hyperparameter; `None` leaves a parameter unsearched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearchParameters {
    pub n_estimators: Option<Vec<usize>>,
    /// Fractions of the feature count, in (0, 1]
    pub max_features: Option<Vec<f64>>,
    pub min_samples_leaf: Option<Vec<usize>>,
    pub alpha: Option<Vec<f64>>,
    pub c: Option<Vec<f64>>,
    pub epsilon: Option<Vec<f64>>,
}

impl GridSearchParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_estimators(mut self, values: Vec<usize>) -> Self {
        self.n_estimators = Some(values);
        self
    }

    pub fn with_max_features(mut self, values: Vec<f64>) -> Self {
        self.max_features = Some(values);
        self
    }

    pub fn with_min_samples_leaf(mut self, values: Vec<usize>) -> Self {
        self.min_samples_leaf = Some(values);
        self
    }

    pub fn with_alpha(mut self, values: Vec<f64>) -> Self {
        self.alpha = Some(values);
        self
    }

    pub fn with_c(mut self, values: Vec<f64>) -> Self {
        self.c = Some(values);
        self
    }

    pub fn with_epsilon(mut self, values: Vec<f64>) -> Self {
        self.epsilon = Some(values);
        self
    }

    /// The searched parameters with their candidates, in declaration order
    pub fn axes(&self) -> Vec<(HyperParameter, Vec<ParameterValue>)> {
        let ints = |v: &Vec<usize>| v.iter().map(|&x| ParameterValue::Int(x)).collect();
        let floats = |v: &Vec<f64>| v.iter().map(|&x| ParameterValue::Float(x)).collect();

        let mut axes = Vec::new();
        if let Some(v) = &self.n_estimators {
            axes.push((HyperParameter::NEstimators, ints(v)));
        }
        if let Some(v) = &self.max_features {
            axes.push((HyperParameter::MaxFeatures, floats(v)));
        }
        if let Some(v) = &self.min_samples_leaf {
            axes.push((HyperParameter::MinSamplesLeaf, ints(v)));
        }
        if let Some(v) = &self.alpha {
            axes.push((HyperParameter::Alpha, floats(v)));
        }
        if let Some(v) = &self.c {
            axes.push((HyperParameter::C, floats(v)));
        }
        if let Some(v) = &self.epsilon {
            axes.push((HyperParameter::Epsilon, floats(v)));
        }
        axes
    }

    /// Check the grid against the estimator that will consume it
    pub fn validate<F>(&self, estimator: &str, accepts: F) -> Result<()>
    where
        F: Fn(HyperParameter) -> bool,
    {
        let axes = self.axes();
        if axes.is_empty() {
            return Err(GalaxyError::InvalidParameter {
                name: "grid_search_parameters".to_string(),
                value: "{}".to_string(),
                reason: "no parameters to search".to_string(),
            });
        }

        for (param, values) in &axes {
            let invalid = |value: String, reason: String| GalaxyError::InvalidParameter {
                name: param.name().to_string(),
                value,
                reason,
            };
            if !accepts(*param) {
                return Err(invalid(
                    format!("{:?}", values.iter().map(|v| v.to_string()).collect::<Vec<_>>()),
                    format!("not a parameter of {}", estimator),
                ));
            }
            if values.is_empty() {
                return Err(invalid("[]".to_string(), "candidate list is empty".to_string()));
            }
            for value in values {
                let ok = match (param, value) {
                    (HyperParameter::MaxFeatures, v) => v.as_float() > 0.0 && v.as_float() <= 1.0,
                    (_, v) => v.as_float() > 0.0 && v.as_float().is_finite(),
                };
                if !ok {
                    let reason = if *param == HyperParameter::MaxFeatures {
                        "must be a fraction in (0, 1]"
                    } else {
                        "must be positive"
                    };
                    return Err(invalid(value.to_string(), reason.to_string()));
                }
            }
        }
        Ok(())
    }

    /// Cartesian product of all candidate lists
    pub fn combinations(&self) -> Vec<TrialParams> {
        let mut combos = vec![TrialParams::default()];
        for (param, values) in self.axes() {
            combos = combos
                .into_iter()
                .flat_map(|combo| {
                    values.iter().map(move |v| {
                        let mut next = combo.clone();
                        next.0.push((param, *v));
                        next
                    })
                })
                .collect();
        }
        combos
    }
}

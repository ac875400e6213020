//! Search space definition and the hyperparameters drawn from it.

use std::collections::BTreeMap;
use std::fmt;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::algorithms::sac::SacConfig;
use crate::error::{Error, Result};

/// Value of one sampled hyperparameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamValue {
    Float(f64),
    Int(i64),
    Bool(bool),
}

impl ParamValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            ParamValue::Float(v) => v,
            ParamValue::Int(v) => v as f64,
            ParamValue::Bool(v) => f64::from(u8::from(v)),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match *self {
            ParamValue::Float(v) => serde_json::json!(v),
            ParamValue::Int(v) => serde_json::json!(v),
            ParamValue::Bool(v) => serde_json::json!(v),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{v:.6}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// Sampled configuration of one trial, keyed by parameter name.
pub type Params = BTreeMap<String, ParamValue>;

/// Range of a single hyperparameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSpec {
    /// Continuous range, sampled uniformly or log-uniformly.
    Float { low: f64, high: f64, log: bool },
    /// Finite set of integers.
    IntChoice(Vec<i64>),
    /// Either boolean.
    BoolChoice,
}

impl ParamSpec {
    pub fn uniform(low: f64, high: f64) -> Self {
        ParamSpec::Float { low, high, log: false }
    }

    pub fn log_uniform(low: f64, high: f64) -> Self {
        ParamSpec::Float { low, high, log: true }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        let ok = match self {
            ParamSpec::Float { low, high, log } => {
                low.is_finite() && high.is_finite() && low <= high && (!log || *low > 0.0)
            }
            ParamSpec::IntChoice(choices) => !choices.is_empty(),
            ParamSpec::BoolChoice => true,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::Config(format!("invalid search range for '{name}'")))
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> ParamValue {
        match self {
            ParamSpec::Float { low, high, log } => {
                if low >= high {
                    return ParamValue::Float(*low);
                }
                if *log {
                    ParamValue::Float(rng.gen_range(low.ln()..high.ln()).exp())
                } else {
                    ParamValue::Float(rng.gen_range(*low..*high))
                }
            }
            ParamSpec::IntChoice(choices) => {
                ParamValue::Int(choices.choose(rng).copied().unwrap_or_default())
            }
            ParamSpec::BoolChoice => ParamValue::Bool(rng.gen()),
        }
    }

    /// Move `value` a little within the range. Continuous values get uniform
    /// noise of up to `scale` times the range width (in log space for log
    /// ranges). Choices are kept with probability `keep`, otherwise redrawn.
    pub fn perturb<R: Rng + ?Sized>(
        &self,
        value: ParamValue,
        scale: f64,
        keep: f64,
        rng: &mut R,
    ) -> ParamValue {
        match (self, value) {
            (ParamSpec::Float { low, high, log }, ParamValue::Float(v)) => {
                let (lo, hi, x) = if *log {
                    (low.ln(), high.ln(), v.max(*low).ln())
                } else {
                    (*low, *high, v)
                };
                let width = (hi - lo) * scale;
                let moved = if width > 0.0 {
                    (x + rng.gen_range(-width..width)).clamp(lo, hi)
                } else {
                    x.clamp(lo, hi)
                };
                ParamValue::Float(if *log { moved.exp() } else { moved })
            }
            (ParamSpec::IntChoice(choices), ParamValue::Int(v)) if choices.contains(&v) => {
                if rng.gen_bool(keep) {
                    value
                } else {
                    self.sample(rng)
                }
            }
            (ParamSpec::BoolChoice, ParamValue::Bool(_)) => {
                if rng.gen_bool(keep) {
                    value
                } else {
                    self.sample(rng)
                }
            }
            _ => self.sample(rng),
        }
    }

    /// Whether a plot axis for this parameter should be logarithmic.
    pub fn is_log(&self) -> bool {
        matches!(self, ParamSpec::Float { log: true, .. })
    }

    /// Numeric bounds for plotting.
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            ParamSpec::Float { low, high, .. } => (*low, *high),
            ParamSpec::IntChoice(choices) => {
                let lo = choices.iter().copied().min().unwrap_or(0) as f64;
                let hi = choices.iter().copied().max().unwrap_or(0) as f64;
                (lo, hi)
            }
            ParamSpec::BoolChoice => (0.0, 1.0),
        }
    }
}

// ============================================================================
// Search Space
// ============================================================================

pub const LEARNING_RATE: &str = "learning_rate";
pub const GAMMA: &str = "gamma";
pub const TAU: &str = "tau";
pub const BATCH_SIZE: &str = "batch_size";
pub const GRADIENT_STEPS: &str = "gradient_steps";
pub const USE_SDE: &str = "use_sde";
pub const NET_ARCH_NODES: &str = "net_arch_nodes";

/// Named hyperparameter ranges, iterated in name order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSpace {
    pub params: BTreeMap<String, ParamSpec>,
}

impl Default for SearchSpace {
    fn default() -> Self {
        Self::new()
            .with(LEARNING_RATE, ParamSpec::log_uniform(1e-4, 1e-2))
            .with(GAMMA, ParamSpec::uniform(0.9, 0.99))
            .with(TAU, ParamSpec::uniform(0.001, 0.1))
            .with(BATCH_SIZE, ParamSpec::IntChoice(vec![32, 64, 128, 256]))
            .with(GRADIENT_STEPS, ParamSpec::IntChoice(vec![1, 3, 5]))
            .with(USE_SDE, ParamSpec::BoolChoice)
            .with(NET_ARCH_NODES, ParamSpec::IntChoice(vec![32, 64, 128, 256]))
    }
}

impl SearchSpace {
    /// Empty space.
    pub fn new() -> Self {
        Self {
            params: BTreeMap::new(),
        }
    }

    pub fn with(mut self, name: &str, spec: ParamSpec) -> Self {
        self.params.insert(name.to_string(), spec);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.params.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.params.is_empty() {
            return Err(Error::Config("search space is empty".into()));
        }
        for (name, spec) in &self.params {
            spec.validate(name)?;
        }
        Ok(())
    }

    /// Independent uniform draw of every parameter.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Params {
        self.params
            .iter()
            .map(|(name, spec)| (name.clone(), spec.sample(rng)))
            .collect()
    }
}

// ============================================================================
// Sampled Hyperparameters
// ============================================================================

/// Typed view of a trial's parameters for the SAC search space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledHyperparams {
    pub learning_rate: f64,
    pub gamma: f32,
    pub tau: f32,
    pub batch_size: usize,
    pub gradient_steps: usize,
    pub use_sde: bool,
    pub net_arch_nodes: usize,
}

fn float_param(params: &Params, name: &str) -> Result<f64> {
    match params.get(name) {
        Some(ParamValue::Float(v)) => Ok(*v),
        Some(ParamValue::Int(v)) => Ok(*v as f64),
        _ => Err(Error::Config(format!("trial is missing float parameter '{name}'"))),
    }
}

fn int_param(params: &Params, name: &str) -> Result<usize> {
    match params.get(name) {
        Some(ParamValue::Int(v)) if *v > 0 => Ok(*v as usize),
        _ => Err(Error::Config(format!("trial is missing positive integer parameter '{name}'"))),
    }
}

impl SampledHyperparams {
    pub fn from_params(params: &Params) -> Result<Self> {
        let use_sde = match params.get(USE_SDE) {
            Some(ParamValue::Bool(v)) => *v,
            _ => return Err(Error::Config(format!("trial is missing boolean parameter '{USE_SDE}'"))),
        };
        Ok(Self {
            learning_rate: float_param(params, LEARNING_RATE)?,
            gamma: float_param(params, GAMMA)? as f32,
            tau: float_param(params, TAU)? as f32,
            batch_size: int_param(params, BATCH_SIZE)?,
            gradient_steps: int_param(params, GRADIENT_STEPS)?,
            use_sde,
            net_arch_nodes: int_param(params, NET_ARCH_NODES)?,
        })
    }

    /// Overlay the sampled values on `base`.
    pub fn apply(&self, base: SacConfig) -> SacConfig {
        base.with_learning_rate(self.learning_rate)
            .with_gamma(self.gamma)
            .with_tau(self.tau)
            .with_batch_size(self.batch_size)
            .with_gradient_steps(self.gradient_steps)
            .with_use_sde(self.use_sde)
    }
}

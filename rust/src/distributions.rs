//! Duration distributions for probabilistic scheduling.
//!
//! The variant set is closed: triangular (three-point estimate), uniform and
//! normal. Each variant validates its parameters on construction, so a
//! [`Distribution`] value is always safe to sample.

use rand::distr::Distribution as RandDistribution;
use rand::distr::Uniform as UniformSampler;
use rand::Rng;
use rand_distr::{Normal as NormalSampler, Triangular as TriangularSampler};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors raised while building a distribution.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DistributionError {
    #[error("Invalid {distribution} parameter {parameter}: {reason}")]
    InvalidParameter {
        distribution: &'static str,
        parameter: &'static str,
        reason: String,
    },
    #[error("Missing {distribution} parameter {parameter}")]
    MissingParameter {
        distribution: &'static str,
        parameter: &'static str,
    },
    #[error("Unknown distribution kind {0:?} (expected triangular, uniform, normal or fixed)")]
    UnknownKind(String),
}

fn invalid(distribution: &'static str, parameter: &'static str, reason: impl Into<String>) -> DistributionError {
    DistributionError::InvalidParameter {
        distribution,
        parameter,
        reason: reason.into(),
    }
}

fn require_finite(
    distribution: &'static str,
    parameter: &'static str,
    value: f64,
) -> Result<f64, DistributionError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(invalid(distribution, parameter, format!("{} is not finite", value)))
    }
}

/// Three-point estimate: `optimistic <= most_likely <= pessimistic`.
#[derive(Clone, Copy, Debug)]
pub struct Triangular {
    optimistic: f64,
    most_likely: f64,
    pessimistic: f64,
    /// `None` when all three estimates are equal.
    sampler: Option<TriangularSampler<f64>>,
}

impl Triangular {
    pub fn new(optimistic: f64, most_likely: f64, pessimistic: f64) -> Result<Self, DistributionError> {
        const NAME: &str = "triangular";
        require_finite(NAME, "optimistic", optimistic)?;
        require_finite(NAME, "most_likely", most_likely)?;
        require_finite(NAME, "pessimistic", pessimistic)?;
        if most_likely < optimistic {
            return Err(invalid(NAME, "most_likely", "must be >= optimistic"));
        }
        if pessimistic < most_likely {
            return Err(invalid(NAME, "pessimistic", "must be >= most_likely"));
        }

        let sampler = if optimistic == pessimistic {
            None
        } else {
            Some(
                TriangularSampler::new(optimistic, pessimistic, most_likely)
                    .map_err(|e| invalid(NAME, "most_likely", e.to_string()))?,
            )
        };

        Ok(Self {
            optimistic,
            most_likely,
            pessimistic,
            sampler,
        })
    }

    pub fn optimistic(&self) -> f64 {
        self.optimistic
    }

    pub fn most_likely(&self) -> f64 {
        self.most_likely
    }

    pub fn pessimistic(&self) -> f64 {
        self.pessimistic
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.sampler {
            Some(sampler) => sampler.sample(rng),
            None => self.most_likely,
        }
    }

    /// PERT expectation `(o + 4m + p) / 6`.
    pub fn mean(&self) -> f64 {
        (self.optimistic + 4.0 * self.most_likely + self.pessimistic) / 6.0
    }

    /// PERT variance `((p - o) / 6)^2`.
    pub fn variance(&self) -> f64 {
        ((self.pessimistic - self.optimistic) / 6.0).powi(2)
    }
}

/// Uniform over `[min, max)` with `max > min`.
#[derive(Clone, Copy, Debug)]
pub struct Uniform {
    min: f64,
    max: f64,
    sampler: UniformSampler<f64>,
}

impl Uniform {
    pub fn new(min: f64, max: f64) -> Result<Self, DistributionError> {
        const NAME: &str = "uniform";
        require_finite(NAME, "min", min)?;
        require_finite(NAME, "max", max)?;
        if max <= min {
            return Err(invalid(NAME, "max", "must be greater than min"));
        }
        let sampler = UniformSampler::new(min, max).map_err(|e| invalid(NAME, "max", e.to_string()))?;
        Ok(Self { min, max, sampler })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sampler.sample(rng)
    }

    pub fn mean(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn variance(&self) -> f64 {
        (self.max - self.min).powi(2) / 12.0
    }
}

/// Normal with `std_dev > 0`; draws below zero are clipped to zero.
#[derive(Clone, Copy, Debug)]
pub struct Normal {
    mean: f64,
    std_dev: f64,
    sampler: NormalSampler<f64>,
}

impl Normal {
    pub fn new(mean: f64, std_dev: f64) -> Result<Self, DistributionError> {
        const NAME: &str = "normal";
        require_finite(NAME, "mean", mean)?;
        require_finite(NAME, "std_dev", std_dev)?;
        if std_dev <= 0.0 {
            return Err(invalid(NAME, "std_dev", "must be positive"));
        }
        let sampler = NormalSampler::new(mean, std_dev).map_err(|e| invalid(NAME, "std_dev", e.to_string()))?;
        Ok(Self {
            mean,
            std_dev,
            sampler,
        })
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        self.sampler.sample(rng).max(0.0)
    }

    /// Mean of the untruncated distribution.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        self.std_dev * self.std_dev
    }
}

/// A validated duration distribution.
#[derive(Clone, Copy, Debug)]
pub enum Distribution {
    Triangular(Triangular),
    Uniform(Uniform),
    Normal(Normal),
}

impl Distribution {
    pub fn triangular(optimistic: f64, most_likely: f64, pessimistic: f64) -> Result<Self, DistributionError> {
        Triangular::new(optimistic, most_likely, pessimistic).map(Distribution::Triangular)
    }

    pub fn uniform(min: f64, max: f64) -> Result<Self, DistributionError> {
        Uniform::new(min, max).map(Distribution::Uniform)
    }

    pub fn normal(mean: f64, std_dev: f64) -> Result<Self, DistributionError> {
        Normal::new(mean, std_dev).map(Distribution::Normal)
    }

    /// A zero-variance distribution that always yields `value`.
    pub fn fixed(value: f64) -> Result<Self, DistributionError> {
        Self::triangular(value, value, value)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Distribution::Triangular(_) => "triangular",
            Distribution::Uniform(_) => "uniform",
            Distribution::Normal(_) => "normal",
        }
    }

    /// Draw one duration.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Distribution::Triangular(d) => d.sample(rng),
            Distribution::Uniform(d) => d.sample(rng),
            Distribution::Normal(d) => d.sample(rng),
        }
    }

    /// Closed-form expectation (PERT for triangular).
    pub fn mean(&self) -> f64 {
        match self {
            Distribution::Triangular(d) => d.mean(),
            Distribution::Uniform(d) => d.mean(),
            Distribution::Normal(d) => d.mean(),
        }
    }

    pub fn variance(&self) -> f64 {
        match self {
            Distribution::Triangular(d) => d.variance(),
            Distribution::Uniform(d) => d.variance(),
            Distribution::Normal(d) => d.variance(),
        }
    }
}

/// Serializable description of a distribution: a kind plus named parameters.
///
/// | kind | parameters |
/// |---|---|
/// | `triangular` | `optimistic`, `most_likely`, `pessimistic` |
/// | `uniform` | `min`, `max` |
/// | `normal` | `mean`, `std_dev` |
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DistributionSpec {
    pub kind: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

impl DistributionSpec {
    pub fn new(kind: impl Into<String>, params: BTreeMap<String, f64>) -> Self {
        Self {
            kind: kind.into(),
            params,
        }
    }

    fn with_params(kind: &str, params: &[(&str, f64)]) -> Self {
        Self::new(
            kind,
            params.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        )
    }

    pub fn triangular(optimistic: f64, most_likely: f64, pessimistic: f64) -> Self {
        Self::with_params(
            "triangular",
            &[
                ("optimistic", optimistic),
                ("most_likely", most_likely),
                ("pessimistic", pessimistic),
            ],
        )
    }

    pub fn uniform(min: f64, max: f64) -> Self {
        Self::with_params("uniform", &[("min", min), ("max", max)])
    }

    pub fn normal(mean: f64, std_dev: f64) -> Self {
        Self::with_params("normal", &[("mean", mean), ("std_dev", std_dev)])
    }

    /// Kind `"fixed"` with a single `value` parameter.
    pub fn fixed(value: f64) -> Self {
        Self::with_params("fixed", &[("value", value)])
    }

    fn param(&self, distribution: &'static str, parameter: &'static str) -> Result<f64, DistributionError> {
        self.params
            .get(parameter)
            .copied()
            .ok_or(DistributionError::MissingParameter {
                distribution,
                parameter,
            })
    }

    /// Validate the parameters and build the distribution.
    pub fn build(&self) -> Result<Distribution, DistributionError> {
        match self.kind.trim().to_ascii_lowercase().as_str() {
            "triangular" => Distribution::triangular(
                self.param("triangular", "optimistic")?,
                self.param("triangular", "most_likely")?,
                self.param("triangular", "pessimistic")?,
            ),
            "uniform" => Distribution::uniform(
                self.param("uniform", "min")?,
                self.param("uniform", "max")?,
            ),
            "normal" => Distribution::normal(
                self.param("normal", "mean")?,
                self.param("normal", "std_dev")?,
            ),
            "fixed" => Distribution::fixed(self.param("fixed", "value")?),
            _ => Err(DistributionError::UnknownKind(self.kind.clone())),
        }
    }
}

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::{Result, SamplingError};
use crate::sampling::probability::ProbabilityPolicy;

/// Per-layer sampling target.
///
/// Serialized as a plain integer: a positive count, or `-1` for "every edge".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Fanout {
    All,
    Limit(usize),
}

impl Fanout {
    pub fn new(value: i64) -> Result<Self> {
        Self::try_from(value)
    }

    /// Number of items to take out of `available` candidates.
    pub fn target(self, available: usize) -> usize {
        match self {
            Fanout::All => available,
            Fanout::Limit(k) => k,
        }
    }

    fn validate(self) -> Result<()> {
        match self {
            Fanout::Limit(0) => Err(SamplingError::InvalidFanout(0)),
            _ => Ok(()),
        }
    }
}

impl TryFrom<i64> for Fanout {
    type Error = SamplingError;

    fn try_from(value: i64) -> Result<Self> {
        match value {
            -1 => Ok(Fanout::All),
            v if v > 0 => Ok(Fanout::Limit(v as usize)),
            v => Err(SamplingError::InvalidFanout(v)),
        }
    }
}

impl From<Fanout> for i64 {
    fn from(fanout: Fanout) -> i64 {
        match fanout {
            Fanout::All => -1,
            Fanout::Limit(k) => k as i64,
        }
    }
}

impl fmt::Display for Fanout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fanout::All => write!(f, "all"),
            Fanout::Limit(k) => write!(f, "{}", k),
        }
    }
}

/// How each layer picks its neighbors. One variant per scheme, each with its
/// own knobs; dispatched once per layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplingScheme {
    /// Draw `fanout` candidate nodes proportional to their probability.
    Multinomial {
        #[serde(default)]
        policy: ProbabilityPolicy,
        #[serde(default)]
        replace: bool,
    },
    /// Include every candidate independently with its capped probability.
    Poisson {
        #[serde(default)]
        policy: ProbabilityPolicy,
    },
    /// Correlated per-edge draws shared across seeds, layers and batches.
    Labor {
        #[serde(default)]
        importance_iterations: usize,
        #[serde(default)]
        layer_dependency: bool,
        /// Bias edge inclusion by edge weight.
        #[serde(default)]
        weighted: bool,
    },
}

impl SamplingScheme {
    pub fn uniform() -> Self {
        SamplingScheme::Multinomial {
            policy: ProbabilityPolicy::Uniform,
            replace: false,
        }
    }

    pub fn importance_multinomial(replace: bool) -> Self {
        SamplingScheme::Multinomial {
            policy: ProbabilityPolicy::Importance,
            replace,
        }
    }

    pub fn importance_poisson() -> Self {
        SamplingScheme::Poisson {
            policy: ProbabilityPolicy::Importance,
        }
    }

    pub fn labor() -> Self {
        SamplingScheme::Labor {
            importance_iterations: 0,
            layer_dependency: false,
            weighted: false,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SamplingScheme::Multinomial { .. } => "multinomial",
            SamplingScheme::Poisson { .. } => "poisson",
            SamplingScheme::Labor { .. } => "labor",
        }
    }
}

impl Default for SamplingScheme {
    fn default() -> Self {
        Self::importance_multinomial(false)
    }
}

fn default_batch_dependency() -> u64 {
    1
}

/// Sampler configuration. `fanouts[i]` is the target for GNN layer `i`
/// (layer 0 is closest to the input features).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub fanouts: Vec<Fanout>,
    #[serde(default)]
    pub scheme: SamplingScheme,
    /// Number of consecutive batches that share a correlation seed.
    #[serde(default = "default_batch_dependency")]
    pub batch_dependency: u64,
    /// Master seed for the correlation state; entropy when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SamplerConfig {
    pub fn new(fanouts: Vec<Fanout>) -> Self {
        Self {
            fanouts,
            scheme: SamplingScheme::default(),
            batch_dependency: default_batch_dependency(),
            seed: None,
        }
    }

    /// Build from raw integers, rejecting anything that is neither positive nor -1.
    pub fn from_fanouts(fanouts: &[i64]) -> Result<Self> {
        let fanouts = fanouts.iter().map(|&f| Fanout::new(f)).collect::<Result<Vec<_>>>()?;
        Ok(Self::new(fanouts))
    }

    pub fn with_scheme(mut self, scheme: SamplingScheme) -> Self {
        self.scheme = scheme;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_batch_dependency(mut self, batch_dependency: u64) -> Self {
        self.batch_dependency = batch_dependency;
        self
    }

    pub fn num_layers(&self) -> usize {
        self.fanouts.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.fanouts.is_empty() {
            return Err(SamplingError::invalid_parameter(
                "at least one layer fanout is required",
            ));
        }
        for fanout in &self.fanouts {
            fanout.validate()?;
        }
        if self.batch_dependency == 0 {
            return Err(SamplingError::invalid_parameter(
                "batch_dependency must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: SamplerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

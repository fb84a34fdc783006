//! Run-time options for model fitting.
//!
//! Everything the training loop needs to know — clip constants included —
//! travels through [`FitOptions`] rather than process-wide state, so two
//! fits with different settings can coexist in one process.

use anyhow::{bail, ensure};

/// How observed node attributes are modelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttributeKind {
    /// 0/1 attributes under a Bernoulli likelihood with a logistic link.
    #[default]
    Binary,
    /// Real-valued attributes under a squared-error likelihood.
    Real,
}

impl std::str::FromStr for AttributeKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "binary" => Ok(AttributeKind::Binary),
            "real" | "continuous" => Ok(AttributeKind::Real),
            _ => bail!("unknown attribute type: {} (expected binary|real)", s),
        }
    }
}

/// Options for coordinate-descent fitting.
#[derive(Debug, Clone)]
pub struct FitOptions {
    /// Number of latent communities. Default: 2
    pub num_communities: usize,
    /// Number of training epochs. Default: 100
    pub num_epochs: usize,
    /// Learning rate eta. Default: 0.01
    pub learning_rate: f64,
    /// Mixing weight alpha in [0,1] between the network likelihood
    /// (alpha = 0) and the attribute likelihood (alpha = 1). Default: 0.5
    pub alpha: f64,
    /// L1 penalty on the membership matrix columns. Default: 0.01
    pub lambda_memb: f64,
    /// L1 penalty on the decoder weight columns. Default: 0.01
    pub lambda_weight: f64,
    /// Attribute likelihood family. Default: binary
    pub attribute_kind: AttributeKind,
    /// Worker threads for per-unit gradient fan-out; 0 or 1 runs
    /// sequentially. Default: 0
    pub num_threads: usize,
    /// Random seed for parameter initialization. Default: 42
    pub seed: u64,
    /// Probabilities are clipped into [clip, 1 - clip] before any log.
    /// Default: 1e-8
    pub prob_clip: f64,
    /// Positive floor for the folded angular separation. Default: 1e-12
    pub delta_floor: f64,
    /// A block gradient whose L2 norm exceeds this is rescaled to unit
    /// norm before the update step. Default: 1.0
    pub max_grad_norm: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        FitOptions {
            num_communities: 2,
            num_epochs: 100,
            learning_rate: 1e-2,
            alpha: 0.5,
            lambda_memb: 1e-2,
            lambda_weight: 1e-2,
            attribute_kind: AttributeKind::Binary,
            num_threads: 0,
            seed: 42,
            prob_clip: 1e-8,
            delta_floor: 1e-12,
            max_grad_norm: 1.0,
        }
    }
}

impl FitOptions {
    /// Fail fast on settings no training run can recover from.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.num_communities > 0, "need at least one community");
        ensure!(
            (0.0..=1.0).contains(&self.alpha),
            "alpha must lie in [0,1], got {}",
            self.alpha
        );
        ensure!(
            self.learning_rate >= 0.0 && self.learning_rate.is_finite(),
            "learning rate must be finite and non-negative, got {}",
            self.learning_rate
        );
        ensure!(
            self.lambda_memb >= 0.0 && self.lambda_weight >= 0.0,
            "L1 penalties must be non-negative"
        );
        ensure!(
            self.prob_clip > 0.0 && self.prob_clip < 0.5,
            "probability clip must lie in (0, 0.5), got {}",
            self.prob_clip
        );
        ensure!(
            self.delta_floor > 0.0,
            "angular separation floor must be positive"
        );
        ensure!(
            self.max_grad_norm > 0.0,
            "gradient norm threshold must be positive"
        );
        Ok(())
    }
}

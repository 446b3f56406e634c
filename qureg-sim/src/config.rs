//! Register configuration

/// Configuration for a coherent register
///
/// Controls the random source and the numeric policy of a single register;
/// backend selection lives in [`crate::backend::ServiceConfig`], which
/// configures the process-wide kernel service instead.
#[derive(Debug, Clone)]
pub struct RegisterConfig {
    /// Random number generator seed for reproducibility
    ///
    /// If None, the register seeds itself from OS entropy. Set to
    /// Some(seed) for deterministic phases and measurement outcomes.
    ///
    /// Default: None (random)
    pub seed: Option<u64>,

    /// Tolerance on the running norm before a renormalization pass
    ///
    /// Probability-exact reads renormalize the state when the cached L2
    /// norm has drifted from 1 by more than this amount.
    ///
    /// Default: 1e-12
    pub norm_epsilon: f64,
}

impl Default for RegisterConfig {
    fn default() -> Self {
        Self {
            seed: None,
            norm_epsilon: 1e-12,
        }
    }
}

impl RegisterConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the random seed for deterministic execution
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the renormalization tolerance
    pub fn with_norm_epsilon(mut self, epsilon: f64) -> Self {
        self.norm_epsilon = epsilon;
        self
    }
}

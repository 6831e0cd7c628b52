use arboria_core::ArboriaError;

/// Resolved number of candidate features to consider at each split.
///
/// Mirrors the Python API's overloaded `max_features` argument: callers pass
/// `"sqrt"`, `"log"`, or a fixed integer; the original implementation encoded
/// the string choices as the sentinels `-99`/`-98` before resolving them
/// against the actual feature count at fit time. `from_raw` keeps that
/// sentinel contract so callers translating the Python-era API keep working,
/// while `MaxFeatures::Sqrt` / `MaxFeatures::Log2` give Rust callers a named
/// alternative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaxFeatures {
    Sqrt,
    Log2,
    Fixed(u32),
}

impl MaxFeatures {
    /// Resolve the Python-compatible sentinel encoding: `-99` -> sqrt,
    /// `-98` -> log2, any other negative value is rejected, positive values
    /// pass through as a fixed count.
    pub fn from_raw(raw: i64) -> Result<Self, ArboriaError> {
        match raw {
            -99 => Ok(MaxFeatures::Sqrt),
            -98 => Ok(MaxFeatures::Log2),
            n if n > 0 => Ok(MaxFeatures::Fixed(n as u32)),
            n => Err(ArboriaError::InvalidArgument(format!(
                "max_features must be a positive integer, -99 (sqrt), or -98 (log2); got {n}"
            ))),
        }
    }

    /// Resolve against the actual feature count, clamped to at least 1 and
    /// at most `n_features`.
    pub fn resolve(self, n_features: u32) -> u32 {
        let raw = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as u32,
            MaxFeatures::Log2 => (n_features as f64).log2() as u32,
            MaxFeatures::Fixed(n) => n,
        };
        raw.clamp(1, n_features.max(1))
    }
}

/// Validate the shared subset of random-forest hyperparameters.
pub fn validate_forest_params(
    n_estimators: u32,
    max_depth: Option<u32>,
    max_samples: f32,
    min_sample_split: Option<u32>,
) -> Result<(), ArboriaError> {
    if n_estimators == 0 {
        return Err(ArboriaError::InvalidArgument(
            "n_estimators must be positive".to_string(),
        ));
    }
    if let Some(d) = max_depth {
        if d == 0 {
            return Err(ArboriaError::InvalidArgument(
                "max_depth must be positive".to_string(),
            ));
        }
    }
    if !(max_samples.is_finite() && max_samples > 0.0) {
        return Err(ArboriaError::InvalidArgument(
            "max_samples must be a positive, finite fraction".to_string(),
        ));
    }
    if let Some(m) = min_sample_split {
        if m < 2 {
            return Err(ArboriaError::InvalidArgument(
                "min_sample_split must be at least 2".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_resolution() {
        assert_eq!(MaxFeatures::from_raw(-99).unwrap(), MaxFeatures::Sqrt);
        assert_eq!(MaxFeatures::from_raw(-98).unwrap(), MaxFeatures::Log2);
        assert_eq!(MaxFeatures::from_raw(3).unwrap(), MaxFeatures::Fixed(3));
    }

    #[test]
    fn test_reserved_sentinel_rejected() {
        assert!(MaxFeatures::from_raw(-97).is_err());
        assert!(MaxFeatures::from_raw(0).is_err());
    }

    #[test]
    fn test_resolve_sqrt_and_log2() {
        assert_eq!(MaxFeatures::Sqrt.resolve(9), 3);
        assert_eq!(MaxFeatures::Log2.resolve(8), 3);
        assert_eq!(MaxFeatures::Fixed(5).resolve(4), 4);
    }

    #[test]
    fn test_validate_forest_params_rejects_zero_estimators() {
        assert!(validate_forest_params(0, Some(5), 1.0, None).is_err());
        assert!(validate_forest_params(10, Some(0), 1.0, None).is_err());
        assert!(validate_forest_params(10, None, 0.0, None).is_err());
        assert!(validate_forest_params(10, None, 1.0, Some(1)).is_err());
        assert!(validate_forest_params(10, Some(5), 1.0, Some(2)).is_ok());
    }
}

use arboria_core::ArboriaError;

/// Fraction of positions where `y_true` and `y_pred` agree.
///
/// Mirrors the original Python `accuracy()` free function, including its
/// length-mismatch rejection (there a `ValueError`, here `InvalidArgument`).
pub fn accuracy(y_true: &[i32], y_pred: &[i32]) -> Result<f64, ArboriaError> {
    if y_true.len() != y_pred.len() {
        return Err(ArboriaError::InvalidArgument(format!(
            "y_true has {} elements but y_pred has {}",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(ArboriaError::InvalidArgument("cannot score an empty sequence".to_string()));
    }
    let correct = y_true.iter().zip(y_pred.iter()).filter(|(a, b)| a == b).count();
    Ok(correct as f64 / y_true.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy() {
        let y_true = [0, 1, 2, 1, 0];
        let y_pred = [0, 1, 2, 0, 0];
        assert!((accuracy(&y_true, &y_pred).unwrap() - 0.8).abs() < 1e-10);
    }

    #[test]
    fn test_accuracy_perfect_match() {
        let y = [0, 1, 1, 0];
        assert_eq!(accuracy(&y, &y).unwrap(), 1.0);
    }

    #[test]
    fn test_accuracy_rejects_length_mismatch() {
        let y_true = [0, 1, 2];
        let y_pred = [0, 1];
        assert!(accuracy(&y_true, &y_pred).is_err());
    }
}

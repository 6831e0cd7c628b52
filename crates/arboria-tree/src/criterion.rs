use arboria_core::ArboriaError;

/// Split-quality criterion. `Gini` and `Entropy` apply to classification
/// trees; `Sse` applies to regression trees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    Gini,
    Entropy,
    Sse,
}

impl Criterion {
    pub fn parse(s: &str) -> Result<Self, ArboriaError> {
        match s {
            "gini" => Ok(Criterion::Gini),
            "entropy" => Ok(Criterion::Entropy),
            "sse" => Ok(Criterion::Sse),
            other => Err(ArboriaError::InvalidArgument(format!(
                "unknown criterion {other:?}, expected one of \"gini\", \"entropy\", \"sse\""
            ))),
        }
    }

    pub fn is_classification(self) -> bool {
        matches!(self, Criterion::Gini | Criterion::Entropy)
    }
}

/// Gini impurity of a class-count histogram: `1 - sum((c_k / n)^2)`.
pub fn gini(counts: &[u32], n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    let sum_sq: f64 = counts.iter().map(|&c| (c as f64 / n).powi(2)).sum();
    1.0 - sum_sq
}

/// Shannon entropy of a class-count histogram, with `0 * log2(0) = 0`.
pub fn entropy(counts: &[u32], n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let n = n as f64;
    -counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / n;
            p * p.log2()
        })
        .sum::<f64>()
}

/// Dispatch to the matching classification impurity kernel.
pub fn impurity(criterion: Criterion, counts: &[u32], n: u32) -> f64 {
    match criterion {
        Criterion::Gini => gini(counts, n),
        Criterion::Entropy => entropy(counts, n),
        Criterion::Sse => panic!("sse is not a classification criterion"),
    }
}

/// Sum of squared deviations from the mean, from running sum/sum-of-squares:
/// `SSE = Q - S^2 / n`.
pub fn sse(sum: f64, sum_sq: f64, n: u32) -> f64 {
    if n == 0 {
        return 0.0;
    }
    sum_sq - sum * sum / n as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gini_pure_node() {
        assert_eq!(gini(&[5, 0], 5), 0.0);
    }

    #[test]
    fn test_gini_balanced() {
        let g = gini(&[5, 5], 10);
        assert!((g - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_entropy_pure_node() {
        assert_eq!(entropy(&[5, 0], 5), 0.0);
    }

    #[test]
    fn test_entropy_balanced() {
        let e = entropy(&[5, 5], 10);
        assert!((e - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_sse_zero_variance() {
        // y = [3, 3, 3]
        assert!(sse(9.0, 27.0, 3).abs() < 1e-9);
    }

    #[test]
    fn test_parse_criterion() {
        assert_eq!(Criterion::parse("gini").unwrap(), Criterion::Gini);
        assert!(Criterion::parse("bogus").is_err());
    }
}

use serde::{Deserialize, Serialize};

/// Threshold policy for aggregated validation errors.
///
/// Individual malformed rows are skipped and reported; the run as a whole
/// fails before any write once either limit is crossed. This guards against
/// a systemically broken input file silently loading a mostly-empty table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ErrorPolicy {
    #[serde(default)]
    pub max_error_count: Option<usize>,
    #[serde(default)]
    pub max_error_ratio: Option<f64>,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            max_error_count: None,
            max_error_ratio: Some(0.1),
        }
    }
}

impl ErrorPolicy {
    /// Policy that fails a run on the first validation error.
    pub fn strict() -> Self {
        Self {
            max_error_count: Some(0),
            max_error_ratio: None,
        }
    }

    /// True once the aggregate error count crosses either limit.
    pub fn exceeded(&self, error_count: usize, rows_scanned: usize) -> bool {
        if let Some(max) = self.max_error_count {
            if error_count > max {
                return true;
            }
        }
        if let Some(ratio) = self.max_error_ratio {
            if rows_scanned > 0 && (error_count as f64) / (rows_scanned as f64) > ratio {
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_count_limit() {
        let policy = ErrorPolicy {
            max_error_count: Some(2),
            max_error_ratio: None,
        };
        assert!(!policy.exceeded(2, 100));
        assert!(policy.exceeded(3, 100));
    }

    #[test]
    fn ratio_limit() {
        let policy = ErrorPolicy {
            max_error_count: None,
            max_error_ratio: Some(0.5),
        };
        assert!(!policy.exceeded(5, 10));
        assert!(policy.exceeded(6, 10));
    }

    #[test]
    fn empty_batch_never_exceeds_ratio() {
        let policy = ErrorPolicy::default();
        assert!(!policy.exceeded(0, 0));
    }

    #[test]
    fn strict_policy_fails_on_first_error() {
        let policy = ErrorPolicy::strict();
        assert!(!policy.exceeded(0, 10));
        assert!(policy.exceeded(1, 10));
    }
}

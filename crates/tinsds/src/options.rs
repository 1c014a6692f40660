/// Growth threshold: below it a reallocation doubles the required size, above
/// it a fixed slack of this many bytes is added instead.
pub const MAX_PREALLOC: usize = 1024 * 1024;

/// How much spare room a growing buffer asks the allocator for.
///
/// # Default
///
/// [`GrowthMode::Greedy`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GrowthMode {
    /// Amortized growth: the required size is doubled while it is below
    /// [`MAX_PREALLOC`], otherwise [`MAX_PREALLOC`] bytes are added.
    ///
    /// Repeated small appends cost O(1) on average.
    #[default]
    Greedy,
    /// Allocate exactly the required size.
    ///
    /// Useful when the final size is known up front; repeated use degrades
    /// appends to O(n).
    Exact,
}

impl GrowthMode {
    /// Payload size to request for a buffer that must hold `required` bytes.
    #[must_use]
    pub const fn target(self, required: usize) -> usize {
        match self {
            Self::Greedy if required < MAX_PREALLOC => required.saturating_mul(2),
            Self::Greedy => required.saturating_add(MAX_PREALLOC),
            Self::Exact => required,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GrowthMode, MAX_PREALLOC};

    #[test]
    fn greedy_doubles_below_threshold() {
        assert_eq!(GrowthMode::Greedy.target(10), 20);
        assert_eq!(GrowthMode::Greedy.target(MAX_PREALLOC - 1), 2 * MAX_PREALLOC - 2);
    }

    #[test]
    fn greedy_adds_slack_above_threshold() {
        assert_eq!(GrowthMode::Greedy.target(MAX_PREALLOC), 2 * MAX_PREALLOC);
        assert_eq!(GrowthMode::Greedy.target(3 * MAX_PREALLOC), 4 * MAX_PREALLOC);
    }

    #[test]
    fn exact_is_identity() {
        assert_eq!(GrowthMode::Exact.target(12_345), 12_345);
    }
}

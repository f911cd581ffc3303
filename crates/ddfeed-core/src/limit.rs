//! Page size clamping for listings.

/// Page size used when the request does not name one.
pub const DEFAULT_LIMIT: u32 = 10;

/// Largest page a caller may request.
pub const MAX_LIMIT: u32 = 100;

/// An effective page size, always within `1..=MAX_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimit(u32);

impl PageLimit {
    /// Clamp a requested size to `[1, MAX_LIMIT]`, or use
    /// [`DEFAULT_LIMIT`] when nothing was requested.
    pub fn clamp(requested: Option<i64>) -> Self {
        let Some(requested) = requested else {
            return Self(DEFAULT_LIMIT);
        };
        let clamped = requested.clamp(1, i64::from(MAX_LIMIT));
        Self(u32::try_from(clamped).unwrap_or(DEFAULT_LIMIT))
    }

    /// Return the page size.
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl Default for PageLimit {
    fn default() -> Self {
        Self(DEFAULT_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_into_range() {
        assert_eq!(PageLimit::clamp(None).get(), 10);
        assert_eq!(PageLimit::clamp(Some(0)).get(), 1);
        assert_eq!(PageLimit::clamp(Some(-5)).get(), 1);
        assert_eq!(PageLimit::clamp(Some(25)).get(), 25);
        assert_eq!(PageLimit::clamp(Some(101)).get(), 100);
        assert_eq!(PageLimit::clamp(Some(i64::MAX)).get(), 100);
    }
}

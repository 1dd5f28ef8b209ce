//! Outlier filter - sanity threshold applied before windowing

use super::types::Reading;

/// Default sanity threshold in the units of the source value (µg/m³)
pub const DEFAULT_OUTLIER_THRESHOLD: f64 = 50.0;

/// Pure predicate rejecting readings above a fixed threshold
///
/// A value exactly at the threshold is accepted. Non-finite values are
/// rejected as well so a window mean can never become NaN or infinite.
#[derive(Debug, Clone, Copy)]
pub struct OutlierFilter {
    threshold: f64,
}

impl OutlierFilter {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn accept(&self, reading: &Reading) -> bool {
        if !reading.value.is_finite() {
            log::info!(
                "Non-finite value: {} (timestamp: {})",
                reading.value,
                reading.timestamp
            );
            return false;
        }

        if reading.value > self.threshold {
            log::info!(
                "Outlier value: {} (timestamp: {})",
                reading.value,
                reading.timestamp
            );
            return false;
        }

        true
    }
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::new(DEFAULT_OUTLIER_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_boundary() {
        let filter = OutlierFilter::default();

        assert!(filter.accept(&Reading::new(1000, 49.99)));
        assert!(filter.accept(&Reading::new(1000, 50.0)));
        assert!(!filter.accept(&Reading::new(1000, 50.01)));
        assert!(!filter.accept(&Reading::new(1000, 500.0)));
    }

    #[test]
    fn test_negative_and_zero_values_accepted() {
        let filter = OutlierFilter::default();

        assert!(filter.accept(&Reading::new(1000, 0.0)));
        assert!(filter.accept(&Reading::new(1000, -3.5)));
    }

    #[test]
    fn test_non_finite_rejected() {
        let filter = OutlierFilter::default();

        assert!(!filter.accept(&Reading::new(1000, f64::NAN)));
        assert!(!filter.accept(&Reading::new(1000, f64::INFINITY)));
        assert!(!filter.accept(&Reading::new(1000, f64::NEG_INFINITY)));
    }

    #[test]
    fn test_custom_threshold() {
        let filter = OutlierFilter::new(25.0);

        assert!(filter.accept(&Reading::new(1000, 25.0)));
        assert!(!filter.accept(&Reading::new(1000, 25.5)));
    }
}

//! Presentation timestamps

/// Rational playback time: `value / timescale` seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentationTimestamp {
    /// Time value in `timescale` units
    pub value: i64,
    /// Units per second
    pub timescale: u32,
}

impl PresentationTimestamp {
    /// Timestamp of a frame index at the given frame rate.
    ///
    /// The value is the absolute frame index, so a range starting at frame 10
    /// begins at 10/fps seconds rather than zero.
    pub fn of_frame(index: i64, frame_rate: u32) -> Self {
        Self {
            value: index,
            timescale: frame_rate,
        }
    }

    /// Time in seconds
    pub fn as_seconds(&self) -> f64 {
        self.value as f64 / self.timescale as f64
    }

    /// Convert the value into another timescale, truncating toward zero
    pub fn rescale(&self, timescale: u32) -> i64 {
        if self.timescale == timescale {
            return self.value;
        }
        (self.value as i128 * timescale as i128 / self.timescale as i128) as i64
    }

    /// Strict ordering across possibly differing timescales
    pub fn is_after(&self, other: &PresentationTimestamp) -> bool {
        self.value as i128 * other.timescale as i128
            > other.value as i128 * self.timescale as i128
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_of_frame_is_absolute() {
        let ts = PresentationTimestamp::of_frame(10, 30);
        assert_eq!(ts.value, 10);
        assert_eq!(ts.timescale, 30);
        assert!((ts.as_seconds() - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_is_after_same_timescale() {
        let a = PresentationTimestamp::of_frame(1, 30);
        let b = PresentationTimestamp::of_frame(2, 30);
        assert!(b.is_after(&a));
        assert!(!a.is_after(&b));
        assert!(!a.is_after(&a));
    }

    #[test]
    fn test_is_after_cross_timescale() {
        // 1/2 s vs 15/30 s are equal, 16/30 s is later
        let half = PresentationTimestamp {
            value: 1,
            timescale: 2,
        };
        let same = PresentationTimestamp {
            value: 15,
            timescale: 30,
        };
        let later = PresentationTimestamp {
            value: 16,
            timescale: 30,
        };
        assert!(!same.is_after(&half));
        assert!(!half.is_after(&same));
        assert!(later.is_after(&half));
    }

    #[test]
    fn test_rescale() {
        let ts = PresentationTimestamp {
            value: 15,
            timescale: 30,
        };
        assert_eq!(ts.rescale(30), 15);
        assert_eq!(ts.rescale(60), 30);
        assert_eq!(ts.rescale(1000), 500);
    }
}

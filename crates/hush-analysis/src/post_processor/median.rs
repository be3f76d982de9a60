//! Sliding median over the most recent confidence values.

/// Fixed-size circular window with an allocation-free median.
#[derive(Debug, Clone)]
pub(crate) struct MedianWindow {
    values: Vec<f32>,
    scratch: Vec<f32>,
    /// Next slot to write.
    index: usize,
    /// Samples written since the last clear, saturating at the window size.
    len: usize,
}

/// Below this many samples (with the window not yet full) the latest value passes
/// through unchanged.
const MIN_MEDIAN_SAMPLES: usize = 3;

impl MedianWindow {
    pub fn new(size: usize) -> Self {
        Self {
            values: vec![0.0; size],
            scratch: Vec::with_capacity(size),
            index: 0,
            len: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.values.len()
    }

    pub fn is_full(&self) -> bool {
        self.len == self.values.len()
    }

    pub fn push(&mut self, value: f32) {
        self.values[self.index] = value;
        self.index = (self.index + 1) % self.values.len();
        self.len = (self.len + 1).min(self.values.len());
    }

    /// Median of the filled part of the window; even counts average the two middle
    /// values. Returns 0 for an empty window.
    pub fn median(&mut self) -> f32 {
        if self.len == 0 {
            return 0.0;
        }
        if !self.is_full() && self.len <= MIN_MEDIAN_SAMPLES {
            return self.latest();
        }

        // Until the window wraps only the first `len` slots hold data.
        self.scratch.clear();
        self.scratch.extend_from_slice(&self.values[..self.len]);
        let n = self.scratch.len();
        let mid = n / 2;

        let (lower, upper, _) = self.scratch.select_nth_unstable_by(mid, f32::total_cmp);
        let upper = *upper;
        if n % 2 == 1 {
            upper
        } else {
            let below = lower.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            (below + upper) * 0.5
        }
    }

    fn latest(&self) -> f32 {
        let size = self.values.len();
        self.values[(self.index + size - 1) % size]
    }

    /// Window contents, oldest first.
    pub fn history(&self) -> Vec<f32> {
        if self.is_full() {
            let mut history = Vec::with_capacity(self.values.len());
            history.extend_from_slice(&self.values[self.index..]);
            history.extend_from_slice(&self.values[..self.index]);
            history
        } else {
            self.values[..self.len].to_vec()
        }
    }

    pub fn clear(&mut self) {
        self.values.fill(0.0);
        self.index = 0;
        self.len = 0;
    }

    /// Change the window size, discarding history.
    pub fn resize(&mut self, size: usize) {
        self.values = vec![0.0; size];
        self.scratch = Vec::with_capacity(size);
        self.index = 0;
        self.len = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_value_until_enough_samples() {
        let mut window = MedianWindow::new(5);
        window.push(0.1);
        assert_eq!(window.median(), 0.1);
        window.push(0.2);
        assert_eq!(window.median(), 0.2);
        window.push(0.9);
        assert_eq!(window.median(), 0.9);
        window.push(0.1);
        // [0.1, 0.2, 0.9, 0.1] -> (0.1 + 0.2) / 2
        assert!((window.median() - 0.15).abs() < 1e-6);
    }

    #[test]
    fn test_odd_window_median() {
        let mut window = MedianWindow::new(5);
        for value in [0.3, 0.7, 0.8, 0.9, 0.8] {
            window.push(value);
        }
        assert_eq!(window.median(), 0.8);
        window.push(0.1);
        // [0.7, 0.8, 0.9, 0.8, 0.1]
        assert_eq!(window.median(), 0.8);
    }

    #[test]
    fn test_small_window_full_after_three() {
        let mut window = MedianWindow::new(3);
        window.push(0.1);
        window.push(0.9);
        assert_eq!(window.median(), 0.9);
        window.push(0.2);
        assert_eq!(window.median(), 0.2);
    }

    #[test]
    fn test_history_is_chronological() {
        let mut window = MedianWindow::new(3);
        window.push(1.0);
        window.push(2.0);
        assert_eq!(window.history(), vec![1.0, 2.0]);
        window.push(3.0);
        window.push(4.0);
        assert_eq!(window.history(), vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_clear_and_resize() {
        let mut window = MedianWindow::new(3);
        window.push(0.5);
        window.clear();
        assert!(window.history().is_empty());
        assert_eq!(window.median(), 0.0);

        window.resize(7);
        assert_eq!(window.size(), 7);
        assert!(window.history().is_empty());
    }
}

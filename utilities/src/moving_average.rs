use std::collections::VecDeque;

/// Fixed-size window of the most recent samples.
#[derive(Debug, Clone)]
pub struct MovingAverage {
    values: VecDeque<f64>,
    max_size: usize,
}

impl MovingAverage {
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            values: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    pub fn add(&mut self, value: f64) {
        if self.values.len() >= self.max_size {
            self.values.pop_front();
        }
        self.values.push_back(value);
    }

    pub fn mean(&self) -> f64 {
        if self.values.is_empty() {
            0.0
        } else {
            self.values.iter().sum::<f64>() / self.values.len() as f64
        }
    }

    pub fn last(&self) -> Option<f64> {
        self.values.back().copied()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_window_has_zero_mean() {
        let average = MovingAverage::new(4);
        assert!(average.is_empty());
        assert_eq!(average.mean(), 0.0);
        assert_eq!(average.last(), None);
    }

    #[test]
    fn keeps_only_latest_samples() {
        let mut average = MovingAverage::new(3);
        for value in [1.0, 2.0, 3.0, 4.0, 5.0] {
            average.add(value);
        }
        assert_eq!(average.len(), 3);
        assert_eq!(average.mean(), 4.0);
        assert_eq!(average.last(), Some(5.0));
    }
}

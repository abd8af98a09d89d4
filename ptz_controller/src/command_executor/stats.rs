use std::time::Duration;

use utilities::moving_average::MovingAverage;

const WINDOW: usize = 32;

/// Device request timings collected by the session worker.
#[derive(Debug, Clone)]
pub struct RequestStats {
    count: u64,
    last: Option<Duration>,
    window: MovingAverage,
}

impl Default for RequestStats {
    fn default() -> Self {
        Self {
            count: 0,
            last: None,
            window: MovingAverage::new(WINDOW),
        }
    }
}

impl RequestStats {
    pub fn record(&mut self, elapsed: Duration) {
        self.count += 1;
        self.last = Some(elapsed);
        self.window.add(elapsed.as_secs_f64() * 1000.0);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn last(&self) -> Option<Duration> {
        self.last
    }

    /// Mean over the most recent requests.
    pub fn average(&self) -> Duration {
        Duration::from_secs_f64(self.window.mean() / 1000.0)
    }
}

//! RFC 6298-derived retransmission timeout estimator
//!
//! Tracks smoothed RTT (`srtt`) and RTT variation (`rttvar`) in
//! milliseconds, clamped to `[min_rto, max_rto]`.

use std::time::Duration;

const CLOCK_GRANULARITY_MS: i64 = 1000;

/// Per-peer RTO estimator
#[derive(Debug, Clone, Copy)]
pub struct RtoEstimator {
    srtt: Option<i64>,
    rttvar: i64,
    rto: i64,
    min_rto: i64,
    max_rto: i64,
}

impl RtoEstimator {
    /// Construct an estimator with no samples yet, `rto` starting at
    /// `min_rto`
    pub fn new(min_rto: Duration, max_rto: Duration) -> Self {
        let min_rto = min_rto.as_millis() as i64;
        let max_rto = max_rto.as_millis() as i64;
        Self {
            srtt: None,
            rttvar: 0,
            rto: min_rto,
            min_rto,
            max_rto,
        }
    }

    /// Current RTO
    pub fn rto(&self) -> Duration {
        Duration::from_millis(self.rto as u64)
    }

    /// Smoothed RTT, if at least one sample has been taken
    pub fn srtt(&self) -> Option<Duration> {
        self.srtt.map(|ms| Duration::from_millis(ms as u64))
    }

    /// Feed one RTT sample (ignore samples derived from retransmissions
    /// at the call site — this estimator trusts whatever is handed to
    /// it)
    pub fn sample(&mut self, rtt: Duration) {
        let sample = rtt.as_millis() as i64;
        match self.srtt {
            None => {
                self.srtt = Some(sample);
                self.rttvar = sample / 2;
            }
            Some(srtt) => {
                self.rttvar = (3 * self.rttvar + (srtt - sample).abs()) / 4;
                self.srtt = Some((7 * srtt + sample) / 8);
            }
        }
        let srtt = self.srtt.unwrap();
        self.rto = (srtt + (CLOCK_GRANULARITY_MS.max(4 * self.rttvar))).clamp(self.min_rto, self.max_rto);
    }

    /// Backoff applied to a reliable packet that is retransmitted
    ///
    /// `rto ← max(rto*2, max_rto)`: this increases then clamps *up*
    /// rather than down, so `rto` saturates at `max_rto` after the
    /// first retransmit. That is how the reference behaves; preserved
    /// here rather than "fixed" to a conventional doubling-with-cap.
    pub fn backoff(&mut self) {
        self.rto = (self.rto * 2).max(self.max_rto).clamp(self.min_rto, self.max_rto);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_sample_sets_srtt_and_rttvar() {
        let mut est = RtoEstimator::new(Duration::from_millis(200), Duration::from_millis(1000));
        est.sample(Duration::from_millis(300));
        assert!(est.rto() >= Duration::from_millis(200));
        assert!(est.rto() <= Duration::from_millis(1000));
    }

    #[test]
    fn rto_stays_within_bounds_across_samples() {
        let mut est = RtoEstimator::new(Duration::from_millis(200), Duration::from_millis(1000));
        for ms in [50, 900, 10, 500, 1200] {
            est.sample(Duration::from_millis(ms));
            assert!(est.rto() >= Duration::from_millis(200));
            assert!(est.rto() <= Duration::from_millis(1000));
        }
    }

    #[test]
    fn backoff_saturates_at_max_rto() {
        let mut est = RtoEstimator::new(Duration::from_millis(200), Duration::from_millis(1000));
        est.sample(Duration::from_millis(50));
        est.backoff();
        assert_eq!(est.rto(), Duration::from_millis(1000));
        est.backoff();
        assert_eq!(est.rto(), Duration::from_millis(1000));
    }
}

//! # Tempo Estimation Module
//!
//! Estimates a BPM from the loudness envelope of consecutive windows: RMS
//! energy is kept for the last few seconds, local peaks above a dynamic
//! threshold are picked, and the spacing between peaks is clustered.
//!
//! The estimator holds its last good value. Ticks without enough evidence
//! leave the stored BPM untouched rather than resetting it, so a display fed
//! from [`TempoEstimator::bpm`] keeps showing the previous tempo through quiet
//! bars and fills.

use std::collections::VecDeque;

use crate::config::TempoConfig;
use crate::rms;

/// One RMS reading of the energy history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergySample {
    /// Seconds since the estimator started.
    pub timestamp: f64,
    pub energy: f32,
}

/// A group of similar inter-peak intervals.
#[derive(Debug, Clone, Copy)]
struct IntervalCluster {
    sum: f64,
    count: usize,
}

impl IntervalCluster {
    fn mean(&self) -> f64 {
        self.sum / self.count as f64
    }
}

/// Peak-clustering BPM estimator. Owns its energy history exclusively.
#[derive(Debug, Clone)]
pub struct TempoEstimator {
    sample_rate: u32,
    config: TempoConfig,
    history: VecDeque<EnergySample>,
    /// Stream time derived from the samples seen by [`process`](Self::process).
    clock: f64,
    last_compute: Option<f64>,
    bpm: u32,
}

impl TempoEstimator {
    pub fn new(sample_rate: u32) -> Self {
        Self::with_config(sample_rate, TempoConfig::default())
    }

    pub fn with_config(sample_rate: u32, config: TempoConfig) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
            config,
            history: VecDeque::new(),
            clock: 0.0,
            last_compute: None,
            bpm: 0,
        }
    }

    /// Feeds the next window of a continuous stream.
    ///
    /// Windows are assumed to follow each other without overlap: the window is
    /// timestamped at its start and the stream clock advances by its length.
    /// Hosts that poll an overlapping analysis window on a timer should use
    /// [`process_at`](Self::process_at) with their own clock instead.
    pub fn process(&mut self, samples: &[f32]) -> u32 {
        let now = self.clock;
        self.clock += samples.len() as f64 / self.sample_rate as f64;
        self.process_at(samples, now)
    }

    /// Feeds a window captured at `now` seconds.
    ///
    /// # Returns
    /// * The stored estimate when there is too little history or the last
    ///   recomputation was less than the recompute interval ago (0 until the
    ///   first estimate)
    /// * 0 when a recomputation finds fewer than two energy peaks; the stored
    ///   estimate is kept
    /// * The new estimate when the intervals agree, otherwise the stored one
    pub fn process_at(&mut self, samples: &[f32], now: f64) -> u32 {
        self.push_energy(now, rms(samples));

        if self.history.len() < self.config.min_history {
            return self.bpm;
        }

        if let Some(last) = self.last_compute {
            if now - last < self.config.recompute_interval {
                return self.bpm;
            }
        }
        self.last_compute = Some(now);

        let peaks = self.peak_times();
        if peaks.len() < 2 {
            log::debug!("tempo: {} peaks in history, skipping", peaks.len());
            return 0;
        }

        if let Some(interval) = self.dominant_interval(&peaks) {
            self.bpm = (60.0 / interval).round() as u32;
            log::debug!("tempo: {:.3}s interval -> {} BPM", interval, self.bpm);
        }
        self.bpm
    }

    /// The last confidently detected BPM, 0 if none yet.
    pub fn bpm(&self) -> u32 {
        self.bpm
    }

    pub fn history(&self) -> impl Iterator<Item = &EnergySample> {
        self.history.iter()
    }

    /// Forgets the history, the stream clock and the stored estimate.
    pub fn reset(&mut self) {
        self.history.clear();
        self.clock = 0.0;
        self.last_compute = None;
        self.bpm = 0;
    }

    fn push_energy(&mut self, timestamp: f64, energy: f32) {
        self.history.push_back(EnergySample { timestamp, energy });
        let oldest = timestamp - self.config.history_window;
        while self
            .history
            .front()
            .is_some_and(|sample| sample.timestamp < oldest)
        {
            self.history.pop_front();
        }
    }

    /// Timestamps of the history points that rise above the dynamic threshold
    /// and strictly above both neighbours.
    fn peak_times(&self) -> Vec<f64> {
        let mean = self.history.iter().map(|s| s.energy).sum::<f32>() / self.history.len() as f32;
        let threshold = self
            .config
            .threshold_floor
            .max(mean * self.config.threshold_factor);

        (1..self.history.len().saturating_sub(1))
            .filter(|&i| {
                let energy = self.history[i].energy;
                energy > threshold
                    && energy > self.history[i - 1].energy
                    && energy > self.history[i + 1].energy
            })
            .map(|i| self.history[i].timestamp)
            .collect()
    }

    /// Mean of the largest group of plausible inter-peak intervals, if it has
    /// enough members.
    fn dominant_interval(&self, peaks: &[f64]) -> Option<f64> {
        let mut clusters: Vec<IntervalCluster> = Vec::new();

        let intervals = peaks
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .filter(|&delta| delta >= self.config.min_interval && delta <= self.config.max_interval);

        for delta in intervals {
            let tolerance = self.config.cluster_tolerance;
            match clusters
                .iter_mut()
                .find(|cluster| ((delta - cluster.mean()) / cluster.mean()).abs() <= tolerance)
            {
                Some(cluster) => {
                    cluster.sum += delta;
                    cluster.count += 1;
                }
                None => clusters.push(IntervalCluster {
                    sum: delta,
                    count: 1,
                }),
            }
        }

        // First cluster wins a tie on size.
        let best = clusters
            .iter()
            .fold(None::<&IntervalCluster>, |best, cluster| match best {
                Some(b) if b.count >= cluster.count => Some(b),
                _ => Some(cluster),
            })?;

        (best.count >= self.config.min_cluster_size).then(|| best.mean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TICK: f64 = 0.05;

    fn window(level: f32) -> Vec<f32> {
        vec![level; 256]
    }

    /// Feeds `ticks` windows, loud every `beat_every` ticks, and returns the
    /// last reported value.
    fn feed_beats(estimator: &mut TempoEstimator, ticks: usize, beat_every: usize) -> u32 {
        let mut last = 0;
        for tick in 0..ticks {
            let level = if tick % beat_every == 0 { 0.5 } else { 0.05 };
            last = estimator.process_at(&window(level), tick as f64 * TICK);
        }
        last
    }

    #[test]
    fn half_second_pulse_is_120_bpm() {
        let mut estimator = TempoEstimator::new(44100);
        // 4 seconds of 50ms ticks with a peak every 10 ticks.
        feed_beats(&mut estimator, 80, 10);
        let bpm = estimator.bpm();
        assert!((118..=122).contains(&bpm), "got {bpm}");
    }

    #[test]
    fn faster_pulse() {
        let mut estimator = TempoEstimator::new(44100);
        // 0.4s between peaks.
        feed_beats(&mut estimator, 100, 8);
        assert_eq!(estimator.bpm(), 150);
    }

    #[test]
    fn short_history_returns_stored_value() {
        let mut estimator = TempoEstimator::new(44100);
        for tick in 0..9 {
            assert_eq!(estimator.process_at(&window(0.8), tick as f64 * TICK), 0);
        }
    }

    #[test]
    fn pruned_history_holds_the_last_estimate() {
        let mut estimator = TempoEstimator::new(44100);
        feed_beats(&mut estimator, 80, 10);
        let bpm = estimator.bpm();
        assert!((118..=122).contains(&bpm), "got {bpm}");

        // A gap longer than the history window leaves a single point.
        let last = 79.0 * TICK;
        assert_eq!(estimator.process_at(&window(0.0), last + 10.0), bpm);
        assert!(estimator.history().count() < 10);
        assert_eq!(estimator.bpm(), bpm);
    }

    #[test]
    fn estimate_survives_silence() {
        let mut estimator = TempoEstimator::new(44100);
        feed_beats(&mut estimator, 80, 10);
        let bpm = estimator.bpm();
        assert!(bpm > 0);

        // Silence: no peaks. Recomputations report 0, the stored value holds.
        let mut saw_zero = false;
        for tick in 80..160 {
            let reported = estimator.process_at(&window(0.0), tick as f64 * TICK);
            assert!(reported == 0 || reported == bpm);
            saw_zero |= reported == 0;
        }
        assert!(saw_zero);
        assert_eq!(estimator.bpm(), bpm);
    }

    #[test]
    fn history_is_pruned_to_the_window() {
        let mut estimator = TempoEstimator::new(44100);
        feed_beats(&mut estimator, 200, 10);
        let first = estimator.history().next().unwrap().timestamp;
        assert!(199.0 * TICK - first <= 3.0 + 1e-9);
        assert!(estimator.history().count() <= 61);
    }

    #[test]
    fn recomputes_at_most_twice_a_second() {
        let mut estimator = TempoEstimator::new(44100);
        feed_beats(&mut estimator, 80, 10);
        let held = estimator.bpm();
        // A different tempo right after a recomputation is not picked up on the next tick.
        let now = 80.0 * TICK;
        assert_eq!(estimator.process_at(&window(0.9), now), held);
    }

    #[test]
    fn irregular_peaks_do_not_update() {
        let config = TempoConfig::default();
        let estimator = TempoEstimator::with_config(44100, config);
        // Every interval lands in its own cluster.
        assert_eq!(estimator.dominant_interval(&[0.0, 0.3, 0.8, 1.6, 2.9]), None);
        // Out-of-range gaps are dropped before clustering.
        assert_eq!(estimator.dominant_interval(&[0.0, 0.1, 0.2, 2.0]), None);
    }

    #[test]
    fn clusters_tolerate_jitter() {
        let estimator = TempoEstimator::new(44100);
        let interval = estimator
            .dominant_interval(&[0.0, 0.5, 0.98, 1.5, 1.9])
            .unwrap();
        // 0.5, 0.48, 0.52 cluster together; 0.4 is more than 15% away.
        assert!((interval - 0.5).abs() < 1e-9);
    }

    #[test]
    fn process_uses_the_stream_clock() {
        // 2205 samples = 50ms at 44.1kHz.
        let mut estimator = TempoEstimator::new(44100);
        for tick in 0..80 {
            let level = if tick % 10 == 0 { 0.5 } else { 0.05 };
            estimator.process(&vec![level; 2205]);
        }
        assert_eq!(estimator.bpm(), 120);

        estimator.reset();
        assert_eq!(estimator.bpm(), 0);
        assert_eq!(estimator.history().count(), 0);
    }
}

//! Rolling pause/concurrent/mutator time accounting between concurrent
//! collector resets.
//!
//! A concurrent collector interleaves with the application, so allocation
//! and CPU time can only be attributed to the mutator over an explicitly
//! bounded window. The window is closed and restarted on every
//! `CMS-concurrent-reset`.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimingWindowSnapshot {
    pub pause_time: f64,
    pub concurrent_time: f64,
    pub concurrent_cpu_time: f64,
    pub window_begin: f64,
    pub window_end: f64,
    pub allocation_baseline: f64,
}

#[derive(Debug, Clone)]
pub struct TimingWindow {
    cpu_count: u32,
    pause_time: f64,
    concurrent_time: f64,
    concurrent_cpu_time: f64,
    begin: f64,
    end: f64,
    allocation_baseline: f64,
}

/// Mutator allocation rates over a closed window, in KB per CPU-second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowRates {
    pub per_elapsed_cpu: Option<f64>,
    pub per_mutator_cpu: Option<f64>,
}

impl TimingWindow {
    pub fn new(cpu_count: u32) -> Self {
        Self {
            cpu_count: cpu_count.max(1),
            pause_time: 0.0,
            concurrent_time: 0.0,
            concurrent_cpu_time: 0.0,
            begin: 0.0,
            end: 0.0,
            allocation_baseline: 0.0,
        }
    }

    pub fn add_pause(&mut self, secs: f64) {
        self.pause_time += secs;
    }

    /// Concurrent work of `secs`, keeping `active_threads` threads busy.
    pub fn add_concurrent(&mut self, secs: f64, active_threads: u32) {
        self.concurrent_time += secs;
        self.concurrent_cpu_time += secs * f64::from(active_threads);
    }

    /// Stretch the window end to `ts`.
    pub fn observe(&mut self, ts: f64) {
        if ts > self.end {
            self.end = ts;
        }
    }

    /// Start a new window at `ts`; `cumulative_allocation` becomes the
    /// baseline of the next window's allocation delta.
    pub fn reset(&mut self, ts: f64, cumulative_allocation: f64) {
        self.pause_time = 0.0;
        self.concurrent_time = 0.0;
        self.concurrent_cpu_time = 0.0;
        self.begin = ts;
        self.end = ts;
        self.allocation_baseline = cumulative_allocation;
    }

    pub fn pause_time(&self) -> f64 {
        self.pause_time
    }

    pub fn concurrent_time(&self) -> f64 {
        self.concurrent_time
    }

    pub fn concurrent_cpu_time(&self) -> f64 {
        self.concurrent_cpu_time
    }

    pub fn elapsed_time(&self) -> f64 {
        self.end - self.begin
    }

    /// Wall time left to the application, never negative.
    pub fn mutator_time(&self) -> f64 {
        (self.elapsed_time() - self.pause_time - self.concurrent_time).max(0.0)
    }

    pub fn elapsed_cpu_time(&self) -> f64 {
        self.elapsed_time() * f64::from(self.cpu_count)
    }

    pub fn pause_cpu_time(&self) -> f64 {
        self.pause_time * f64::from(self.cpu_count)
    }

    pub fn mutator_cpu_time(&self) -> f64 {
        (self.elapsed_cpu_time() - self.pause_cpu_time() - self.concurrent_cpu_time).max(0.0)
    }

    pub fn allocation_baseline(&self) -> f64 {
        self.allocation_baseline
    }

    /// Allocation rates for the current window given the run's cumulative allocation.
    pub fn rates(&self, cumulative_allocation: f64) -> WindowRates {
        let allocated = cumulative_allocation - self.allocation_baseline;
        let rate = |denominator: f64| {
            if denominator > 0.0 && allocated >= 0.0 {
                Some(allocated / denominator)
            } else {
                None
            }
        };
        WindowRates {
            per_elapsed_cpu: rate(self.elapsed_cpu_time()),
            per_mutator_cpu: rate(self.mutator_cpu_time()),
        }
    }

    pub fn snapshot(&self) -> TimingWindowSnapshot {
        TimingWindowSnapshot {
            pause_time: self.pause_time,
            concurrent_time: self.concurrent_time,
            concurrent_cpu_time: self.concurrent_cpu_time,
            window_begin: self.begin,
            window_end: self.end,
            allocation_baseline: self.allocation_baseline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_mutator_time_is_remainder() {
        let mut w = TimingWindow::new(1);
        w.reset(10.0, 0.0);
        w.add_pause(0.5);
        w.add_concurrent(2.0, 1);
        w.observe(20.0);
        assert!(close(w.elapsed_time(), 10.0));
        assert!(close(w.mutator_time(), 7.5));
    }

    #[test]
    fn test_cpu_times_scale_by_core_count() {
        let mut w = TimingWindow::new(4);
        w.reset(0.0, 0.0);
        w.add_pause(1.0);
        w.add_concurrent(2.0, 1);
        w.observe(10.0);
        assert!(close(w.elapsed_cpu_time(), 40.0));
        assert!(close(w.pause_cpu_time(), 4.0));
        assert!(close(w.concurrent_cpu_time(), 2.0));
        assert!(close(w.mutator_cpu_time(), 34.0));
    }

    #[test]
    fn test_reset_zeroes_accumulators_and_sets_bounds() {
        let mut w = TimingWindow::new(2);
        w.add_pause(1.0);
        w.add_concurrent(1.0, 2);
        w.observe(5.0);
        w.reset(7.0, 1024.0);

        let snap = w.snapshot();
        assert_eq!(snap.pause_time, 0.0);
        assert_eq!(snap.concurrent_time, 0.0);
        assert_eq!(snap.concurrent_cpu_time, 0.0);
        assert_eq!(snap.window_begin, 7.0);
        assert_eq!(snap.window_end, 7.0);
        assert_eq!(snap.allocation_baseline, 1024.0);
    }

    #[test]
    fn test_rates_use_allocation_since_baseline() {
        let mut w = TimingWindow::new(1);
        w.reset(0.0, 1000.0);
        w.add_pause(1.0);
        w.observe(5.0);
        let rates = w.rates(3000.0);
        assert!(close(rates.per_elapsed_cpu.unwrap(), 400.0));
        assert!(close(rates.per_mutator_cpu.unwrap(), 500.0));
    }

    #[test]
    fn test_rates_none_on_empty_window() {
        let mut w = TimingWindow::new(1);
        w.reset(3.0, 0.0);
        let rates = w.rates(100.0);
        assert_eq!(rates.per_elapsed_cpu, None);
        assert_eq!(rates.per_mutator_cpu, None);
    }

    #[test]
    fn test_negative_mutator_time_clamped() {
        let mut w = TimingWindow::new(1);
        w.reset(0.0, 0.0);
        w.add_pause(3.0);
        w.observe(1.0);
        assert_eq!(w.mutator_time(), 0.0);
    }
}

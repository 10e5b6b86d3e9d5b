/// Performance measurement utilities
/// Frame stages are timed and logged at debug level
pub mod profiling;

pub use profiling::{CounterSnapshot, RenderCounters, RENDER_COUNTERS};

use std::time::{Duration, Instant};

pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        log::debug!("[PERF] {}: {}μs", self.name, self.elapsed().as_micros());
    }
}

/// Accumulated frame timings for one dispatch mode
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    pub frames: u32,
    pub submit_us: f64,
    pub dispatch_us: f64,
    pub worst_frame_us: f64,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, submit: Duration, dispatch: Duration) {
        let submit_us = submit.as_secs_f64() * 1.0e6;
        let dispatch_us = dispatch.as_secs_f64() * 1.0e6;
        self.frames += 1;
        self.submit_us += submit_us;
        self.dispatch_us += dispatch_us;
        self.worst_frame_us = self.worst_frame_us.max(submit_us + dispatch_us);
    }

    pub fn log_summary(&self, label: &str) {
        if self.frames == 0 {
            log::info!("{label}: no frames rendered");
            return;
        }
        let n = f64::from(self.frames);
        let total = self.submit_us + self.dispatch_us;
        log::info!(
            "{label}: {} frames, submit {:8.2}μs ({:5.1}%), dispatch {:8.2}μs ({:5.1}%), worst {:8.2}μs",
            self.frames,
            self.submit_us / n,
            self.submit_us / total * 100.0,
            self.dispatch_us / n,
            self.dispatch_us / total * 100.0,
            self.worst_frame_us
        );
    }
}

/// Macro for easy performance measurement
#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        let _timer = $crate::perf::PerfTimer::new($name);
    };
}

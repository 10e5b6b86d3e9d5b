/// Render and task-queue counters for profiling builds.
/// Counting compiles away unless the `profiling` feature is enabled.
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe event counters shared by the renderer and the task queue
pub struct RenderCounters {
    // Submission counters
    pub primitives_pushed: AtomicU64,
    pub texture_slots_created: AtomicU64,

    // Dispatch counters
    pub clusters_dispatched: AtomicU64,
    pub primitives_binned: AtomicU64,

    // Pixel counters
    pub fill_pixels: AtomicU64,
    pub textured_pixels: AtomicU64,
    pub mip_blends: AtomicU64,

    // Task queue counters
    pub tasks_run_by_pool: AtomicU64,
    pub tasks_run_by_caller: AtomicU64,
}

impl RenderCounters {
    pub const fn new() -> Self {
        Self {
            primitives_pushed: AtomicU64::new(0),
            texture_slots_created: AtomicU64::new(0),
            clusters_dispatched: AtomicU64::new(0),
            primitives_binned: AtomicU64::new(0),
            fill_pixels: AtomicU64::new(0),
            textured_pixels: AtomicU64::new(0),
            mip_blends: AtomicU64::new(0),
            tasks_run_by_pool: AtomicU64::new(0),
            tasks_run_by_caller: AtomicU64::new(0),
        }
    }

    fn all(&self) -> [&AtomicU64; 9] {
        [
            &self.primitives_pushed,
            &self.texture_slots_created,
            &self.clusters_dispatched,
            &self.primitives_binned,
            &self.fill_pixels,
            &self.textured_pixels,
            &self.mip_blends,
            &self.tasks_run_by_pool,
            &self.tasks_run_by_caller,
        ]
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        for counter in self.all() {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            primitives_pushed: self.primitives_pushed.load(Ordering::Relaxed),
            texture_slots_created: self.texture_slots_created.load(Ordering::Relaxed),
            clusters_dispatched: self.clusters_dispatched.load(Ordering::Relaxed),
            primitives_binned: self.primitives_binned.load(Ordering::Relaxed),
            fill_pixels: self.fill_pixels.load(Ordering::Relaxed),
            textured_pixels: self.textured_pixels.load(Ordering::Relaxed),
            mip_blends: self.mip_blends.load(Ordering::Relaxed),
            tasks_run_by_pool: self.tasks_run_by_pool.load(Ordering::Relaxed),
            tasks_run_by_caller: self.tasks_run_by_caller.load(Ordering::Relaxed),
        }
    }
}

impl Default for RenderCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of counter values at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub primitives_pushed: u64,
    pub texture_slots_created: u64,
    pub clusters_dispatched: u64,
    pub primitives_binned: u64,
    pub fill_pixels: u64,
    pub textured_pixels: u64,
    pub mip_blends: u64,
    pub tasks_run_by_pool: u64,
    pub tasks_run_by_caller: u64,
}

impl CounterSnapshot {
    /// Log a formatted report at info level
    pub fn log_report(&self) {
        log::info!("=== render counters ===");
        log::info!("primitives pushed:      {:12}", self.primitives_pushed);
        log::info!("texture slots created:  {:12}", self.texture_slots_created);
        log::info!("clusters dispatched:    {:12}", self.clusters_dispatched);
        log::info!("primitives binned:      {:12}", self.primitives_binned);
        if self.clusters_dispatched > 0 {
            log::info!(
                "  per cluster:          {:12.2}",
                self.primitives_binned as f64 / self.clusters_dispatched as f64
            );
        }
        log::info!("fill pixels:            {:12}", self.fill_pixels);
        log::info!("textured pixels:        {:12}", self.textured_pixels);
        log::info!("mip blends:             {:12}", self.mip_blends);
        let tasks = self.tasks_run_by_pool + self.tasks_run_by_caller;
        log::info!("tasks run:              {:12}", tasks);
        if tasks > 0 {
            log::info!(
                "  by caller:            {:11.2}%",
                self.tasks_run_by_caller as f64 / tasks as f64 * 100.0
            );
        }
    }
}

/// Global counters instance
pub static RENDER_COUNTERS: RenderCounters = RenderCounters::new();

/// Macro for incrementing a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Macro for adding to a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add($value, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

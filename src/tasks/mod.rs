/// Work distribution: a bounded task ring drained by a fixed worker pool
pub mod semaphore;
pub mod task_queue;

pub use semaphore::Semaphore;
pub use task_queue::{TaskQueue, TaskQueueConfig, TaskScope, WorkerId};

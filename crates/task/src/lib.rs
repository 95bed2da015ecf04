//! Fluxo - Task core
//!
//! Task orchestration: registry, bounded admission queue, worker pool and
//! the lifecycle controller.
//!
//! # Architecture
//!
//! ```text
//! [Ingester] ──ExportJob──> [TaskQueue] ──> [Worker Pool]
//!     │                      (bounded,        │ per task, end-to-end:
//!     │ frames (bounded)      enqueue         │ artifact → writer →
//!     └───────────────────>   timeout)        │ finalize → upload →
//!                                             │ respond
//! [Status query] ──> [TaskRegistry] ── consistent snapshots
//!                         ▲
//! [LifecycleController] ──┘ sole authority for state transitions
//! ```
//!
//! # Key Design
//!
//! - **One worker per task, end-to-end**: a worker owns the task from
//!   dequeue to terminal response; the stream handler only pumps frames
//!   into the job's bounded channel
//! - **Registry owns the tasks**: `RwLock` map of `Arc<Task>`, per-task
//!   mutex for the mutable cells, snapshot-based reads
//! - **Linear lifecycle**: Queued → Processing → Uploading → Completed,
//!   with Failed reachable from any non-terminal state; the controller
//!   rejects everything else
//! - **Bounded memory**: in-flight state per task is one batch plus the
//!   writer's buffer; nothing accumulates with stream length

mod error;
mod job;
mod lifecycle;
mod metrics;
mod queue;
mod registry;
mod task;
mod worker;

pub use error::{QueueError, TaskError};
pub use job::{ExportJob, IngestFrame};
pub use lifecycle::LifecycleController;
pub use metrics::{TaskMetrics, TaskMetricsSnapshot};
pub use queue::{task_queue, JobReceiver, TaskQueue};
pub use registry::TaskRegistry;
pub use task::{advance_progress, Task, TaskSnapshot};
pub use worker::{WorkerContext, WorkerPool};

/// Default number of pipeline workers
pub const DEFAULT_MAX_CONCURRENT: usize = 10;

/// Default admission queue capacity
pub const DEFAULT_QUEUE_SIZE: usize = 100;

/// Depth of the per-task frame channel between ingester and worker
///
/// Small on purpose: back-pressure must reach the client once the worker
/// falls behind, keeping per-task memory at O(depth × batch).
pub const FRAME_CHANNEL_DEPTH: usize = 8;

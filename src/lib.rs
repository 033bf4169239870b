//! rqueue: a Redis-backed work queue.
//!
//! Producers put deferred function calls on named queues; workers take them
//! off in priority order and run them one at a time.
//!
//! # Architecture
//!
//! ```text
//!     ┌──────────────┐   enqueue    ┌──────────────────────┐
//!     │   Producer   │─────────────►│ rq:queue:high        │
//!     └──────────────┘              │ rq:queue:default     │ Redis lists
//!                                   └──────────┬───────────┘
//!                        dequeue_any (priority)│
//!              ┌───────────────────────────────┼──────────────┐
//!              ▼                               ▼              ▼
//!         ┌─────────┐                    ┌─────────┐    ┌─────────┐
//!         │ Worker 1│                    │ Worker 2│    │ Worker N│
//!         └─────────┘                    └─────────┘    └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rqueue::{Job, Queue, RedisStore, TaskRegistry, Value, Worker};
//!
//! let mut registry = TaskRegistry::new();
//! registry.register_fn("greet", |args, _| async move {
//!     let name = args.first().and_then(Value::as_str).unwrap_or("Stranger");
//!     Ok(Value::from(format!("Hi there, {}!", name)))
//! });
//!
//! let conn = Arc::new(RedisStore::connect("redis://localhost:6379").await?);
//! let queue = Queue::new(conn, "default");
//! queue.enqueue_job(Job::new("greet").with_arg("Nick")).await?;
//!
//! let mut worker = Worker::new(vec![queue], Arc::new(registry));
//! worker.work(true).await?;
//! ```

pub mod cli;
pub mod config;
pub mod connection;
pub mod error;
pub mod job;
pub mod metrics;
pub mod queue;
pub mod registry;
pub mod store;
pub mod tasks;
pub mod value;
pub mod worker;

pub use config::WorkerConfig;
pub use connection::{
    current_connection, pop_connection, push_connection, use_connection, Connection,
    ConnectionGuard, ConnectionStack,
};
pub use error::{
    ConfigError, ConnectionError, DequeueError, ExecutionFault, JobError, QueueError, StoreError,
    WorkerError,
};
pub use job::{Job, JobOutcome, JobStatus};
pub use queue::{Queue, DEFAULT_QUEUE, QUEUE_KEY_PREFIX};
pub use registry::{Task, TaskRegistry};
pub use store::{MemoryStore, RedisStore, Store};
pub use value::{Kwargs, Value};
pub use worker::{ShutdownHandle, Worker, WorkerState, WorkerStats};

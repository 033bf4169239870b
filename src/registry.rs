//! Registry of functions that jobs may call.
//!
//! A job names its function by a stable string. Workers resolve that name
//! against a [`TaskRegistry`] built at process start; names that are not
//! registered cannot be dequeued.
//!
//! # Example
//!
//! ```rust,ignore
//! use rqueue::{TaskRegistry, Value};
//!
//! let mut registry = TaskRegistry::new();
//! registry.register_fn("greet", |args, _kwargs| async move {
//!     let name = args.first().and_then(Value::as_str).unwrap_or("Stranger");
//!     Ok(Value::from(format!("Hi there, {}!", name)))
//! });
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::warn;

use crate::value::{Kwargs, Value};

/// A function that can be executed by a worker.
#[async_trait]
pub trait Task: Send + Sync {
    /// Runs the function with the job's arguments.
    async fn perform(&self, args: Vec<Value>, kwargs: Kwargs) -> anyhow::Result<Value>;
}

/// Adapter that turns an async closure into a [`Task`].
struct FnTask<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> Task for FnTask<F>
where
    F: Fn(Vec<Value>, Kwargs) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    async fn perform(&self, args: Vec<Value>, kwargs: Kwargs) -> anyhow::Result<Value> {
        (self.f)(args, kwargs).await
    }
}

/// Mapping from function names to implementations.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, Arc<dyn Task>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a task under `name`, replacing any previous registration.
    pub fn register(&mut self, name: impl Into<String>, task: impl Task + 'static) -> &mut Self {
        let name = name.into();
        if self.tasks.insert(name.clone(), Arc::new(task)).is_some() {
            warn!(func = %name, "Replacing previously registered task");
        }
        self
    }

    /// Registers an async closure under `name`.
    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(Vec<Value>, Kwargs) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        self.register(name, FnTask { f })
    }

    /// Looks up the task registered under `name`.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Task>> {
        self.tasks.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Returns the registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}

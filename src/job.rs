//! Job definitions.
//!
//! - `Job`: a deferred call to a registered function
//! - `JobOutcome`: what happened when a worker ran it
//! - `JobStatus`: final status of a run
//!
//! # Wire format
//!
//! A job is stored as a JSON array `[func, args, kwargs, reserved]`. The
//! fourth slot is written as `null` and ignored when read. The origin queue is
//! not part of the payload; it is filled in by the queue that popped it.

use std::panic::AssertUnwindSafe;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionFault, JobError};
use crate::registry::TaskRegistry;
use crate::value::{Kwargs, Value};

/// A deferred call to a registered function.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    /// Registered name of the function to call.
    pub func: String,
    /// Positional arguments.
    pub args: Vec<Value>,
    /// Keyword arguments.
    pub kwargs: Kwargs,
    /// Queue this job was dequeued from. `None` until dequeued.
    pub origin: Option<String>,
}

impl Job {
    /// Creates a job calling `func` with no arguments.
    pub fn new(func: impl Into<String>) -> Self {
        Self {
            func: func.into(),
            args: Vec::new(),
            kwargs: Kwargs::new(),
            origin: None,
        }
    }

    /// Creates a job with the given arguments.
    pub fn call(func: impl Into<String>, args: Vec<Value>, kwargs: Kwargs) -> Self {
        Self {
            func: func.into(),
            args,
            kwargs,
            origin: None,
        }
    }

    /// Appends a positional argument.
    pub fn with_arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(value.into());
        self
    }

    /// Sets a keyword argument.
    pub fn with_kwarg(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.kwargs.insert(key.into(), value.into());
        self
    }

    /// Serializes the job into its wire payload.
    ///
    /// # Errors
    ///
    /// `JobError::Encode` if an argument holds a NaN or infinite float, which
    /// the payload cannot represent.
    pub fn encode(&self) -> Result<Vec<u8>, JobError> {
        if let Some(name) = self.non_finite_argument() {
            return Err(JobError::Encode(serde::ser::Error::custom(format!(
                "{} holds a non-finite float",
                name
            ))));
        }

        let tuple = (&self.func, &self.args, &self.kwargs, Option::<()>::None);
        serde_json::to_vec(&tuple).map_err(JobError::Encode)
    }

    fn non_finite_argument(&self) -> Option<String> {
        if let Some(i) = self.args.iter().position(|v| !v.is_finite()) {
            return Some(format!("argument {}", i));
        }
        self.kwargs
            .iter()
            .find(|(_, v)| !v.is_finite())
            .map(|(k, _)| format!("keyword argument '{}'", k))
    }

    /// Rebuilds a job from a wire payload.
    ///
    /// # Errors
    ///
    /// - `JobError::Decode` if the bytes are not JSON
    /// - `JobError::Shape` if the JSON is not a `[func, args, kwargs, reserved]` tuple
    /// - `JobError::Resolution` if `func` is not in `registry`
    pub fn decode(bytes: &[u8], registry: &TaskRegistry) -> Result<Self, JobError> {
        let raw: serde_json::Value = serde_json::from_slice(bytes).map_err(JobError::Decode)?;

        let (func, args, kwargs, _reserved): (String, Vec<Value>, Kwargs, serde_json::Value) =
            serde_json::from_value(raw).map_err(|e| JobError::Shape(e.to_string()))?;

        if !registry.contains(&func) {
            return Err(JobError::Resolution(func));
        }

        Ok(Self {
            func,
            args,
            kwargs,
            origin: None,
        })
    }

    /// Renders the call as `func(arg, key=value)`.
    pub fn description(&self) -> String {
        let args = self.args.iter().map(|v| v.to_string());
        let kwargs = self.kwargs.iter().map(|(k, v)| format!("{}={}", k, v));
        let params: Vec<String> = args.chain(kwargs).collect();
        format!("{}({})", self.func, params.join(", "))
    }

    /// Runs the job's function.
    ///
    /// Errors and panics raised by the function are captured as an
    /// `ExecutionFault`.
    pub async fn perform(&self, registry: &TaskRegistry) -> Result<Value, ExecutionFault> {
        let task = registry.resolve(&self.func).ok_or_else(|| ExecutionFault {
            func: self.func.clone(),
            message: "function is not registered".to_string(),
        })?;

        let run = task.perform(self.args.clone(), self.kwargs.clone());

        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(ExecutionFault {
                func: self.func.clone(),
                message: format!("{:#}", e),
            }),
            Err(panic) => {
                let message = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown panic");
                Err(ExecutionFault {
                    func: self.func.clone(),
                    message: format!("panicked: {}", message),
                })
            }
        }
    }
}

/// Status of a finished job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    /// Function returned normally.
    Completed,
    /// Function returned an error or panicked.
    Failed,
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Result of running one job.
///
/// Outcomes are reported by the worker and then dropped; nothing is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Description of the call, see [`Job::description`].
    pub job: String,
    /// Queue the job came from.
    pub origin: Option<String>,
    /// Final status.
    pub status: JobStatus,
    /// Return value if the function completed.
    pub result: Option<Value>,
    /// Error message if the function failed.
    pub error: Option<String>,
    /// Name of the worker that ran the job.
    pub worker: String,
    /// Duration of the execution in milliseconds.
    pub duration_ms: u64,
    /// When the job finished.
    pub finished_at: DateTime<Utc>,
}

impl JobOutcome {
    /// Creates a successful outcome.
    pub fn success(job: &Job, worker: impl Into<String>, result: Value, duration_ms: u64) -> Self {
        Self {
            job: job.description(),
            origin: job.origin.clone(),
            status: JobStatus::Completed,
            result: Some(result),
            error: None,
            worker: worker.into(),
            duration_ms,
            finished_at: Utc::now(),
        }
    }

    /// Creates a failed outcome.
    pub fn failure(
        job: &Job,
        worker: impl Into<String>,
        fault: &ExecutionFault,
        duration_ms: u64,
    ) -> Self {
        Self {
            job: job.description(),
            origin: job.origin.clone(),
            status: JobStatus::Failed,
            result: None,
            error: Some(fault.message.clone()),
            worker: worker.into(),
            duration_ms,
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Completed
    }
}

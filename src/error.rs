//! Error types for rqueue operations.
//!
//! Defines error types for each layer of the queue:
//! - Store access (Redis or in-memory)
//! - Job payload decoding and resolution
//! - Queue operations and the dequeue boundary
//! - Job execution inside a worker
//! - Worker lifecycle and configuration

use thiserror::Error;

/// Errors raised by a backing store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Failed to connect to the store.
    #[error("Store connection failed: {0}")]
    ConnectionFailed(String),

    /// A blocking pop returned a payload from a key that was not requested.
    /// The payload has been removed from the store.
    #[error("Store popped a payload from unrequested key '{0}'")]
    UnexpectedKey(String),

    /// Redis command failed.
    #[error("Redis operation failed: {0}")]
    Redis(#[from] redis::RedisError),
}

/// Errors raised while turning a job into a payload or back.
#[derive(Debug, Error)]
pub enum JobError {
    /// Payload bytes are not valid serialized data.
    #[error("payload is not valid job data: {0}")]
    Decode(#[source] serde_json::Error),

    /// Payload decodes but is not a `[func, args, kwargs, reserved]` tuple.
    #[error("payload is not a job tuple: {0}")]
    Shape(String),

    /// The function named in the payload is not registered in this process.
    #[error("function '{0}' is not registered")]
    Resolution(String),

    /// Job could not be serialized.
    #[error("failed to encode job: {0}")]
    Encode(#[source] serde_json::Error),
}

/// A payload was taken off a queue but could not be turned into a job.
///
/// The payload has already been removed from the store when this is returned.
#[derive(Debug, Error)]
#[error("could not dequeue job from queue '{queue}': {source}")]
pub struct DequeueError {
    /// Name of the queue the payload came from.
    pub queue: String,
    /// Underlying decode failure.
    #[source]
    pub source: JobError,
}

/// Errors visible to callers of `Queue` operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A malformed payload was consumed.
    #[error(transparent)]
    Dequeue(#[from] DequeueError),

    /// A job could not be encoded for enqueueing.
    #[error("failed to enqueue job: {0}")]
    Encode(#[source] JobError),
}

impl QueueError {
    /// Returns whether this error came from a malformed payload.
    pub fn is_dequeue(&self) -> bool {
        matches!(self, QueueError::Dequeue(_))
    }
}

/// Errors from the process-wide connection stack.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConnectionError {
    /// No connection has been pushed.
    #[error("no active store connection; push one before using queues")]
    NoActiveConnection,
}

/// The invoked function returned an error or panicked.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("job {func} failed: {message}")]
pub struct ExecutionFault {
    /// Registered function name.
    pub func: String,
    /// Error or panic message.
    pub message: String,
}

/// Errors that stop a worker loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// A queue operation failed for a reason other than a bad payload.
    #[error("Queue operation failed: {0}")]
    Queue(#[from] QueueError),

    /// The worker was built without any queues.
    #[error("Worker has no queues to listen on")]
    NoQueues,
}

/// Errors from worker configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    /// Configuration validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dequeue_error_display() {
        let err = DequeueError {
            queue: "foo".to_string(),
            source: JobError::Resolution("fooobar".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("foo"));
        assert!(msg.contains("fooobar"));
    }

    #[test]
    fn test_queue_error_is_dequeue() {
        let err = QueueError::from(DequeueError {
            queue: "foo".to_string(),
            source: JobError::Shape("expected array".to_string()),
        });
        assert!(err.is_dequeue());

        let err = QueueError::from(StoreError::ConnectionFailed("refused".to_string()));
        assert!(!err.is_dequeue());
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_execution_fault_display() {
        let fault = ExecutionFault {
            func: "testjob".to_string(),
            message: "boom".to_string(),
        };
        assert_eq!(fault.to_string(), "job testjob failed: boom");
    }

    #[test]
    fn test_worker_error_display() {
        assert!(WorkerError::NoQueues.to_string().contains("no queues"));
        assert!(ConnectionError::NoActiveConnection
            .to_string()
            .contains("no active"));
    }
}

//! Named FIFO queues of pending jobs.
//!
//! A [`Queue`] is a lightweight handle: a name plus the store it lives in.
//! All durable state is the list at `rq:queue:<name>`. Jobs are appended to
//! the tail (RPUSH) and taken from the head (LPOP), so each queue is FIFO, and
//! concurrent workers are coordinated only by the store's atomic pops.
//!
//! # Priority
//!
//! [`Queue::dequeue_any`] takes an ordered list of queues and always serves
//! the earliest non-empty one first, re-evaluated on every call.
//!
//! # Malformed payloads
//!
//! A payload that cannot be decoded is still removed from the list, and the
//! caller gets `QueueError::Dequeue`. A poisoned message is therefore seen at
//! most once.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use tracing::{debug, warn};

use crate::connection::{current_connection, Connection};
use crate::error::{ConnectionError, DequeueError, QueueError, StoreError};
use crate::job::Job;
use crate::registry::TaskRegistry;
use crate::value::{Kwargs, Value};

/// Prefix of every queue key in the store.
pub const QUEUE_KEY_PREFIX: &str = "rq:queue:";

/// Name used when no queue name is given.
pub const DEFAULT_QUEUE: &str = "default";

/// Handle to a named queue.
#[derive(Clone)]
pub struct Queue {
    name: String,
    key: String,
    conn: Connection,
}

impl Queue {
    /// Creates a handle for queue `name` in the given store.
    pub fn new(conn: Connection, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            key: format!("{}{}", QUEUE_KEY_PREFIX, name),
            name,
            conn,
        }
    }

    /// Creates a handle for the `default` queue.
    pub fn default_queue(conn: Connection) -> Self {
        Self::new(conn, DEFAULT_QUEUE)
    }

    /// Creates a handle using the current connection of the process-wide stack.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::NoActiveConnection` if nothing is bound.
    pub fn from_context(name: impl Into<String>) -> Result<Self, ConnectionError> {
        Ok(Self::new(current_connection()?, name))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store key holding this queue's payloads.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Store this queue lives in.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Enqueues a call to `func` and returns the job that was pushed.
    ///
    /// The returned job has no origin; that is set when it is dequeued.
    pub async fn enqueue(
        &self,
        func: impl Into<String>,
        args: Vec<Value>,
        kwargs: Kwargs,
    ) -> Result<Job, QueueError> {
        self.enqueue_job(Job::call(func, args, kwargs)).await
    }

    /// Enqueues an already built job.
    pub async fn enqueue_job(&self, job: Job) -> Result<Job, QueueError> {
        let payload = job.encode().map_err(QueueError::Encode)?;
        self.conn.push(&self.key, payload).await?;
        debug!(queue = %self.name, job = %job.description(), "Enqueued job");
        Ok(job)
    }

    /// Takes the job at the head of this queue.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(job))` with `origin` set to this queue's name
    /// - `Ok(None)` if the queue is empty
    ///
    /// # Errors
    ///
    /// `QueueError::Dequeue` if the head payload could not be decoded. The
    /// payload has been removed from the queue.
    pub async fn dequeue(&self, registry: &TaskRegistry) -> Result<Option<Job>, QueueError> {
        match self.conn.pop(&self.key).await? {
            Some(payload) => self.decode(&payload, registry).map(Some),
            None => Ok(None),
        }
    }

    /// Takes the next job from the first non-empty queue in `queues`.
    ///
    /// Queues earlier in the list always win, regardless of when jobs were
    /// enqueued.
    ///
    /// With `timeout` set to `None` this returns immediately. With
    /// `Some(t)` it waits up to `t` for work using a single multi-key wait on
    /// the first queue's store, which must be shared by all queues in the list.
    ///
    /// # Errors
    ///
    /// `QueueError::Dequeue` naming the queue whose payload was malformed.
    pub async fn dequeue_any(
        queues: &[Queue],
        registry: &TaskRegistry,
        timeout: Option<Duration>,
    ) -> Result<Option<Job>, QueueError> {
        for queue in queues {
            if let Some(job) = queue.dequeue(registry).await? {
                return Ok(Some(job));
            }
        }

        let (Some(timeout), Some(first)) = (timeout, queues.first()) else {
            return Ok(None);
        };

        let keys: Vec<String> = queues.iter().map(|q| q.key.clone()).collect();
        let Some((key, payload)) = first.conn.blocking_pop(&keys, timeout).await? else {
            return Ok(None);
        };

        match queues.iter().find(|q| q.key == key) {
            Some(queue) => queue.decode(&payload, registry).map(Some),
            None => {
                warn!(
                    key = %key,
                    bytes = payload.len(),
                    "Store returned payload for an unknown key"
                );
                Err(StoreError::UnexpectedKey(key).into())
            }
        }
    }

    /// Returns whether the queue holds no payloads.
    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.count().await? == 0)
    }

    /// Returns the number of pending payloads.
    pub async fn count(&self) -> Result<usize, QueueError> {
        Ok(self.conn.len(&self.key).await?)
    }

    /// Returns all pending payloads, head first, without removing them.
    pub async fn messages(&self) -> Result<Vec<Vec<u8>>, QueueError> {
        Ok(self.conn.range(&self.key).await?)
    }

    /// Removes every pending payload.
    pub async fn clear(&self) -> Result<(), QueueError> {
        self.conn.delete(&self.key).await?;
        Ok(())
    }

    fn decode(&self, payload: &[u8], registry: &TaskRegistry) -> Result<Job, QueueError> {
        match Job::decode(payload, registry) {
            Ok(mut job) => {
                job.origin = Some(self.name.clone());
                Ok(job)
            }
            Err(source) => Err(DequeueError {
                queue: self.name.clone(),
                source,
            }
            .into()),
        }
    }
}

impl PartialEq for Queue {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Queue {}

impl Hash for Queue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl fmt::Debug for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Queue").field("name", &self.name).finish()
    }
}

impl fmt::Display for Queue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::JobError;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    fn store() -> Connection {
        Arc::new(MemoryStore::new())
    }

    fn registry() -> TaskRegistry {
        let mut registry = TaskRegistry::new();
        registry.register_fn("testjob", |_, _| async { Ok(Value::Null) });
        registry
    }

    #[test]
    fn test_create_queue() {
        let q = Queue::new(store(), "my-queue");
        assert_eq!(q.name(), "my-queue");
        assert_eq!(q.key(), "rq:queue:my-queue");
    }

    #[test]
    fn test_create_default_queue() {
        assert_eq!(Queue::default_queue(store()).name(), "default");
    }

    #[test]
    fn test_equality_by_name() {
        let conn = store();
        let q1 = Queue::new(Arc::clone(&conn), "foo");
        let q2 = Queue::new(store(), "foo");
        let q3 = Queue::new(conn, "bar");

        assert_eq!(q1, q2);
        assert_eq!(q2, q1);
        assert_ne!(q1, q3);
        assert_ne!(q2, q3);
    }

    #[tokio::test]
    async fn test_queue_empty() {
        let conn = store();
        let q = Queue::new(Arc::clone(&conn), "my-queue");
        assert!(q.is_empty().await.expect("empty"));

        conn.push(q.key(), b"some val".to_vec()).await.expect("push");
        assert!(!q.is_empty().await.expect("empty"));
        assert_eq!(q.count().await.expect("count"), 1);
    }

    #[tokio::test]
    async fn test_enqueue_then_dequeue() {
        let q = Queue::new(store(), "foo");
        let mut kwargs = Kwargs::new();
        kwargs.insert("foo".to_string(), Value::from("bar"));

        let queued = q
            .enqueue("testjob", vec![Value::from("Rick")], kwargs)
            .await
            .expect("enqueue");
        assert!(queued.origin.is_none());

        let job = q
            .dequeue(&registry())
            .await
            .expect("dequeue")
            .expect("a job");
        assert_eq!(job.func, "testjob");
        assert_eq!(job.origin.as_deref(), Some("foo"));
        assert_eq!(job.args[0], Value::from("Rick"));
        assert_eq!(job.kwargs["foo"], Value::from("bar"));
        assert!(q.is_empty().await.expect("empty"));
    }

    #[tokio::test]
    async fn test_dequeue_empty_is_none() {
        let q = Queue::new(store(), "foo");
        assert!(q.dequeue(&registry()).await.expect("dequeue").is_none());
    }

    #[tokio::test]
    async fn test_fifo_within_queue() {
        let q = Queue::new(store(), "foo");
        for i in 0..3 {
            q.enqueue_job(Job::new("testjob").with_arg(i))
                .await
                .expect("enqueue");
        }

        let registry = registry();
        for i in 0..3 {
            let job = q.dequeue(&registry).await.expect("dequeue").expect("job");
            assert_eq!(job.args, vec![Value::Int(i)]);
        }
    }

    #[tokio::test]
    async fn test_malformed_payload_is_consumed() {
        let q = Queue::new(store(), "foo");
        q.connection()
            .push(q.key(), b"this is nothing like serialized data".to_vec())
            .await
            .expect("push");

        let err = q.dequeue(&registry()).await.expect_err("should fail");
        match err {
            QueueError::Dequeue(DequeueError { queue, source }) => {
                assert_eq!(queue, "foo");
                assert!(matches!(source, JobError::Decode(_)));
            }
            other => panic!("expected dequeue error, got {:?}", other),
        }
        assert!(q.is_empty().await.expect("empty"));
    }

    #[tokio::test]
    async fn test_messages_and_clear() {
        let q = Queue::new(store(), "foo");
        q.enqueue_job(Job::new("testjob").with_arg("a"))
            .await
            .expect("enqueue");
        q.enqueue_job(Job::new("testjob").with_arg("b"))
            .await
            .expect("enqueue");

        let messages = q.messages().await.expect("messages");
        assert_eq!(messages.len(), 2);
        let first = Job::decode(&messages[0], &registry()).expect("decode");
        assert_eq!(first.args, vec![Value::from("a")]);

        q.clear().await.expect("clear");
        assert!(q.is_empty().await.expect("empty"));
    }

    #[tokio::test]
    async fn test_dequeue_any_blocking_waits_for_work() {
        let conn = store();
        let fooq = Queue::new(Arc::clone(&conn), "foo");
        let barq = Queue::new(Arc::clone(&conn), "bar");

        let producer = {
            let barq = barq.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                barq.enqueue_job(Job::new("testjob").with_arg("late"))
                    .await
                    .expect("enqueue");
            })
        };

        let job = Queue::dequeue_any(
            &[fooq, barq],
            &registry(),
            Some(Duration::from_secs(5)),
        )
        .await
        .expect("dequeue")
        .expect("job");
        producer.await.expect("producer");

        assert_eq!(job.origin.as_deref(), Some("bar"));
        assert_eq!(job.args, vec![Value::from("late")]);
    }

    #[tokio::test]
    async fn test_dequeue_any_blocking_times_out() {
        let q = Queue::new(store(), "foo");
        let job = Queue::dequeue_any(&[q], &registry(), Some(Duration::from_millis(20)))
            .await
            .expect("dequeue");
        assert!(job.is_none());
    }

    #[tokio::test]
    async fn test_enqueue_rejects_non_finite_float() {
        let q = Queue::new(store(), "foo");

        let err = q
            .enqueue_job(Job::new("testjob").with_arg(f64::INFINITY))
            .await
            .expect_err("should fail");
        assert!(matches!(err, QueueError::Encode(JobError::Encode(_))));
        assert!(q.is_empty().await.expect("empty"));
    }

    /// Store whose blocking pop answers from a key nobody asked for.
    struct StrayKeyStore;

    #[async_trait::async_trait]
    impl crate::store::Store for StrayKeyStore {
        async fn push(&self, _key: &str, _payload: Vec<u8>) -> Result<(), StoreError> {
            Ok(())
        }

        async fn pop(&self, _key: &str) -> Result<Option<Vec<u8>>, StoreError> {
            Ok(None)
        }

        async fn blocking_pop(
            &self,
            _keys: &[String],
            _timeout: Duration,
        ) -> Result<Option<(String, Vec<u8>)>, StoreError> {
            let payload = Job::new("testjob")
                .encode()
                .map_err(|e| StoreError::ConnectionFailed(e.to_string()))?;
            Ok(Some(("rq:queue:elsewhere".to_string(), payload)))
        }

        async fn len(&self, _key: &str) -> Result<usize, StoreError> {
            Ok(0)
        }

        async fn range(&self, _key: &str) -> Result<Vec<Vec<u8>>, StoreError> {
            Ok(Vec::new())
        }

        async fn delete(&self, _key: &str) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_dequeue_any_reports_payload_from_unrequested_key() {
        let q = Queue::new(Arc::new(StrayKeyStore), "foo");

        let err = Queue::dequeue_any(&[q], &registry(), Some(Duration::from_millis(5)))
            .await
            .expect_err("should fail");
        match err {
            QueueError::Store(StoreError::UnexpectedKey(key)) => {
                assert_eq!(key, "rq:queue:elsewhere");
            }
            other => panic!("expected unexpected-key error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dequeue_any_without_queues() {
        let job = Queue::dequeue_any(&[], &registry(), Some(Duration::from_millis(5)))
            .await
            .expect("dequeue");
        assert!(job.is_none());
    }
}

//! Functions registered by the `rqueue` binary.
//!
//! Applications embedding the library register their own tasks; these exist
//! so a stock worker can be exercised from the command line.

use std::time::Duration;

use anyhow::Context;

use crate::registry::TaskRegistry;
use crate::value::{Kwargs, Value};

/// Registers `echo` and `sleep` into `registry`.
pub fn register_builtin(registry: &mut TaskRegistry) -> &mut TaskRegistry {
    registry
        .register_fn("echo", |args, kwargs| async move { Ok(echo(args, kwargs)) })
        .register_fn("sleep", sleep)
}

/// Returns a registry holding only the builtin tasks.
pub fn builtin_registry() -> TaskRegistry {
    let mut registry = TaskRegistry::new();
    register_builtin(&mut registry);
    registry
}

async fn sleep(args: Vec<Value>, kwargs: Kwargs) -> anyhow::Result<Value> {
    let secs = args
        .first()
        .or_else(|| kwargs.get("seconds"))
        .and_then(Value::as_f64)
        .context("sleep expects a number of seconds")?;
    let duration = Duration::try_from_secs_f64(secs)
        .with_context(|| format!("sleep expects a non-negative finite duration, got {}", secs))?;
    tokio::time::sleep(duration).await;
    Ok(Value::Null)
}

fn echo(args: Vec<Value>, kwargs: Kwargs) -> Value {
    if kwargs.is_empty() {
        return Value::List(args);
    }
    let mut map = kwargs;
    map.insert("args".to_string(), Value::List(args));
    Value::Map(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;

    #[tokio::test]
    async fn test_echo() {
        let registry = builtin_registry();
        let out = Job::new("echo")
            .with_arg(1)
            .perform(&registry)
            .await
            .expect("echo");
        assert_eq!(out, Value::List(vec![Value::Int(1)]));

        let out = Job::new("echo")
            .with_kwarg("k", "v")
            .perform(&registry)
            .await
            .expect("echo");
        let Value::Map(map) = out else {
            panic!("expected a map");
        };
        assert_eq!(map["k"], Value::from("v"));
        assert_eq!(map["args"], Value::List(Vec::new()));
    }

    #[tokio::test]
    async fn test_sleep_requires_seconds() {
        let registry = builtin_registry();
        let fault = Job::new("sleep")
            .perform(&registry)
            .await
            .expect_err("should fail");
        assert!(fault.message.contains("seconds"));

        let out = Job::new("sleep")
            .with_kwarg("seconds", 0.0)
            .perform(&registry)
            .await
            .expect("sleep");
        assert!(out.is_null());
    }

    #[tokio::test]
    async fn test_sleep_rejects_unrepresentable_durations() {
        let registry = builtin_registry();
        for secs in [f64::INFINITY, f64::MAX, -1.0] {
            let fault = Job::new("sleep")
                .with_arg(secs)
                .perform(&registry)
                .await
                .expect_err("should fail");
            assert!(fault.message.contains("non-negative finite"));
            assert!(!fault.message.contains("panicked"));
        }
    }
}

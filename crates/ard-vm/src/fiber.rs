//! Fiber completion handles.
//!
//! A fiber runs on its own OS thread with its own machine. The handle it
//! returns holds the eventual outcome; `wait` blocks on a condition variable
//! until the thread has stored it.

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::value::Value;

/// Outcome of a fiber: its result value or the reason it failed.
pub type FiberOutcome = Result<Value, String>;

#[derive(Debug, Default)]
pub struct Fiber {
    outcome: Mutex<Option<FiberOutcome>>,
    done: Condvar,
}

impl Fiber {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<FiberOutcome>> {
        self.outcome.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store the outcome and wake every waiter. Only the first call counts.
    pub fn complete(&self, outcome: FiberOutcome) {
        let mut slot = self.lock();
        if slot.is_none() {
            *slot = Some(outcome);
        }
        self.done.notify_all();
    }

    pub fn is_done(&self) -> bool {
        self.lock().is_some()
    }

    /// Block until the fiber finishes. Waiting again yields the same outcome.
    pub fn wait(&self) -> FiberOutcome {
        let mut slot = self.lock();
        loop {
            if let Some(outcome) = slot.as_ref() {
                return outcome.clone();
            }
            slot = self
                .done
                .wait(slot)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_wait_blocks_until_complete() {
        let fiber = Arc::new(Fiber::new());
        let handle = Arc::clone(&fiber);
        let worker = thread::spawn(move || {
            thread::sleep(std::time::Duration::from_millis(5));
            handle.complete(Ok(Value::Int(7)));
        });
        assert_eq!(fiber.wait(), Ok(Value::Int(7)));
        assert!(fiber.is_done());
        worker.join().unwrap();
    }

    #[test]
    fn test_first_outcome_wins() {
        let fiber = Fiber::new();
        fiber.complete(Err("boom".into()));
        fiber.complete(Ok(Value::Void));
        assert_eq!(fiber.wait(), Err("boom".to_string()));
        assert_eq!(fiber.wait(), Err("boom".to_string()));
    }
}

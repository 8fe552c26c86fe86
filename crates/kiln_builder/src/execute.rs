//! Running one chunk under a time budget.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kiln_eval::{ChunkOutput, ChunkProgram, Evaluator, InjectedModules, LoadError};
use tracing::warn;

/// Executes `program` on its own thread and waits at most `timeout`.
///
/// A panicking evaluator is reported as [`LoadError::Panicked`]. On
/// timeout the thread is abandoned; its late result is discarded.
pub fn run_chunk(
    evaluator: Arc<dyn Evaluator>,
    injected: Arc<InjectedModules>,
    program: ChunkProgram,
    timeout: Duration,
) -> Result<ChunkOutput, LoadError> {
    let index = program.index;
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name(format!("kiln-chunk-{index}"))
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| evaluator.execute(&program, &injected)));
            // The receiver is gone after a timeout.
            let _ = tx.send(result);
        })
        .map_err(|e| LoadError::Panicked(format!("cannot start evaluator thread: {e}")))?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(result)) => result,
        Ok(Err(payload)) => Err(LoadError::Panicked(panic_message(payload.as_ref()))),
        Err(RecvTimeoutError::Timeout) => {
            warn!(chunk = index, timeout_ms = timeout.as_millis() as u64, "chunk timed out");
            Err(LoadError::Timeout(timeout))
        }
        Err(RecvTimeoutError::Disconnected) => {
            Err(LoadError::Panicked("evaluator thread exited without a result".to_string()))
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    struct Sleepy(Duration);

    impl Evaluator for Sleepy {
        fn execute(&self, _: &ChunkProgram, _: &InjectedModules) -> Result<ChunkOutput, LoadError> {
            thread::sleep(self.0);
            Ok(ChunkOutput::default())
        }
    }

    struct Panicky;

    impl Evaluator for Panicky {
        fn execute(&self, _: &ChunkProgram, _: &InjectedModules) -> Result<ChunkOutput, LoadError> {
            panic!("evaluator exploded")
        }
    }

    fn program() -> ChunkProgram {
        ChunkProgram {
            index: 3,
            files: vec!["a.ts".into()],
            steps: vec![],
            imports: BTreeMap::new(),
        }
    }

    #[test]
    fn finishes_within_budget() {
        let result = run_chunk(
            Arc::new(Sleepy(Duration::ZERO)),
            Arc::new(InjectedModules::new()),
            program(),
            Duration::from_secs(5),
        );
        assert_eq!(result, Ok(ChunkOutput::default()));
    }

    #[test]
    fn times_out() {
        let timeout = Duration::from_millis(20);
        let result = run_chunk(
            Arc::new(Sleepy(Duration::from_secs(2))),
            Arc::new(InjectedModules::new()),
            program(),
            timeout,
        );
        assert_eq!(result, Err(LoadError::Timeout(timeout)));
    }

    #[test]
    fn panics_become_load_errors() {
        let result = run_chunk(
            Arc::new(Panicky),
            Arc::new(InjectedModules::new()),
            program(),
            Duration::from_secs(5),
        );
        assert_eq!(result, Err(LoadError::Panicked("evaluator exploded".to_string())));
    }
}

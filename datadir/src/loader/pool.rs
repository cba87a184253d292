use crate::error::{Error, Result};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

const THREAD_PREFIX: &str = "datadir-loader";

/// The bounded pool both loads run on. Each top-level load is one
/// [`run`](Self::run) call; fan-out inside it stays on the same threads.
pub struct LoaderPool {
    pool: ThreadPool,
    size: usize,
}

impl LoaderPool {
    pub fn new(size: usize) -> Result<Self> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(size)
            .thread_name(|i| format!("{THREAD_PREFIX}-{i}"))
            .panic_handler(|payload| {
                log::error!(
                    "Uncaught panic in {}: {}",
                    current_worker(),
                    panic_message(payload.as_ref())
                );
            })
            .build()?;
        Ok(LoaderPool { pool, size })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Run `task` on the pool and block until it finishes. A panic anywhere
    /// in the task becomes [`Error::WorkerPanic`].
    pub fn run<R, F>(&self, task: F) -> Result<R>
    where
        R: Send,
        F: FnOnce() -> Result<R> + Send,
    {
        self.pool
            .install(|| match panic::catch_unwind(AssertUnwindSafe(task)) {
                Ok(result) => result,
                Err(payload) => {
                    let worker = current_worker();
                    let message = panic_message(payload.as_ref());
                    log::error!("Worker {worker} panicked: {message}");
                    Err(Error::WorkerPanic { worker, message })
                }
            })
    }
}

fn current_worker() -> String {
    std::thread::current()
        .name()
        .unwrap_or("unnamed")
        .to_string()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".into()
    }
}

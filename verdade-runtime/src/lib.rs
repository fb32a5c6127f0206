use anyhow::Result;
use std::time::Duration;
use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

/// Cloneable access to the runtime and its shutdown token.
#[derive(Clone)]
pub struct VerdadeHandle {
    inner: Handle,
    cancel: CancellationToken,
}

/// Multi-threaded tokio runtime that owns the service's shutdown token.
pub struct VerdadeRuntime {
    runtime: Runtime,
    cancel: CancellationToken,
}

impl VerdadeRuntime {
    /// Build a runtime with named worker threads.
    ///
    /// ```
    /// use verdade_runtime::VerdadeRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = VerdadeRuntime::build("doctest-runtime", Some(1))
    ///     .expect("runtime builds");
    /// let value = runtime.block_on(async { 2 + 2 });
    /// assert_eq!(value, 4);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn build(thread_name: &str, worker_threads: Option<usize>) -> Result<Self> {
        let mut builder = Builder::new_multi_thread();
        builder.enable_all().thread_name(thread_name);

        if let Some(workers) = worker_threads {
            builder.worker_threads(workers.max(1));
        }

        Ok(Self {
            runtime: builder.build()?,
            cancel: CancellationToken::new(),
        })
    }

    pub fn handle(&self) -> VerdadeHandle {
        VerdadeHandle {
            inner: self.runtime.handle().clone(),
            cancel: self.cancel.clone(),
        }
    }

    pub fn block_on<F: std::future::Future>(&self, fut: F) -> F::Output {
        self.runtime.block_on(fut)
    }

    /// Cancel outstanding work and give tasks `graceful` to finish.
    pub fn shutdown(self, graceful: Duration) {
        self.cancel.cancel();
        self.runtime.shutdown_timeout(graceful);
    }
}

impl VerdadeHandle {
    /// Spawn a future onto the shared runtime.
    ///
    /// ```
    /// use verdade_runtime::VerdadeRuntime;
    /// use std::time::Duration;
    ///
    /// let runtime = VerdadeRuntime::build("handle-doctest", Some(1)).unwrap();
    /// let handle = runtime.handle();
    /// let task = handle.spawn(async { 21 * 2 });
    /// let result = runtime.block_on(async move { task.await.unwrap() });
    /// assert_eq!(result, 42);
    /// runtime.shutdown(Duration::from_millis(10));
    /// ```
    pub fn spawn<F, T>(&self, fut: F) -> JoinHandle<T>
    where
        F: std::future::Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        self.inner.spawn(fut)
    }

    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves once shutdown has been requested. Suitable for
    /// `axum::serve(..).with_graceful_shutdown(..)`.
    pub fn shutdown_signal(&self) -> WaitForCancellationFutureOwned {
        self.cancel.clone().cancelled_owned()
    }

    /// Cancel the shared token on the first ctrl-c.
    pub fn cancel_on_ctrl_c(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        self.inner.spawn(async move {
            tokio::select! {
                res = tokio::signal::ctrl_c() => {
                    match res {
                        Ok(()) => tracing::info!("runtime.ctrl_c"),
                        Err(err) => tracing::warn!(error=%err, "runtime.signal_unavailable"),
                    }
                    cancel.cancel();
                }
                _ = cancel.cancelled() => {}
            }
        })
    }
}

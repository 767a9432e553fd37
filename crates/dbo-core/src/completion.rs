//! Completion handles
//!
//! Every façade operation is one future. The `sync` flag only decides who
//! drives it: the façade awaits it before returning ([`Completion::Ready`]),
//! or spawns it on the runtime and hands back [`Completion::Pending`].

use crate::error::DboError;
use futures::future::BoxFuture;
use std::future::{Future, IntoFuture};
use tokio::task::JoinHandle;

/// Outcome of a façade operation, possibly still running
#[derive(Debug)]
pub enum Completion<T> {
    /// Finished before the call returned
    Ready(Result<T, DboError>),
    /// Running on the tokio runtime
    Pending(JoinHandle<Result<T, DboError>>),
}

impl<T: Send + 'static> Completion<T> {
    /// Await `operation` inline when `sync`, otherwise spawn it
    ///
    /// Must be called from within a tokio runtime when `sync` is false.
    pub async fn drive<F>(sync: bool, operation: F) -> Self
    where
        F: Future<Output = Result<T, DboError>> + Send + 'static,
    {
        if sync {
            Completion::Ready(operation.await)
        } else {
            Completion::Pending(tokio::spawn(operation))
        }
    }

    /// Whether the result is already available without awaiting
    #[must_use]
    pub fn is_ready(&self) -> bool {
        match self {
            Completion::Ready(_) => true,
            Completion::Pending(handle) => handle.is_finished(),
        }
    }

    /// Wait for the result
    ///
    /// # Errors
    /// The operation's own error, or `DboError::TaskFailed` if the spawned
    /// task panicked or was aborted.
    pub async fn wait(self) -> Result<T, DboError> {
        match self {
            Completion::Ready(result) => result,
            Completion::Pending(handle) => handle
                .await
                .map_err(|e| DboError::TaskFailed(e.to_string()))?,
        }
    }
}

impl<T: Send + 'static> IntoFuture for Completion<T> {
    type Output = Result<T, DboError>;
    type IntoFuture = BoxFuture<'static, Result<T, DboError>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.wait())
    }
}

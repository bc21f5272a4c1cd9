use std::future::Future;

use futures_util::future::{try_join_all, BoxFuture, FutureExt, Shared};

use crate::error::{Error, Result};

use super::{resolve, Arg, Value};

/// A handle to a value that becomes available asynchronously.
///
/// Cloning a `Deferred` is cheap and every clone observes the same single
/// outcome: the underlying future runs at most once, and awaiting the handle
/// has no side effect on the operation that produced it.
#[derive(Clone)]
pub struct Deferred {
    inner: Shared<BoxFuture<'static, Result<Arg>>>,
}

impl Deferred {
    /// Wraps a future. Nothing runs until the handle is first awaited.
    pub fn new<F, T>(future: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Into<Arg>,
    {
        Self {
            inner: future
                .map(|result: Result<T>| result.map(Into::<Arg>::into))
                .boxed()
                .shared(),
        }
    }

    /// A handle that is already resolved.
    pub fn ready(value: impl Into<Arg>) -> Self {
        let arg = value.into();
        Self::new(async move { Ok::<_, Error>(arg) })
    }

    /// A handle that already failed.
    pub fn failed(error: Error) -> Self {
        Self::new(async move { Err::<Arg, _>(error) })
    }

    /// Waits for the produced argument without resolving what is inside it.
    pub async fn arg(&self) -> Result<Arg> {
        self.inner.clone().await
    }

    /// Waits for the produced argument and resolves it completely.
    pub async fn value(&self) -> Result<Value> {
        resolve(Arg::Pending(self.clone())).await
    }

    /// Projects a single field of the produced mapping.
    ///
    /// A missing field, or a value that is not a mapping, yields `Null`.
    pub fn get(&self, field: impl Into<String>) -> Deferred {
        let source = self.clone();
        let field = field.into();
        Deferred::new(async move {
            let value = source.value().await?;
            Ok::<_, Error>(
                value
                    .as_map()
                    .and_then(|map| map.get(&field))
                    .cloned()
                    .unwrap_or(Value::Null),
            )
        })
    }

    /// A task that starts only once every predecessor has completed.
    ///
    /// The first predecessor failure is propagated and `task` is never
    /// started. Predecessor results are discarded.
    pub fn after<I, F, Fut, T>(predecessors: I, task: F) -> Deferred
    where
        I: IntoIterator<Item = Deferred>,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
        T: Into<Arg>,
    {
        let predecessors: Vec<Deferred> = predecessors.into_iter().collect();
        Deferred::new(async move {
            try_join_all(predecessors.iter().map(Deferred::arg)).await?;
            task().await
        })
    }

    /// Fans in several handles into one sequence, failing on the first error.
    pub fn all(deferreds: impl IntoIterator<Item = Deferred>) -> Deferred {
        let deferreds: Vec<Deferred> = deferreds.into_iter().collect();
        Deferred::new(async move {
            let values = try_join_all(deferreds.iter().map(Deferred::value)).await?;
            Ok::<_, Error>(Value::List(values))
        })
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("resolved", &self.inner.peek().is_some())
            .finish()
    }
}

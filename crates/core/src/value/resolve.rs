use futures_util::future::{try_join_all, BoxFuture, FutureExt};

use crate::error::Result;

use super::{Arg, Map, Value};

/// Resolves every deferred leaf of an argument.
///
/// Scalars come back unchanged. Sequences and mappings are resolved
/// member-wise, concurrently, and reassembled with the same shape and key
/// order. A pending value is awaited and whatever it produces is resolved in
/// turn. The first failure anywhere aborts the whole resolution.
///
/// Cyclic arguments never complete.
pub fn resolve(arg: Arg) -> BoxFuture<'static, Result<Value>> {
    async move {
        match arg {
            Arg::Scalar(value) => Ok(value),
            Arg::Sequence(items) => {
                let values = try_join_all(items.into_iter().map(resolve)).await?;
                Ok(Value::List(values))
            }
            Arg::Mapping(entries) => {
                let (keys, args): (Vec<String>, Vec<Arg>) = entries.into_iter().unzip();
                let values = try_join_all(args.into_iter().map(resolve)).await?;
                Ok(Value::Map(keys.into_iter().zip(values).collect::<Map>()))
            }
            Arg::Pending(deferred) => {
                let produced = deferred.arg().await?;
                resolve(produced).await
            }
        }
    }
    .boxed()
}

//! Bounded concurrent registry lookups

use crate::core::traits::{RegistryClient, RegistryQueryResult};
use futures::future::join_all;
use tokio::sync::Semaphore;

/// Query every name with at most `max_concurrency` lookups in flight
///
/// Results come back in the order of `names`. Dropping the returned future
/// drops every outstanding lookup.
pub async fn query_all(
    registry: &dyn RegistryClient,
    names: &[String],
    max_concurrency: usize,
) -> Vec<RegistryQueryResult> {
    let semaphore = Semaphore::new(max_concurrency.max(1));

    join_all(names.iter().map(|name| {
        let semaphore = &semaphore;
        async move {
            // The semaphore is never closed
            let _permit = semaphore.acquire().await.ok();
            registry.query(name).await
        }
    }))
    .await
}

//! Boundary to the external flag source.
//!
//! The cache never talks to a backend directly; it queries whatever
//! [`FlagLookup`] implementation it was constructed with. The source can be
//! arbitrarily slow and is allowed to fail.

use std::collections::HashMap;
use std::future::Future;

use async_trait::async_trait;

/// Mapping from flag name to its boolean value.
pub type FlagMap = HashMap<String, bool>;

/// Resolves current values for a set of flag names.
///
/// The result may cover a subset of `names` (missing flags keep their cached
/// value) or a superset (extra flags are added to the cache).
#[async_trait]
pub trait FlagLookup: Send + Sync {
    async fn lookup(&self, names: Vec<String>) -> anyhow::Result<FlagMap>;
}

/// Lets plain async closures act as a lookup source.
#[async_trait]
impl<F, Fut> FlagLookup for F
where
    F: Fn(Vec<String>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<FlagMap>> + Send,
{
    async fn lookup(&self, names: Vec<String>) -> anyhow::Result<FlagMap> {
        (self)(names).await
    }
}

//! Concurrent collection of reserved address ranges
//!
//! The fleet's claimed ranges live in four independent places: legacy
//! tenant objects, cluster objects, node-pool objects and the provider's
//! live subnet inventory. The collector fans out one task per source,
//! merges everything into a shared accumulator and canonicalizes the
//! result. A failing source fails the whole collection: allocating against
//! a partial picture risks handing out someone else's range.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nimbus_common::{Error, Result};
use tracing::{debug, instrument};

use super::cidr::{Cidr, RangeSet};

/// One place reserved address ranges can be recorded
#[async_trait]
pub trait ReservedRangeSource: Send + Sync {
    /// Source name for logging
    fn name(&self) -> &'static str;

    /// All ranges this source knows to be claimed
    async fn collect(&self) -> Result<Vec<Cidr>>;
}

/// Gathers reserved ranges from all configured sources
pub struct Collector {
    sources: Vec<Arc<dyn ReservedRangeSource>>,
}

impl Collector {
    /// Create a collector over the given sources
    pub fn new(sources: Vec<Arc<dyn ReservedRangeSource>>) -> Self {
        Self { sources }
    }

    /// Collect from every source in parallel and canonicalize.
    ///
    /// All tasks are always joined; on failure the first error (in source
    /// order) is surfaced and the partial accumulator is discarded.
    #[instrument(skip(self))]
    pub async fn collect(&self) -> Result<RangeSet> {
        let accumulator = Arc::new(Mutex::new(Vec::<Cidr>::new()));

        let handles: Vec<_> = self
            .sources
            .iter()
            .map(|source| {
                let source = Arc::clone(source);
                let accumulator = Arc::clone(&accumulator);
                tokio::spawn(async move {
                    let ranges = source.collect().await?;
                    debug!(source = source.name(), count = ranges.len(), "collected ranges");
                    // Lock held only for the append.
                    accumulator
                        .lock()
                        .expect("range accumulator poisoned")
                        .extend(ranges);
                    Ok::<(), Error>(())
                })
            })
            .collect();

        let mut first_error = None;
        for (handle, source) in futures::future::join_all(handles)
            .await
            .into_iter()
            .zip(&self.sources)
        {
            let result = handle.unwrap_or_else(|join_err| {
                Err(Error::execution_failed(
                    "collect_reserved_ranges",
                    format!("source {} task panicked: {join_err}", source.name()),
                ))
            });
            if let Err(e) = result {
                first_error.get_or_insert(e);
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let ranges = std::mem::take(
            &mut *accumulator
                .lock()
                .expect("range accumulator poisoned"),
        );
        Ok(RangeSet::new(ranges))
    }
}

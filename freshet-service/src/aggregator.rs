//! The per-backend-stream fan-out hub.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use freshet_core::{BoxStream, Event, EventSink};
use freshet_storage::BackendStream;

use crate::error::{ErrorList, ServiceError, ServiceResult};

/// How an [`Aggregator`] delivers one event to its subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// In subscriber order, one at a time.
    Sync,
    /// One scoped thread per subscriber, joined before returning.
    /// Events still reach every subscriber in publish order because the
    /// aggregator lock serializes whole deliveries.
    Async,
}

// Adapts the persistent stream to the subscriber interface so it can sit
// first in the subscriber list.
struct StoreSink(Arc<dyn BackendStream>);

impl EventSink for StoreSink {
    fn add(&self, evt: Event) -> freshet_core::Result<()> {
        self.0.add(evt).map_err(Into::into)
    }

    fn close(&self) -> freshet_core::Result<()> {
        self.0.close().map_err(Into::into)
    }
}

/// Fans every appended event out to the persistent backend stream and
/// every live subscriber.
///
/// The persistent stream is always the first subscriber, so each event
/// is stored at the index subscribe-time resolution computes for it.
/// One aggregator exists per (service backend, backend-stream name);
/// the owning registry reference-counts it across pipelines and
/// subscribers.
pub struct Aggregator {
    backend_name: String,
    stream_name: String,
    store: Arc<dyn BackendStream>,
    mode: DeliveryMode,
    subs: Mutex<Vec<Arc<dyn EventSink>>>,
}

impl Aggregator {
    pub(crate) fn new(
        backend_name: String,
        stream_name: String,
        store: Arc<dyn BackendStream>,
        mode: DeliveryMode,
    ) -> Self {
        let first: Arc<dyn EventSink> = Arc::new(StoreSink(Arc::clone(&store)));
        Self { backend_name, stream_name, store, mode, subs: Mutex::new(vec![first]) }
    }

    /// Name of the backend stream this hub persists into.
    #[must_use]
    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Registers a subscriber and resolves its history interval.
    ///
    /// The interval is resolved and the subscriber appended under one
    /// lock, so `abs_to` is exactly the first index the subscriber will
    /// receive live; the caller replays `[abs_from, abs_to)` from
    /// storage. A range error registers nothing.
    ///
    /// # Errors
    ///
    /// Range violations and storage failures.
    pub fn add_sub(
        &self,
        sub: Arc<dyn EventSink>,
        hist_from: i64,
        hist_to: i64,
    ) -> ServiceResult<(u64, u64)> {
        let mut subs = self.subs.lock();
        let range = self.store.interval(hist_from, hist_to)?;
        subs.push(sub);
        Ok(range)
    }

    /// Removes a subscriber by handle identity.
    ///
    /// Returns whether it was subscribed.
    pub fn rm_sub(&self, sub: &Arc<dyn EventSink>) -> bool {
        let mut subs = self.subs.lock();
        match subs.iter().position(|s| Arc::ptr_eq(s, sub)) {
            Some(index) => {
                subs.remove(index);
                true
            }
            None => false,
        }
    }

    /// Delivers one event to every current subscriber.
    ///
    /// Individual failures never stop delivery to the others: every
    /// subscriber sees the event, and the failures come back aggregated.
    /// A persistence failure is reported the same way: the live tail
    /// still gets the event, history loses that index.
    ///
    /// # Errors
    ///
    /// The aggregated per-subscriber failures, if any.
    pub fn add(&self, evt: Event) -> ServiceResult<()> {
        let subs = self.subs.lock();
        let results: Vec<freshet_core::Result<()>> = match self.mode {
            DeliveryMode::Sync => {
                subs.iter().map(|sink| sink.add(evt.clone())).collect()
            }
            DeliveryMode::Async => std::thread::scope(|scope| {
                let handles: Vec<_> = subs
                    .iter()
                    .map(|sink| {
                        let evt = evt.clone();
                        scope.spawn(move || sink.add(evt))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| {
                            Err(freshet_core::Error::Sink("subscriber panicked".into()))
                        })
                    })
                    .collect()
            }),
        };

        let mut errs = ErrorList::new();
        for (index, result) in results.into_iter().enumerate() {
            if let Err(err) = result {
                warn!(
                    backend = %self.backend_name,
                    stream = %self.stream_name,
                    subscriber = index,
                    error = %err,
                    "delivery failed"
                );
                errs.push_err(ServiceError::Stream(err));
            }
        }
        errs.into_result()
    }

    /// Reads `[from, to)` from the persistent stream.
    ///
    /// # Errors
    ///
    /// Range violations and storage failures.
    pub fn read(&self, from: u64, to: u64) -> ServiceResult<BoxStream> {
        Ok(self.store.read(from, to)?)
    }

    /// Deletes `[from, to)` from the persistent stream.
    ///
    /// # Errors
    ///
    /// Range violations and storage failures.
    pub fn del(&self, from: u64, to: u64) -> ServiceResult<bool> {
        Ok(self.store.del(from, to)?)
    }

    /// Length of the persistent stream.
    ///
    /// # Errors
    ///
    /// Storage failures.
    pub fn len(&self) -> ServiceResult<u64> {
        Ok(self.store.len()?)
    }

    /// Resolves a possibly-relative interval against the persistent
    /// stream's length.
    ///
    /// # Errors
    ///
    /// Range violations and storage failures.
    pub fn interval(&self, from: i64, to: i64) -> ServiceResult<(u64, u64)> {
        Ok(self.store.interval(from, to)?)
    }

    pub(crate) fn close(&self) -> ServiceResult<()> {
        Ok(self.store.close()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freshet_storage::mem::MemBackend;
    use freshet_storage::Backend;

    #[derive(Default)]
    struct Collect {
        seen: Mutex<Vec<Event>>,
    }

    impl EventSink for Collect {
        fn add(&self, evt: Event) -> freshet_core::Result<()> {
            self.seen.lock().push(evt);
            Ok(())
        }

        fn close(&self) -> freshet_core::Result<()> {
            Ok(())
        }
    }

    struct Reject;

    impl EventSink for Reject {
        fn add(&self, _evt: Event) -> freshet_core::Result<()> {
            Err(freshet_core::Error::Sink("always fails".into()))
        }

        fn close(&self) -> freshet_core::Result<()> {
            Ok(())
        }
    }

    fn aggregator(mode: DeliveryMode) -> Aggregator {
        let backend = MemBackend::new();
        let store = backend.get_stream("raw").unwrap();
        Aggregator::new("b".into(), "raw".into(), store, mode)
    }

    fn n(v: f64) -> Event {
        Event::Num(v)
    }

    #[test]
    fn persists_then_delivers() {
        for mode in [DeliveryMode::Sync, DeliveryMode::Async] {
            let agg = aggregator(mode);
            let sub = Arc::new(Collect::default());
            agg.add_sub(Arc::clone(&sub) as Arc<dyn EventSink>, 0, 0).unwrap();

            agg.add(n(1.0)).unwrap();
            agg.add(n(2.0)).unwrap();

            assert_eq!(agg.len().unwrap(), 2);
            assert_eq!(*sub.seen.lock(), vec![n(1.0), n(2.0)]);
        }
    }

    #[test]
    fn one_failing_subscriber_does_not_starve_the_rest() {
        for mode in [DeliveryMode::Sync, DeliveryMode::Async] {
            let agg = aggregator(mode);
            let good = Arc::new(Collect::default());
            agg.add_sub(Arc::new(Reject) as Arc<dyn EventSink>, 0, 0).unwrap();
            agg.add_sub(Arc::clone(&good) as Arc<dyn EventSink>, 0, 0).unwrap();

            let err = agg.add(n(5.0)).unwrap_err();
            assert!(matches!(err, ServiceError::Stream(_)));

            // the good subscriber and the store both saw the event
            assert_eq!(*good.seen.lock(), vec![n(5.0)]);
            assert_eq!(agg.len().unwrap(), 1);
        }
    }

    #[test]
    fn add_sub_resolves_against_current_len() {
        let agg = aggregator(DeliveryMode::Sync);
        for i in 0..4 {
            agg.add(n(f64::from(i))).unwrap();
        }
        let sub = Arc::new(Collect::default());
        let (from, to) = agg.add_sub(Arc::clone(&sub) as Arc<dyn EventSink>, 1, -1).unwrap();
        assert_eq!((from, to), (1, 4));
    }

    #[test]
    fn range_error_registers_nothing() {
        let agg = aggregator(DeliveryMode::Sync);
        let sub = Arc::new(Collect::default());
        assert!(agg.add_sub(Arc::clone(&sub) as Arc<dyn EventSink>, 5, 9).is_err());

        agg.add(n(1.0)).unwrap();
        assert!(sub.seen.lock().is_empty());
    }

    #[test]
    fn rm_sub_matches_by_identity() {
        let agg = aggregator(DeliveryMode::Sync);
        let sub: Arc<dyn EventSink> = Arc::new(Collect::default());
        let stranger: Arc<dyn EventSink> = Arc::new(Collect::default());
        agg.add_sub(Arc::clone(&sub), 0, 0).unwrap();

        assert!(!agg.rm_sub(&stranger));
        assert!(agg.rm_sub(&sub));
        assert!(!agg.rm_sub(&sub));
    }
}

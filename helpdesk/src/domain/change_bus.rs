//! Shared per-table change bus.
//!
//! Several views watching the same table would otherwise each open their own
//! realtime channel. [`ChangeBus`] keeps one upstream subscription per table,
//! fans its events out over a `tokio::sync::broadcast` channel and applies
//! each local subscriber's filter on the way out. The upstream subscription
//! is released when the last local subscriber for its table goes away.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::ports::{ChangeFeed, ChangeFeedError};
use super::{ChangeEvent, ChangeFilter, ChangeSubscription, Table};

/// Default number of events buffered per table before slow subscribers lag.
pub const DEFAULT_TABLE_BUFFER: usize = 256;

struct TableChannel {
    generation: u64,
    sender: broadcast::Sender<ChangeEvent>,
    subscribers: usize,
    pump: JoinHandle<()>,
}

#[derive(Default)]
struct Registry {
    tables: Mutex<HashMap<Table, TableChannel>>,
    generations: AtomicU64,
}

/// Receiver on one table channel plus the generation it belongs to.
struct Joined {
    receiver: broadcast::Receiver<ChangeEvent>,
    generation: u64,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<Table, TableChannel>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed)
    }

    fn join(&self, table: Table) -> Option<Joined> {
        let mut tables = self.lock();
        let channel = tables.get_mut(&table)?;
        channel.subscribers += 1;
        Some(Joined {
            receiver: channel.sender.subscribe(),
            generation: channel.generation,
        })
    }

    fn leave(&self, table: Table, generation: u64) {
        let mut tables = self.lock();
        let Some(channel) = tables.get_mut(&table) else {
            return;
        };
        if channel.generation != generation {
            return;
        }
        channel.subscribers = channel.subscribers.saturating_sub(1);
        if channel.subscribers == 0 {
            if let Some(channel) = tables.remove(&table) {
                channel.pump.abort();
                debug!(%table, "released upstream change subscription");
            }
        }
    }

    /// Drop the channel of an upstream that has closed. Its sender goes with
    /// it, so every local subscriber sees the end of the stream.
    fn close(&self, table: Table, generation: u64) {
        let mut tables = self.lock();
        if tables
            .get(&table)
            .is_some_and(|channel| channel.generation == generation)
        {
            tables.remove(&table);
        }
    }
}

/// [`ChangeFeed`] that multiplexes local subscribers over one upstream
/// subscription per table.
pub struct ChangeBus<F> {
    upstream: Arc<F>,
    registry: Arc<Registry>,
    buffer: usize,
}

impl<F> ChangeBus<F> {
    /// Bus with no open channels; `upstream` is opened per table on demand.
    pub fn new(upstream: Arc<F>) -> Self {
        Self::with_buffer(upstream, DEFAULT_TABLE_BUFFER)
    }

    /// Bus with a custom per-table buffer. A zero buffer is raised to one.
    pub fn with_buffer(upstream: Arc<F>, buffer: usize) -> Self {
        Self {
            upstream,
            registry: Arc::new(Registry::default()),
            buffer: buffer.max(1),
        }
    }

    /// Local subscribers currently attached to `table`.
    pub fn subscriber_count(&self, table: Table) -> usize {
        self.registry
            .lock()
            .get(&table)
            .map_or(0, |channel| channel.subscribers)
    }
}

impl<F> ChangeBus<F>
where
    F: ChangeFeed + 'static,
{
    async fn receiver_for(&self, table: Table) -> Result<Joined, ChangeFeedError> {
        if let Some(joined) = self.registry.join(table) {
            return Ok(joined);
        }

        let mut upstream = self.upstream.watch(ChangeFilter::table(table)).await?;
        debug!(%table, "opened upstream change subscription");

        let mut tables = self.registry.lock();
        if let Some(channel) = tables.get_mut(&table) {
            // Another subscriber opened the table while we were connecting.
            channel.subscribers += 1;
            upstream.unsubscribe();
            return Ok(Joined {
                receiver: channel.sender.subscribe(),
                generation: channel.generation,
            });
        }

        let generation = self.registry.next_generation();
        let (sender, receiver) = broadcast::channel(self.buffer);
        let fan_out = sender.clone();
        let registry = Arc::clone(&self.registry);
        let pump = tokio::spawn(async move {
            while let Some(event) = upstream.next().await {
                // No receivers just means every subscriber is between events.
                let _delivered = fan_out.send(event);
            }
            debug!(%table, "upstream change subscription closed");
            registry.close(table, generation);
        });
        tables.insert(
            table,
            TableChannel {
                generation,
                sender,
                subscribers: 1,
                pump,
            },
        );
        Ok(Joined {
            receiver,
            generation,
        })
    }
}

#[async_trait]
impl<F> ChangeFeed for ChangeBus<F>
where
    F: ChangeFeed + 'static,
{
    async fn watch(&self, filter: ChangeFilter) -> Result<ChangeSubscription, ChangeFeedError> {
        let table = filter.watched_table();
        let Joined {
            mut receiver,
            generation,
        } = self.receiver_for(table).await?;

        let registry = Arc::clone(&self.registry);
        let (events, subscription) =
            ChangeSubscription::channel(move || registry.leave(table, generation));

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = events.closed() => break,
                    received = receiver.recv() => match received {
                        Ok(event) => {
                            if filter.matches(&event) && events.send(event).is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(%table, skipped, "change subscriber lagged; events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });

        Ok(subscription)
    }
}

use std::cmp::Reverse;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{RwLock, mpsc, oneshot};
use ulid::Ulid;

use crate::model::{BookStatus, Booking, Event, Item, Span};
use crate::observability;
use crate::wal::Wal;

use super::{BookingQuery, BookingStore, ItemCatalog, Page, StoreError, TimeOrder, UserDirectory};

pub type SharedBooking = Arc<RwLock<Booking>>;

// ── Group-commit WAL channel ─────────────────────────────

struct WalAppend {
    event: Event,
    response: oneshot::Sender<io::Result<()>>,
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalAppend>) {
    while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
            batch.push(next);
        }

        metrics::histogram!(observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
        let flush_start = std::time::Instant::now();
        let result = flush_batch(&mut wal, &batch);
        metrics::histogram!(observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());

        for entry in batch {
            let r = match &result {
                Ok(()) => Ok(()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            };
            let _ = entry.response.send(r);
        }
    }
    tracing::info!("wal writer: channel closed, shutting down");
}

fn flush_batch(wal: &mut Wal, batch: &[WalAppend]) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for entry in batch {
        if let Err(e) = wal.append_buffered(&entry.event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

/// In-memory booking store backed by a write-ahead log.
///
/// Rows live in a DashMap keyed by booking id; each row carries its own
/// RwLock, and `update_status` holds that write lock across
/// check + persist + apply. That lock is the whole concurrency story:
/// two finalizations of one booking cannot interleave.
pub struct MemoryBookingStore {
    bookings: DashMap<Ulid, SharedBooking>,
    wal_tx: mpsc::Sender<WalAppend>,
}

impl MemoryBookingStore {
    /// Open the store, replaying any WAL at `path` before the writer task
    /// starts accepting appends. Must be called within a tokio runtime.
    pub fn open(path: &Path) -> io::Result<Self> {
        let events = Wal::replay(path)?;
        let wal = Wal::open(path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let store = Self {
            bookings: DashMap::new(),
            wal_tx,
        };

        // Replay — we're the sole owner of these Arcs, so try_write always
        // succeeds instantly (no contention). Never block here: open may run
        // inside an async context.
        let replayed = events.len();
        for event in events {
            match event {
                Event::BookingCreated {
                    id,
                    booker,
                    item,
                    item_owner,
                    span,
                } => {
                    let b = Booking {
                        id,
                        status: BookStatus::Waiting,
                        booker,
                        item,
                        item_owner,
                        span,
                    };
                    store.bookings.insert(id, Arc::new(RwLock::new(b)));
                }
                Event::BookingDecided { id, status } => {
                    if let Some(entry) = store.bookings.get(&id) {
                        let row = entry.value().clone();
                        let mut guard = row.try_write().expect("replay: uncontended write");
                        guard.status = status;
                    }
                }
            }
        }
        metrics::gauge!(observability::STORE_BOOKINGS).set(store.bookings.len() as f64);
        tracing::info!(
            path = %path.display(),
            events = replayed,
            bookings = store.bookings.len(),
            "booking store opened"
        );

        Ok(store)
    }

    /// Write an event to the WAL via the background group-commit writer.
    async fn persist(&self, event: Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalAppend {
                event,
                response: tx,
            })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    fn row(&self, id: &Ulid) -> Option<SharedBooking> {
        self.bookings.get(id).map(|e| e.value().clone())
    }

    /// Snapshot every row matching the query. Arc clones are collected
    /// first so no DashMap shard guard is held across an await.
    async fn collect(&self, query: &BookingQuery) -> Vec<Booking> {
        // Point lookups skip the scan.
        if let Some(id) = query.id {
            let Some(row) = self.row(&id) else {
                return Vec::new();
            };
            let guard = row.read().await;
            return if query.matches(&guard) {
                vec![guard.clone()]
            } else {
                Vec::new()
            };
        }

        let rows: Vec<SharedBooking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        let mut matched = Vec::new();
        for row in rows {
            let guard = row.read().await;
            if query.matches(&guard) {
                matched.push(guard.clone());
            }
        }
        matched
    }
}

#[async_trait]
impl BookingStore for MemoryBookingStore {
    async fn insert(&self, booker: Ulid, item: &Item, span: Span) -> Result<Booking, StoreError> {
        let id = Ulid::new();
        let booking = Booking {
            id,
            status: BookStatus::Waiting,
            booker,
            item: item.id,
            item_owner: item.owner,
            span,
        };
        self.persist(Event::BookingCreated {
            id,
            booker,
            item: item.id,
            item_owner: item.owner,
            span,
        })
        .await?;
        self.bookings.insert(id, Arc::new(RwLock::new(booking.clone())));
        metrics::gauge!(observability::STORE_BOOKINGS).increment(1.0);
        Ok(booking)
    }

    async fn update_status(
        &self,
        id: Ulid,
        prior: BookStatus,
        next: BookStatus,
    ) -> Result<Booking, StoreError> {
        let row = self.row(&id).ok_or(StoreError::NotFound(id))?;
        // The concurrent loser blocks on this guard, then sees the winner's
        // status and fails the compare.
        let mut guard = row.write().await;
        if guard.status != prior {
            return Err(StoreError::StatusConflict { have: guard.status });
        }
        self.persist(Event::BookingDecided { id, status: next }).await?;
        guard.status = next;
        Ok(guard.clone())
    }

    async fn find_one(&self, query: &BookingQuery) -> Result<Option<Booking>, StoreError> {
        Ok(self.collect(query).await.into_iter().next())
    }

    async fn find_top_by_time(
        &self,
        query: &BookingQuery,
        order: TimeOrder,
    ) -> Result<Option<Booking>, StoreError> {
        let matched = self.collect(query).await;
        // Composite keys keep ties on `start` deterministic: the smallest id
        // wins under both orders.
        Ok(match order {
            TimeOrder::LatestStart => matched
                .into_iter()
                .max_by_key(|b| (b.span.start, Reverse(b.id))),
            TimeOrder::EarliestStart => matched.into_iter().min_by_key(|b| (b.span.start, b.id)),
        })
    }

    async fn find_all_by_end_desc(
        &self,
        query: &BookingQuery,
        page: Page,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut matched = self.collect(query).await;
        matched.sort_by(|a, b| b.span.end.cmp(&a.span.end).then(a.id.cmp(&b.id)));
        Ok(matched
            .into_iter()
            .skip(page.from)
            .take(page.size)
            .collect())
    }
}

/// DashMap-backed user registry. Real identity management lives outside the
/// crate; this is the directory the service and its tests run against.
#[derive(Default)]
pub struct MemoryUserDirectory {
    users: DashMap<Ulid, ()>,
}

impl MemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&self) -> Ulid {
        let id = Ulid::new();
        self.users.insert(id, ());
        id
    }
}

#[async_trait]
impl UserDirectory for MemoryUserDirectory {
    async fn user_exists(&self, user: Ulid) -> Result<bool, StoreError> {
        Ok(self.users.contains_key(&user))
    }
}

/// DashMap-backed item catalog. Item CRUD lives outside the crate.
#[derive(Default)]
pub struct MemoryItemCatalog {
    items: DashMap<Ulid, Item>,
}

impl MemoryItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_item(&self, owner: Ulid, available: bool) -> Item {
        let item = Item {
            id: Ulid::new(),
            owner,
            available,
        };
        self.items.insert(item.id, item);
        item
    }

    /// Owners can delist an item; a delisted item blocks new bookings but
    /// existing ones stand.
    pub fn set_available(&self, item: Ulid, available: bool) {
        if let Some(mut entry) = self.items.get_mut(&item) {
            entry.available = available;
        }
    }
}

#[async_trait]
impl ItemCatalog for MemoryItemCatalog {
    async fn item_by_id(&self, item: Ulid) -> Result<Option<Item>, StoreError> {
        Ok(self.items.get(&item).map(|e| *e.value()))
    }

    async fn owner_has_items(&self, owner: Ulid) -> Result<bool, StoreError> {
        Ok(self.items.iter().any(|e| e.value().owner == owner))
    }
}

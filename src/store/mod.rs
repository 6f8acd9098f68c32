pub mod memory;

use async_trait::async_trait;
use ulid::Ulid;

use crate::model::{BookStatus, Booking, Item, Ms, Span, StateFilter};

#[derive(Debug)]
pub enum StoreError {
    NotFound(Ulid),
    StatusConflict { have: BookStatus },
    Wal(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(id) => write!(f, "booking not found: {id}"),
            StoreError::StatusConflict { have } => {
                write!(f, "status conflict: booking already {have:?}")
            }
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Conjunctive criteria over booking fields. Every populated field must
/// match; an empty query matches everything. This is the data-level
/// predicate the views are built from — nothing here knows how the backing
/// store executes it.
#[derive(Debug, Clone, Default)]
pub struct BookingQuery {
    pub id: Option<Ulid>,
    pub booker: Option<Ulid>,
    pub item: Option<Ulid>,
    /// Item membership set, for batch lookups across many items.
    pub items: Option<Vec<Ulid>>,
    pub item_owner: Option<Ulid>,
    /// Matches bookings where the user is the booker or the item owner.
    pub participant: Option<Ulid>,
    pub status_in: Option<Vec<BookStatus>>,
    /// State partition evaluated against the `now` captured by the caller,
    /// so one result set is internally consistent.
    pub state: Option<(StateFilter, Ms)>,
    /// `start` strictly before this instant.
    pub starts_before: Option<Ms>,
    /// `start` strictly after this instant.
    pub starts_after: Option<Ms>,
    /// `end` strictly before this instant.
    pub ends_before: Option<Ms>,
}

impl BookingQuery {
    pub fn matches(&self, b: &Booking) -> bool {
        if let Some(id) = self.id
            && b.id != id {
                return false;
            }
        if let Some(booker) = self.booker
            && b.booker != booker {
                return false;
            }
        if let Some(item) = self.item
            && b.item != item {
                return false;
            }
        if let Some(ref items) = self.items
            && !items.contains(&b.item) {
                return false;
            }
        if let Some(owner) = self.item_owner
            && b.item_owner != owner {
                return false;
            }
        if let Some(user) = self.participant
            && b.booker != user
            && b.item_owner != user {
                return false;
            }
        if let Some(ref statuses) = self.status_in
            && !statuses.contains(&b.status) {
                return false;
            }
        if let Some((filter, now)) = self.state
            && !filter.matches(b, now) {
                return false;
            }
        if let Some(t) = self.starts_before
            && b.span.start >= t {
                return false;
            }
        if let Some(t) = self.starts_after
            && b.span.start <= t {
                return false;
            }
        if let Some(t) = self.ends_before
            && b.span.end >= t {
                return false;
            }
        true
    }
}

/// Which single row a top-1 time lookup selects. Ties on `start` break by
/// ascending id so the pick is deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOrder {
    /// Greatest `start` wins (most recent).
    LatestStart,
    /// Smallest `start` wins (soonest).
    EarliestStart,
}

/// Zero-based offset + row cap for list queries.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub from: usize,
    pub size: usize,
}

impl Page {
    pub fn new(from: usize, size: usize) -> Self {
        Self { from, size }
    }

    /// Everything, no windowing. Used by batch-internal lookups.
    pub fn unbounded() -> Self {
        Self {
            from: 0,
            size: usize::MAX,
        }
    }
}

impl Default for Page {
    /// The upstream API layer's defaults: first page, 20 rows.
    fn default() -> Self {
        Self { from: 0, size: 20 }
    }
}

/// Booking persistence contract.
///
/// Implementations must serialize `update_status` per booking row so that
/// concurrent finalization has exactly one winner.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persist a new booking. The store mints the id; status always starts
    /// `Waiting`.
    async fn insert(&self, booker: Ulid, item: &Item, span: Span) -> Result<Booking, StoreError>;

    /// Compare-and-set the status: succeeds only if the current status is
    /// exactly `prior`, otherwise `StatusConflict` with the status actually
    /// found. Returns the updated booking.
    async fn update_status(
        &self,
        id: Ulid,
        prior: BookStatus,
        next: BookStatus,
    ) -> Result<Booking, StoreError>;

    /// Some booking matching the query, if any.
    async fn find_one(&self, query: &BookingQuery) -> Result<Option<Booking>, StoreError>;

    /// The single booking selected by `order` among those matching the query.
    async fn find_top_by_time(
        &self,
        query: &BookingQuery,
        order: TimeOrder,
    ) -> Result<Option<Booking>, StoreError>;

    /// All bookings matching the query, ordered by `end` descending (id
    /// ascending on ties), windowed by `page`.
    async fn find_all_by_end_desc(
        &self,
        query: &BookingQuery,
        page: Page,
    ) -> Result<Vec<Booking>, StoreError>;
}

/// User existence lookup. Identity CRUD lives outside this crate.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn user_exists(&self, user: Ulid) -> Result<bool, StoreError>;
}

/// Item catalog lookups. Item CRUD lives outside this crate.
#[async_trait]
pub trait ItemCatalog: Send + Sync {
    async fn item_by_id(&self, item: Ulid) -> Result<Option<Item>, StoreError>;

    /// Whether the user has listed at least one item.
    async fn owner_has_items(&self, owner: Ulid) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    const H: Ms = 3_600_000;

    fn booking(booker: Ulid, item: Ulid, owner: Ulid, status: BookStatus, start: Ms, end: Ms) -> Booking {
        Booking {
            id: Ulid::new(),
            status,
            booker,
            item,
            item_owner: owner,
            span: Span::new(start, end),
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        let b = booking(Ulid::new(), Ulid::new(), Ulid::new(), BookStatus::Waiting, H, 2 * H);
        assert!(BookingQuery::default().matches(&b));
    }

    #[test]
    fn criteria_are_conjunctive() {
        let booker = Ulid::new();
        let item = Ulid::new();
        let owner = Ulid::new();
        let b = booking(booker, item, owner, BookStatus::Waiting, H, 2 * H);

        let q = BookingQuery {
            booker: Some(booker),
            item_owner: Some(owner),
            ..Default::default()
        };
        assert!(q.matches(&b));

        let q = BookingQuery {
            booker: Some(booker),
            item_owner: Some(Ulid::new()),
            ..Default::default()
        };
        assert!(!q.matches(&b));
    }

    #[test]
    fn participant_matches_booker_or_owner() {
        let booker = Ulid::new();
        let owner = Ulid::new();
        let b = booking(booker, Ulid::new(), owner, BookStatus::Waiting, H, 2 * H);

        for user in [booker, owner] {
            let q = BookingQuery {
                participant: Some(user),
                ..Default::default()
            };
            assert!(q.matches(&b));
        }

        let q = BookingQuery {
            participant: Some(Ulid::new()),
            ..Default::default()
        };
        assert!(!q.matches(&b));
    }

    #[test]
    fn status_set_membership() {
        let b = booking(Ulid::new(), Ulid::new(), Ulid::new(), BookStatus::Waiting, H, 2 * H);

        let q = BookingQuery {
            status_in: Some(vec![BookStatus::Approved, BookStatus::Waiting]),
            ..Default::default()
        };
        assert!(q.matches(&b));

        let q = BookingQuery {
            status_in: Some(vec![BookStatus::Approved]),
            ..Default::default()
        };
        assert!(!q.matches(&b));
    }

    #[test]
    fn item_membership_set() {
        let item = Ulid::new();
        let b = booking(Ulid::new(), item, Ulid::new(), BookStatus::Waiting, H, 2 * H);

        let q = BookingQuery {
            items: Some(vec![Ulid::new(), item]),
            ..Default::default()
        };
        assert!(q.matches(&b));

        let q = BookingQuery {
            items: Some(vec![Ulid::new()]),
            ..Default::default()
        };
        assert!(!q.matches(&b));
    }

    #[test]
    fn time_bounds_are_strict() {
        let b = booking(Ulid::new(), Ulid::new(), Ulid::new(), BookStatus::Waiting, H, 2 * H);

        // start == bound fails both strict comparisons
        let q = BookingQuery {
            starts_before: Some(H),
            ..Default::default()
        };
        assert!(!q.matches(&b));
        let q = BookingQuery {
            starts_after: Some(H),
            ..Default::default()
        };
        assert!(!q.matches(&b));

        let q = BookingQuery {
            starts_before: Some(H + 1),
            ..Default::default()
        };
        assert!(q.matches(&b));
        let q = BookingQuery {
            starts_after: Some(H - 1),
            ..Default::default()
        };
        assert!(q.matches(&b));

        // end == bound is not "before"
        let q = BookingQuery {
            ends_before: Some(2 * H),
            ..Default::default()
        };
        assert!(!q.matches(&b));
        let q = BookingQuery {
            ends_before: Some(2 * H + 1),
            ..Default::default()
        };
        assert!(q.matches(&b));
    }

    #[test]
    fn state_criterion_uses_captured_now() {
        let now = 100 * H;
        let past = booking(Ulid::new(), Ulid::new(), Ulid::new(), BookStatus::Approved, now - 2 * H, now - H);

        let q = BookingQuery {
            state: Some((StateFilter::Past, now)),
            ..Default::default()
        };
        assert!(q.matches(&past));

        let q = BookingQuery {
            state: Some((StateFilter::Future, now)),
            ..Default::default()
        };
        assert!(!q.matches(&past));

        let q = BookingQuery {
            state: Some((StateFilter::Unsupported, now)),
            ..Default::default()
        };
        assert!(!q.matches(&past));
    }
}

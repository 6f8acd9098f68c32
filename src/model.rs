use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds — the only time type.
pub type Ms = i64;

/// A booking window. Endpoints are inclusive as far as the time filters are
/// concerned; `start < end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: Ms,
    pub end: Ms,
}

impl Span {
    pub fn new(start: Ms, end: Ms) -> Self {
        debug_assert!(start < end, "Span start must be before end");
        Self { start, end }
    }
}

/// Booking lifecycle state. `Waiting` is the only initial value;
/// `Approved` and `Rejected` are terminal — no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookStatus {
    Waiting,
    Approved,
    Rejected,
}

/// Named partitions of the booking space, evaluated against a reference `now`.
///
/// `Unsupported` is the sentinel for unparseable filter input: it never
/// matches any booking, and callers must reject it explicitly instead of
/// querying with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateFilter {
    All,
    Current,
    Past,
    Future,
    Waiting,
    Rejected,
    Unsupported,
}

impl StateFilter {
    /// Map a case-insensitive name to a filter. Unknown or blank input maps
    /// to `Unsupported` rather than failing. No trimming: padded names are
    /// unparseable input like any other.
    pub fn resolve(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "ALL" => StateFilter::All,
            "CURRENT" => StateFilter::Current,
            "PAST" => StateFilter::Past,
            "FUTURE" => StateFilter::Future,
            "WAITING" => StateFilter::Waiting,
            "REJECTED" => StateFilter::Rejected,
            _ => StateFilter::Unsupported,
        }
    }

    /// Pure predicate over a booking. Time filters compare against the `now`
    /// captured once by the enclosing query, so one result set is internally
    /// consistent even if the wall clock moves while it is being built.
    pub fn matches(&self, booking: &Booking, now: Ms) -> bool {
        match self {
            StateFilter::All => true,
            StateFilter::Current => booking.span.start <= now && booking.span.end >= now,
            StateFilter::Past => booking.span.end < now,
            StateFilter::Future => booking.span.start > now,
            StateFilter::Waiting => booking.status == BookStatus::Waiting,
            StateFilter::Rejected => booking.status == BookStatus::Rejected,
            StateFilter::Unsupported => false,
        }
    }
}

/// A persisted booking.
///
/// Equality is by `id` alone: two bookings with the same id are the same
/// entity regardless of mutated fields.
#[derive(Debug, Clone)]
pub struct Booking {
    pub id: Ulid,
    pub status: BookStatus,
    /// The requesting user. Set at creation, never mutated.
    pub booker: Ulid,
    pub item: Ulid,
    /// Owner of the booked item, denormalized from the catalog snapshot at
    /// creation time so authorization checks need no item lookup.
    pub item_owner: Ulid,
    pub span: Span,
}

impl PartialEq for Booking {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Booking {}

/// Catalog view of an item: just enough to validate a booking request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Item {
    pub id: Ulid,
    pub owner: Ulid,
    pub available: bool,
}

/// An incoming booking request before validation. `start`/`end` are optional
/// because the upstream payload may omit them; validation rejects the gaps.
#[derive(Debug, Clone, Copy)]
pub struct NewBooking {
    pub booker: Ulid,
    pub item: Ulid,
    pub start: Option<Ms>,
    pub end: Option<Ms>,
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    BookingCreated {
        id: Ulid,
        booker: Ulid,
        item: Ulid,
        item_owner: Ulid,
        span: Span,
    },
    BookingDecided {
        id: Ulid,
        status: BookStatus,
    },
}

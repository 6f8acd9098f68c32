//! Last/next booking lookup used to annotate an item with its booking
//! history relative to "now".

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;

use ulid::Ulid;

use crate::model::{BookStatus, Booking, Ms};
use crate::store::{BookingQuery, BookingStore, Page, StoreError, TimeOrder};

/// An item's booking neighborhood around a reference instant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemTimeline {
    /// Most recent past approved booking: `status == Approved`,
    /// `start < now`, greatest `start`.
    pub last: Option<Booking>,
    /// Soonest upcoming booking, approved or still pending:
    /// `status in {Approved, Waiting}`, `start > now`, smallest `start`.
    pub next: Option<Booking>,
}

/// Derives last/next bookings for items; consumed by the item-detail
/// assembly outside this crate.
pub struct ItemTimelineResolver {
    bookings: Arc<dyn BookingStore>,
}

impl ItemTimelineResolver {
    pub fn new(bookings: Arc<dyn BookingStore>) -> Self {
        Self { bookings }
    }

    /// Last/next booking for one item. Both lookups run against the same
    /// caller-supplied `now` so the pair is consistent within one enclosing
    /// read.
    pub async fn resolve(&self, item: Ulid, now: Ms) -> Result<ItemTimeline, StoreError> {
        let last = self
            .bookings
            .find_top_by_time(
                &BookingQuery {
                    item: Some(item),
                    status_in: Some(vec![BookStatus::Approved]),
                    starts_before: Some(now),
                    ..Default::default()
                },
                TimeOrder::LatestStart,
            )
            .await?;
        let next = self
            .bookings
            .find_top_by_time(
                &BookingQuery {
                    item: Some(item),
                    status_in: Some(vec![BookStatus::Approved, BookStatus::Waiting]),
                    starts_after: Some(now),
                    ..Default::default()
                },
                TimeOrder::EarliestStart,
            )
            .await?;
        Ok(ItemTimeline { last, next })
    }

    /// Timelines for many items in one pass: fetch the candidate bookings
    /// once, then pick last/next per item in memory. Items with no bookings
    /// map to an empty timeline.
    pub async fn resolve_many(
        &self,
        items: &[Ulid],
        now: Ms,
    ) -> Result<HashMap<Ulid, ItemTimeline>, StoreError> {
        let candidates = self
            .bookings
            .find_all_by_end_desc(
                &BookingQuery {
                    items: Some(items.to_vec()),
                    status_in: Some(vec![BookStatus::Approved, BookStatus::Waiting]),
                    ..Default::default()
                },
                Page::unbounded(),
            )
            .await?;

        let mut timelines: HashMap<Ulid, ItemTimeline> = items
            .iter()
            .map(|id| (*id, ItemTimeline::default()))
            .collect();
        for booking in candidates {
            if let Some(timeline) = timelines.get_mut(&booking.item) {
                fold_candidate(timeline, booking, now);
            }
        }
        Ok(timelines)
    }
}

/// Fold one candidate into a timeline under the same selection and
/// tie-break rules the single-item top-1 lookups use: ties on `start`
/// break by ascending id.
fn fold_candidate(timeline: &mut ItemTimeline, booking: Booking, now: Ms) {
    if booking.status == BookStatus::Approved && booking.span.start < now {
        let better = match &timeline.last {
            None => true,
            Some(cur) => {
                (booking.span.start, Reverse(booking.id)) > (cur.span.start, Reverse(cur.id))
            }
        };
        if better {
            timeline.last = Some(booking);
        }
    } else if booking.span.start > now {
        let better = match &timeline.next {
            None => true,
            Some(cur) => (booking.span.start, booking.id) < (cur.span.start, cur.id),
        };
        if better {
            timeline.next = Some(booking);
        }
    }
}

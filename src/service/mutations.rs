use ulid::Ulid;

use crate::model::{BookStatus, Booking, NewBooking};
use crate::observability;
use crate::store::{BookingQuery, StoreError};

use super::validate::{now_ms, validate_window};
use super::{BookingService, ServiceError};

impl BookingService {
    /// Validate and persist a new booking request. The stored entity comes
    /// back with its id assigned and status `Waiting`.
    pub async fn create_booking_request(&self, req: NewBooking) -> Result<Booking, ServiceError> {
        let span = validate_window(&req, now_ms())?;

        self.require_user(req.booker).await?;
        let item = self
            .items
            .item_by_id(req.item)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("item not found: {}", req.item)))?;
        if !item.available {
            return Err(ServiceError::BadRequest(format!(
                "item not available: {}",
                item.id
            )));
        }
        // An owner booking their own item gets the same NotFound as a missing
        // item: the item is hidden from them, never "forbidden".
        if req.booker == item.owner {
            return Err(ServiceError::NotFound(format!("item not found: {}", item.id)));
        }

        let booking = self.bookings.insert(req.booker, &item, span).await?;
        metrics::counter!(observability::BOOKINGS_CREATED_TOTAL).increment(1);
        Ok(booking)
    }

    /// Apply the owner's decision to a waiting booking.
    ///
    /// `Waiting --approve--> Approved`, `Waiting --reject--> Rejected`;
    /// both targets are terminal and re-deciding fails as BadRequest.
    pub async fn approve_or_reject(
        &self,
        booking_id: Ulid,
        owner_id: Ulid,
        approved: bool,
    ) -> Result<Booking, ServiceError> {
        // One query authorizes and fetches: a booking on someone else's item
        // and a booking that does not exist are indistinguishable.
        let query = BookingQuery {
            id: Some(booking_id),
            item_owner: Some(owner_id),
            ..Default::default()
        };
        let booking = self
            .bookings
            .find_one(&query)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("booking not found: {booking_id}")))?;

        if booking.status != BookStatus::Waiting {
            return Err(ServiceError::BadRequest("status already finalized".into()));
        }

        let next = if approved {
            BookStatus::Approved
        } else {
            BookStatus::Rejected
        };
        let updated = match self
            .bookings
            .update_status(booking_id, BookStatus::Waiting, next)
            .await
        {
            Ok(b) => b,
            // Lost the race to a concurrent decision: same answer as having
            // read the finalized status up front.
            Err(StoreError::StatusConflict { .. }) => {
                return Err(ServiceError::BadRequest("status already finalized".into()));
            }
            Err(e) => return Err(e.into()),
        };
        metrics::counter!(
            observability::BOOKING_DECISIONS_TOTAL,
            "decision" => observability::decision_label(approved)
        )
        .increment(1);
        Ok(updated)
    }
}

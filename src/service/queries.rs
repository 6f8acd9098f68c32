use ulid::Ulid;

use crate::model::{BookStatus, Booking, Ms, StateFilter};
use crate::store::{BookingQuery, Page};

use super::validate::now_ms;
use super::{BookingService, ServiceError};

impl BookingService {
    /// Fetch one booking on behalf of a requester. Only the booker or the
    /// item owner may see it; anyone else gets the same NotFound as a
    /// missing id — one combined query, so existence never leaks.
    pub async fn get_booking_by_id(
        &self,
        booking_id: Ulid,
        requester_id: Ulid,
    ) -> Result<Booking, ServiceError> {
        self.require_user(requester_id).await?;
        let query = BookingQuery {
            id: Some(booking_id),
            participant: Some(requester_id),
            ..Default::default()
        };
        self.bookings
            .find_one(&query)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("booking not found: {booking_id}")))
    }

    /// Bookings the user requested, sliced by state, most recent window
    /// first (ordering is always by `end`, so overlapping bookings that
    /// finish later rank first regardless of when they began).
    pub async fn get_user_bookings(
        &self,
        state_name: &str,
        user_id: Ulid,
        page: Page,
    ) -> Result<Vec<Booking>, ServiceError> {
        let state = resolve_state(state_name)?;
        self.require_user(user_id).await?;
        let query = BookingQuery {
            booker: Some(user_id),
            state: Some((state, now_ms())),
            ..Default::default()
        };
        Ok(self.bookings.find_all_by_end_desc(&query, page).await?)
    }

    /// Bookings on the owner's items, sliced by state, most recent window
    /// first. An owner with zero items cannot have owner-bookings, so the
    /// view fails closed with NotFound rather than returning empty.
    pub async fn get_owner_bookings(
        &self,
        state_name: &str,
        owner_id: Ulid,
        page: Page,
    ) -> Result<Vec<Booking>, ServiceError> {
        let state = resolve_state(state_name)?;
        self.require_user(owner_id).await?;
        if !self.items.owner_has_items(owner_id).await? {
            return Err(ServiceError::NotFound(format!(
                "user has no items: {owner_id}"
            )));
        }
        let query = BookingQuery {
            item_owner: Some(owner_id),
            state: Some((state, now_ms())),
            ..Default::default()
        };
        Ok(self.bookings.find_all_by_end_desc(&query, page).await?)
    }

    /// The gate that unlocks comment rights: some approved booking of this
    /// item by this user that already ended. Absence is BadRequest — the
    /// comment module surfaces it as a rejected comment, never as a missing
    /// entity.
    pub async fn find_completed_booking(
        &self,
        booker_id: Ulid,
        item_id: Ulid,
        now: Ms,
    ) -> Result<Booking, ServiceError> {
        let query = BookingQuery {
            booker: Some(booker_id),
            item: Some(item_id),
            status_in: Some(vec![BookStatus::Approved]),
            ends_before: Some(now),
            ..Default::default()
        };
        self.bookings.find_one(&query).await?.ok_or_else(|| {
            ServiceError::BadRequest(format!(
                "no completed booking of item {item_id} by user {booker_id}"
            ))
        })
    }
}

/// Resolve a state name at the service boundary. `Unsupported` is rejected
/// here so it never reaches a query; it is never treated as `All`.
fn resolve_state(name: &str) -> Result<StateFilter, ServiceError> {
    match StateFilter::resolve(name) {
        StateFilter::Unsupported => {
            Err(ServiceError::BadRequest(format!("unknown state: {name}")))
        }
        state => Ok(state),
    }
}

mod error;
mod mutations;
mod queries;
mod validate;

pub use error::ServiceError;

use std::sync::Arc;

use ulid::Ulid;

use crate::store::{BookingStore, ItemCatalog, UserDirectory};

/// Orchestrates the booking lifecycle: creation validation, owner decisions,
/// and the temporal list views.
///
/// The service itself is stateless — all mutable state lives in the store —
/// so one instance is safe to share across concurrent callers.
pub struct BookingService {
    bookings: Arc<dyn BookingStore>,
    users: Arc<dyn UserDirectory>,
    items: Arc<dyn ItemCatalog>,
}

impl BookingService {
    pub fn new(
        bookings: Arc<dyn BookingStore>,
        users: Arc<dyn UserDirectory>,
        items: Arc<dyn ItemCatalog>,
    ) -> Self {
        Self {
            bookings,
            users,
            items,
        }
    }

    /// Existence gate shared by every operation that names a subject user.
    pub(super) async fn require_user(&self, user: Ulid) -> Result<(), ServiceError> {
        if self.users.user_exists(user).await? {
            Ok(())
        } else {
            Err(ServiceError::NotFound(format!("user not found: {user}")))
        }
    }
}

//! peerbook — booking lifecycle and temporal query engine for a
//! peer-to-peer item-rental service.
//!
//! Users list items, other users request time-bounded bookings, owners
//! approve or reject them, and completed bookings unlock comment rights.
//! This crate is the core of that system: the creation rules, the
//! WAITING → APPROVED/REJECTED state machine, and the temporal
//! partition/order/paginate queries behind the booker, owner, and
//! item-timeline views. The HTTP surface, identity CRUD, and item CRUD
//! live outside it; they reach in through [`service::BookingService`],
//! [`timeline::ItemTimelineResolver`], and the collaborator traits in
//! [`store`].

pub mod model;
pub mod observability;
pub mod service;
pub mod store;
pub mod timeline;
pub mod wal;

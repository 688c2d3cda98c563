//! Availability reconciliation for lesson bookings.
//!
//! [`Reconciler`] is the only writer of lesson `space` and order `status`.
//! Its confirming and patching operations run as single storage
//! transactions: every read that feeds a decision happens inside the same
//! transaction as the writes that follow from it, and any failure rolls the
//! whole unit back.
//!
//! Order lifecycle: `pending --confirm--> confirmed`. A failed confirmation
//! leaves the order pending; nothing leaves `confirmed`.

use storage::Storage;

mod demand;
pub mod error;
mod lessons;
mod orders;
pub mod validation;

pub use error::BookingError;
pub use validation::{parse_order_id, Cart, LessonUpdate, OrderDraft};

#[derive(Clone)]
pub struct Reconciler {
    storage: Storage,
}

impl Reconciler {
    pub fn new(storage: Storage) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

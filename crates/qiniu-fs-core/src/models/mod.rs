//! Data models for the adapter
//!
//! `object` holds what the store reports for a real object, `listing` holds the
//! filesystem-shaped entries handed to callers.

mod listing;
mod object;

pub use listing::*;
pub use object::*;

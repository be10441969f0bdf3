//! Pure data structures: the order record, its lifecycle and its errors.

pub mod error;
pub mod order;
pub mod state;

pub use error::*;
pub use order::*;
pub use state::*;

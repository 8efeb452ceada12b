//! Domain models for tenant connections and locally stored orders.

pub mod connection;
pub mod order;

pub use connection::Connection;
pub use order::{LocalOrder, StoredOrder};

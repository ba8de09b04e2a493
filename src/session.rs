//! Session storage and expiry
//!
//! One `Session` per sender, owned by the store. The sweeper evicts sessions
//! that have been idle past the configured timeout.

mod store;
mod sweeper;

pub use store::SessionStore;
pub use sweeper::SessionSweeper;

//! Session lifecycle
//!
//! Per-user conversational state with TTL expiry, shared by every
//! protocol adapter:
//!
//! - [`Session`]: cached agent instances, cross-agent results, and the
//!   bound progress handler, all under one owning lock.
//! - [`SessionStore`]: keyed collection with refresh-on-access lookup and
//!   an on-demand expiry sweep.
//! - [`spawn_sweeper`]: background task invoking the sweep on a cadence.
//!
//! Adapters obtain a session (creating one if absent), get or lazily
//! create an agent within it, and drive agent execution; the session's
//! progress handler routes incremental updates back to whichever
//! transport originated the request.

mod session;
mod store;
mod sweeper;

pub use session::{Session, StoredResult};
pub use store::SessionStore;
pub use sweeper::spawn_sweeper;

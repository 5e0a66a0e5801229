//! `coach-agent`: async collaborators around the reconciliation core.
//!
//! # Architecture
//!
//! ```text
//! Session / CollabSession   ← single-flight send, cancel, recovery re-ask
//!     │
//!     ▼
//! ChatTransport             ← POST {messages, projectState}
//!     │                       HttpTransport over reqwest
//!     ▼
//! ChatStream                ← futures::Stream<Item = Result<String>>
//!     │                       UTF-8 chunks reassembled across reads
//!     ▼
//! dt_core::apply::reconcile ← parse, sanitize, apply
//! ```
//!
//! Persistence is a collaborator: [`DebouncedSaver`] coalesces writes to a
//! [`StateSink`] for single-user mode, and [`CollabSession`] writes every
//! record through a [`Repository`] while peers follow a [`ChangeFeed`].

pub mod collab;
pub mod error;
pub mod memory;
pub mod persist;
pub mod session;
pub mod stream;
pub mod transport;
pub mod types;

pub use collab::{ChangeFeed, CollabSession, FeedEvent, Presence, Repository};
pub use error::CoachError;
pub use memory::MemoryBackend;
pub use persist::{DebouncedSaver, StateSink};
pub use session::{Outcome, Session, SkipReason, Turn};
pub use stream::ChatStream;
pub use transport::{ChatTransport, HttpTransport};
pub use types::{ChatRequest, WireMessage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, CoachError>;

// crates/client/src/lib.rs
//! Client-side delivery for ragline jobs and chat sessions.
//!
//! [`JobWatcher`] unifies push and poll delivery of job updates behind one
//! channel, [`ChatSession`] issues rate-limited generation requests and
//! records conversation turns, and [`HistoryStore`] persists them per agent.

pub mod history;
pub mod rate_limit;
pub mod reconciler;
pub mod session;
pub mod transport;

pub use history::{HistoryError, HistoryStore, Turn, TurnRole};
pub use rate_limit::RateLimiter;
pub use reconciler::{JobUpdate, JobWatcher, WatchConfig, WatchHandle};
pub use session::{ChatSession, GenerationApi, SessionError};
pub use transport::{FrameStream, HttpTransport, JobTransport};

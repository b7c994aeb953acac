//! Persistent response cache for idempotent API calls.
//!
//! Responses are stored under a content-addressed key derived from the
//! request (method, canonical URL, body), so a repeated or resumed run
//! replays earlier fetches instead of hitting the network again.

mod key;
mod layer;
mod storage;
mod traits;

pub use layer::CachingHttpClient;
pub use storage::{NoopStorage, SqliteStorage};
pub use traits::ResponseCache;

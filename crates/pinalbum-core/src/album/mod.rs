//! Album sessions: loading one page of photos for a pin into the cache.
//!
//! An `AlbumSession` fetches the photo list for a page, reserves a pending
//! slot in the `PhotoCache` for every photo in list order, then downloads
//! all images concurrently, filling slots as they arrive. Each load is
//! tagged with a generation so a newer load can discard an older one's
//! stragglers.

pub mod page;
pub mod report;
pub mod session;

pub use page::AlbumPage;
pub use report::{FetchSummary, LoadOutcome, LoadReport, SessionError, SessionNotice, SessionState};
pub use session::AlbumSession;

//! Persistent storage for pins and their albums.
//!
//! This module provides the `AlbumStore`, which keeps pins and the photos
//! downloaded for them on disk so albums can be browsed offline. Records are
//! stored as JSON stamped with the time they were written; albums are
//! considered stale after a week.
//!
//! Stored data:
//! - Pins (`pins.json`)
//! - One album index per pin, in album order
//! - Image bytes, one `.jpg` file per photo

pub mod disk;

pub use disk::{AlbumStore, CachedData, PhotoRecord, StoredAlbum, StoredPhoto};

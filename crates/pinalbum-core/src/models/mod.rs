//! Data models for pins and Flickr photo listings.
//!
//! - `PhotoDescriptor`: one photo from a search result, enough to build its image URL
//! - `PhotosResponse`, `PhotoPage`: the `flickr.photos.search` JSON envelope
//! - `Pin`, `Coordinate`: user-placed points that own an album

pub mod photo;
pub mod pin;

pub use photo::{PhotoDescriptor, PhotoPage, PhotosResponse};
pub use pin::{Coordinate, Pin};

pub mod drug;
pub mod extraction;
pub mod image;
pub mod patient;
pub mod prescription;

pub use drug::*;
pub use extraction::*;
pub use image::*;
pub use patient::*;
pub use prescription::*;

/// Identifier assigned by the remote record store.
pub type RecordId = i64;

/// Segment after the last `/` of a stored image reference.
pub(crate) fn file_name_of(image_url: &str) -> &str {
    image_url.rsplit('/').next().unwrap_or(image_url)
}

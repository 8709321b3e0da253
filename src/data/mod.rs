//! Competition data: images, training solutions and submissions

pub mod raw_image;
pub mod solutions;
pub mod store;
pub mod submission;

pub use raw_image::RawImage;
pub use solutions::TrainSolutions;
pub use store::{list_galaxy_ids, DirectoryImageStore, ImageStore, MemoryImageStore};
pub use submission::Submission;

//! Core file-browser logic: path translation, directory synthesis, object
//! location, content operations and chunked uploads.

pub mod browser_service;
pub mod listing;
pub mod locator;
pub mod paths;
pub mod uploads;

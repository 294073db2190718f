//! Request and response types for the file-browser API.
//!
//! Everything here serializes as JSON via `serde`. Field names follow the
//! drive protocol the browser client speaks (`oldLocalPath`, `toLocalDir`, ...).

pub mod contents;
pub mod requests;

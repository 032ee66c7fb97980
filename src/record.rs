//! Durable entities kept by the record store
//!
//! These are plain data: the algorithms that produce or consume them live in `upload`, `pairing`
//! and `submit`. Column encodings (the short codes written to SQLite) live next to each type.

/// Suffix based file type classification
pub mod file_type;
/// Uploaded file artifacts and their sample role
pub mod file;
/// Projects, their status progression, and algorithm choices
pub mod project;
/// Audit trail entries written after projects, files and reports are created
pub mod action;

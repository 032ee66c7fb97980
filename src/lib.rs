//! Sequencing read uploads, read pairing, pipeline job submission and result serving

/// Command line and environment configuration
pub mod config;
/// SQLite record store
pub mod db;
/// Edit distance between file names
pub mod distance;
/// HTTP routes and handlers
pub mod http;
/// Forward/reverse read pairing
pub mod pairing;
/// Byte range reads of stored files
pub mod range;
/// Domain records shared by the store, the orchestrator and the HTTP layer
pub mod record;
/// Claiming projects and handing them to the job worker
pub mod submit;
/// Directory trees of pipeline results
pub mod tree;
/// Chunked uploads and their finalization
pub mod upload;
/// Client for the job worker's task API
pub mod worker;

pub use config::WorkingDirectory;

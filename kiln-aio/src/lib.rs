// kiln-aio/src/lib.rs
//! IO operations for kiln (checksums, archive extraction, json, processes)

pub mod checksum;
pub mod extract;
pub mod json_io;
pub mod process;

pub use checksum::{verify_checksum_async, verify_checksum_sync, Checksum};
pub use extract::{extract_source_archive, extract_source_archive_async};
pub use json_io::{read_json_sync, write_json_sync};
pub use process::{run_command_sync, run_quietly_with_timeout};

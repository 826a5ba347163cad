//! CLI commands implementation

pub mod collections;
pub mod encode;
pub mod events;
pub mod ingest;
pub mod init;
pub mod rules;
pub mod stats;
pub mod status;
pub mod tag;

pub use collections::*;
pub use encode::*;
pub use events::*;
pub use ingest::*;
pub use init::*;
pub use rules::*;
pub use stats::*;
pub use status::*;
pub use tag::*;

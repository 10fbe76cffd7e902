pub mod db;
mod files;
mod folders;
pub mod models;
mod shares;
mod tables;
mod versions;

pub use db::{Database, DatabaseError, PurgeStats};
pub use tables::*;
pub use versions::NewVersion;

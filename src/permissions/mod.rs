//! Permission checking with admin caching.

mod checker;

pub use checker::Permissions;

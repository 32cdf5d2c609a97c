//! Database model exports.

pub mod flood;
pub mod user;

pub use flood::FloodSettings;
pub use user::UserRecord;

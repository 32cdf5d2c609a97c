//! Repository module - data access layer.

mod flood_settings_repo;

pub use flood_settings_repo::FloodSettingsRepo;

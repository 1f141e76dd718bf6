/// Database connection and schema provisioning
pub mod database;

/// Settings loading from inventory.toml
pub mod settings;

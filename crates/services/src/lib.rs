pub mod acquisition;
pub mod credentials;
pub mod settings_store;

pub mod btle;
pub mod connection;
pub mod constants;
pub mod platform;
pub mod registry;
pub mod scan;
pub mod status;
pub mod types;

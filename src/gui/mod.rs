pub mod application;
pub mod projection;
pub mod style;
pub mod types;

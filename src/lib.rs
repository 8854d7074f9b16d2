pub mod access;
pub mod api;
pub mod config;
pub mod db;
pub mod lifecycle;
pub mod notify;
pub mod sla;

pub use self::config::Config;

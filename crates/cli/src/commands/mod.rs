pub mod config;
pub mod configure;
pub mod exec;
pub mod providers;

pub mod admission;
pub mod api;
pub mod bootstrap;
pub mod budget;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod workers;

pub mod app;
pub mod auth;
pub mod config;
pub mod database;
pub mod datatable;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;

#[cfg(test)]
pub mod testing;

pub use app::app;

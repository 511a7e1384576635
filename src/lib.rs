pub mod api;
pub mod availability;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod geo;
pub mod models;
pub mod observability;
pub mod pickup;
pub mod providers;
pub mod quotes;
pub mod state;

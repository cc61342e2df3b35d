pub mod adapters;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod templating;
pub mod tracking;
pub mod web;

pub mod api;
pub mod cache;
pub mod catalog;
pub mod config;
pub mod connectivity;
pub mod humanize;
pub mod observability;
pub mod probe;
pub mod scheduler;
pub mod service;
pub mod transport;

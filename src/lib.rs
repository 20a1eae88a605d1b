//! Toolshed backend: booking, payment and reputation core of a
//! peer-to-peer tool rental marketplace.

pub mod api;
pub mod app;
pub mod clock;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod store;

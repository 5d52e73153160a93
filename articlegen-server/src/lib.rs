//! articlegen-server: web form and JSON API for the article pipeline.

pub mod config;
pub mod page;
pub mod server;
pub mod web;

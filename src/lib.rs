//! Media tags - tag management for the media sharing platform
//!
//! This library provides tag storage, lookup and media association for the
//! media API, together with its HTTP surface.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;

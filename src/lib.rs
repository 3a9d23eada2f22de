//! Read-through cache for a single current-weather record.
//!
//! A [`cache::CacheManager`] refreshes the record from a [`weather::DataSource`]
//! into a [`store::RecordStore`] on a timer, and the [`web`] layer serves
//! whatever was last stored.

pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod logging;
pub mod payload;
pub mod services;
pub mod state;
pub mod store;
pub mod utils;
pub mod weather;
pub mod web;

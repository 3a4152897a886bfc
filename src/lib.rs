//! # ShopHunter Telegram Bot
//!
//! A Telegram bot that searches products in shops near the user's saved
//! location, pages and sorts the results as an in-place product card, and
//! keeps per-user language and location settings in SQLite.

pub mod bot;
pub mod catalog;
pub mod circuit_breaker;
pub mod commands;
pub mod config;
pub mod db;
pub mod dialogue;
pub mod geocoder;
pub mod localization;
pub mod location;
pub mod navigator;
pub mod service_errors;
pub mod service_guard;
pub mod session;

//! Shopify Alt-Text Engine
//!
//! This library provides the core functionality for alt-text-engine: scanning
//! a shop's product catalog for images without alt text, generating SEO-ready
//! captions through an AI vision provider, writing them back via the Shopify
//! Admin GraphQL API, and recovering failures through a dead-letter queue.

pub mod app_state;
pub mod config;
pub mod db;
pub mod models;
pub mod routes;
pub mod services;

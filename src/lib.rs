//! Sales Lead Dashboard Library
//!
//! Keeps a local view of a lead backend's collection and reconciles it with
//! targeted patches as users rescore leads, generate outreach messages and log
//! interactions.
//!
//! # Modules
//!
//! - `config`: Configuration management.
//! - `dashboard`: Stats, lead cards and the generated-messages feed.
//! - `errors`: Error handling types.
//! - `gateway_client`: Lead backend API client.
//! - `handlers`: HTTP request handlers.
//! - `lifecycle`: Rescore, message and interaction flows.
//! - `models`: Core data models.
//! - `notifications`: Transient success notifications.
//! - `session`: Collection loading, search and the top-level view.
//! - `store`: In-memory lead collection.

pub mod config;
pub mod dashboard;
pub mod errors;
pub mod gateway_client;
pub mod handlers;
pub mod lifecycle;
pub mod models;
pub mod notifications;
pub mod session;
pub mod store;

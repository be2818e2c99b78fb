//! QuestMap - download coordination and quest visibility for map editing
//!
//! This library provides the core of a crowd-sourced map-editing client:
//!
//! - [`download`]: "download this tile rect" requests with freshness caching,
//!   last-request-wins supersession and concurrent fan-out to per-domain
//!   download tasks
//! - [`quest`]: quest stores and the registry that decides which quests are
//!   visible and republishes changes to subscribers
//!
//! The two halves only meet through the quest stores: download tasks write
//! to them, the registry listens to them.

pub mod config;
pub mod coord;
pub mod download;
pub mod listeners;
pub mod logging;
pub mod quest;

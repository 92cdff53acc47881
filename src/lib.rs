//! Personal task lists over HTTP.
//!
//! The server side is [`gateway`] on top of [`auth`] and [`tasks`], both
//! persisted through [`storage`]. The [`client`] module holds the terminal
//! client's optimistic view of one account's list.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod storage;
pub mod tasks;

pub use config::Config;
pub use error::TodoError;

//! Import of SSPC property listings into a local content store.
//!
//! The feed is parsed into [`models::FeedProperty`] values, mapped onto
//! entity metadata and taxonomy terms by [`import::Importer`], and each
//! listing's media is brought in line with the feed by
//! [`media::MediaReconciler`].

pub mod config;
pub mod error;
pub mod feeds;
pub mod geocode;
pub mod hooks;
pub mod import;
pub mod media;
pub mod models;
pub mod store;

pub use config::Config;
pub use error::{Error, Result};

//! # galaxykit
//!
//! Typed access to a [Galaxy](https://galaxyproject.org) server.
//!
//! This crate provides:
//! - Typed entities (users, quotas, histories, jobs, repositories, tools,
//!   stored workflows), each registered with a declarative field table
//! - The [`backend::Accessor`] trait: get / create / update / delete / list /
//!   undelete for one entity kind
//! - A blocking HTTP backend and an in-memory mock
//!
//! ## Example
//!
//! ```no_run
//! use galaxykit::backend::{Accessor, http::GalaxyBackend};
//! use galaxykit::{History, HistoryParams};
//!
//! let galaxy = GalaxyBackend::new("https://usegalaxy.example.org", "0123456789abcdef");
//! let created: Vec<History> = galaxy
//!     .create(&HistoryParams { name: "scratch".into() })
//!     .expect("create failed");
//! println!("created history {}", created[0].id);
//! ```

pub mod backend;
pub mod error;
pub mod types;

pub use error::{Error, ErrorCategory, Result};
pub use types::*;

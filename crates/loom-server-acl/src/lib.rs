// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage-backed access control for Loom.
//!
//! Builds on [`loom_acl_core`] with:
//!
//! - [`SqliteAuthorizationRepository`]: transactional persistence of roles and
//!   authorization trees, plus the resolution queries
//! - [`AclService`]: role grant and revoke, resource lifecycle, resolution
//!   and full rebuild
//! - [`config`]: layered configuration (defaults, TOML, `LOOM_ACL_*` env vars)
//!   and [`AclSetup`], the registries built from it
//!
//! ```no_run
//! use loom_server_acl::{config, open_repository, AclService, AclSetup, FlatHierarchy};
//!
//! # async fn run() -> Result<(), loom_server_acl::AclServerError> {
//! let config = config::load_config()?;
//! let setup = AclSetup::from_config(&config)?;
//! let repository = open_repository(&config.database).await?;
//! let service = AclService::new(repository, FlatHierarchy, setup);
//! # let _ = service;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod pool;
pub mod repository;
pub mod schema;
pub mod service;
pub mod setup;
pub mod testing;

pub use error::{AclServerError, Result};
pub use pool::{create_pool, open_repository};
pub use repository::{AuthorizationRepository, Page, SqliteAuthorizationRepository, DEFAULT_PAGE_SIZE};
pub use schema::run_migrations;
pub use service::AclService;
pub use setup::AclSetup;

pub use loom_acl_core::*;

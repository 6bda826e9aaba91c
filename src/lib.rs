// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Module Integration Gateway
//!
//! Lets independently-built portal modules store and read user-scoped data
//! with a module secret, and call back into the host page over a
//! cross-window RPC channel.
//!
//! ## Modules
//!
//! - `api` - HTTP API handlers (Axum)
//! - `auth` - Bearer identity (JWKS) and credential extractors
//! - `gateway` - Module key verification, visibility rules, data store
//! - `rpc` - Cross-window RPC envelope, client, host and transport
//! - `storage` - File-backed JSON storage and audit log

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod rpc;
pub mod state;
pub mod storage;

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Cross-window RPC between the portal and its embedded modules.
//!
//! ```text
//!  module window                         host window
//!  ┌──────────────┐   RpcRequest (id)   ┌──────────────┐
//!  │  RpcClient   │ ──────────────────▶ │   RpcHost    │
//!  │  (pending)   │ ◀────────────────── │  (handlers)  │
//!  └──────────────┘   RpcResponse (id)  └──────────────┘
//! ```
//!
//! Both directions share one message channel with unrelated traffic; the
//! envelope guards in [`envelope`] decide what belongs to this protocol.

pub mod client;
pub mod envelope;
pub mod host;
pub mod transport;

pub use client::{RpcCallError, RpcClient, RpcClientOptions, RpcConfigError, DEFAULT_TIMEOUT};
pub use envelope::{
    is_request, is_response, RpcErrorBody, RpcRequest, RpcResponse, PROTOCOL, UNKNOWN_ACTION,
    UNSPECIFIED_ERROR, VERSION,
};
pub use host::{RequestContext, RpcHost};
pub use transport::{
    window_pair, MessageTarget, PostedMessage, TargetOrigin, TransportError, Window,
    WindowEndpoint, WILDCARD_ORIGIN,
};

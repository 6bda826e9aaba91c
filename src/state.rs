// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::auth::IdentityResolver;
use crate::storage::FileStorage;

#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<FileStorage>,
    pub identity: IdentityResolver,
}

impl AppState {
    pub fn new(storage: FileStorage) -> Self {
        Self {
            storage: Arc::new(storage),
            identity: IdentityResolver::default(),
        }
    }

    pub fn with_identity(mut self, identity: IdentityResolver) -> Self {
        self.identity = identity;
        self
    }
}

// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer providing typed access to file storage.

pub mod module_data;
pub mod module_keys;

pub use module_data::{ModuleDataRepository, StoredModuleRecord};
pub use module_keys::{ModuleKeyRepository, StoredModuleKey};

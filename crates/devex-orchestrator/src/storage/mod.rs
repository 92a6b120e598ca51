// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Storage module - workspace folders in S3-compatible object storage.
//!
//! Workspaces live under `repl/{owner_id}/{session_id}/`; template seeds under
//! `base/{template}/`. Keys ending in `/` are folder placeholders.

mod gateway;
pub mod mock;
mod s3;
mod traits;

pub use gateway::{StorageGateway, SyncSummary};
pub use mock::MockObjectStore;
pub use s3::S3ObjectStore;
pub use traits::*;

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Platform module - orchestration API backends.

mod kubernetes;
pub mod mock;
mod traits;

pub use kubernetes::KubePlatform;
pub use mock::{MockPlatform, PlatformCall, UploaderBehaviour};
pub use traits::*;

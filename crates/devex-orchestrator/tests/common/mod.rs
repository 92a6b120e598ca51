// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for devex-orchestrator integration tests.
//!
//! Provides a config builder and a TestContext wiring the repl service to the
//! in-memory platform and object store.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use devex_orchestrator::config::Config;
use devex_orchestrator::controller::LifecycleController;
use devex_orchestrator::platform::MockPlatform;
use devex_orchestrator::poll::PollPolicy;
use devex_orchestrator::readiness::ReadinessProber;
use devex_orchestrator::repl::ReplService;
use devex_orchestrator::storage::{MockObjectStore, StorageGateway};

/// Build a config from the minimum required variables plus `overrides`.
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("S3_ENDPOINT", "https://r2.example.com"),
        ("S3_ACCESS_KEY", "test-access"),
        ("S3_SECRET_KEY", "test-secret"),
        ("S3_BUCKET", "devex"),
        ("S3_REGION", "auto"),
        ("RUNNER_CLUSTER_IP", "repl.example.com"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    Config::from_lookup(|key| vars.get(key).cloned()).expect("test config should parse")
}

/// Repl service over mock backends.
pub struct TestContext {
    pub config: Arc<Config>,
    pub platform: MockPlatform,
    pub store: MockObjectStore,
    pub service: Arc<ReplService>,
}

impl TestContext {
    /// Build a context. `readiness_base_url` is where activation probes go.
    pub fn new(readiness_base_url: &str, overrides: &[(&str, &str)]) -> Self {
        let mut config = test_config(overrides);
        config.readiness_base_url = readiness_base_url.trim_end_matches('/').to_string();
        config.readiness = PollPolicy::new(Duration::from_millis(50), Duration::from_millis(500));
        config.flush = PollPolicy::new(Duration::from_millis(10), Duration::from_millis(200));
        let config = Arc::new(config);

        let platform = MockPlatform::new();
        let store = MockObjectStore::with_objects([
            ("base/node/", ""),
            ("base/node/index.js", "require('http').createServer().listen(3000)"),
            ("base/node/package.json", "{\"name\":\"repl\"}"),
            ("base/python/main.py", "print('hi')"),
        ]);

        let service = Arc::new(ReplService::new(
            config.clone(),
            LifecycleController::new(config.clone(), Arc::new(platform.clone())),
            StorageGateway::new(Arc::new(store.clone())),
            ReadinessProber::new().expect("client should build"),
        ));

        Self {
            config,
            platform,
            store,
            service,
        }
    }
}

// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for devex-orchestrator.
//!
//! Everything is read once at process start and then shared immutably
//! (`Arc<Config>`) with the builder, controller and repl service.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::poll::PollPolicy;

/// Port the runner exposes for its gRPC control channel.
pub const GRPC_PORT: i32 = 50051;

/// Port the MCP sidecar listens on.
pub const SIDECAR_PORT: i32 = 8080;

/// Which ingress routing flavour to emit for each session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingMode {
    /// Traefik `stripPrefix` middleware plus plain prefix paths.
    StripPrefix,
    /// Single ingress with a capture-group rewrite (ingress-nginx).
    Rewrite,
}

impl RoutingMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "strip-prefix" | "stripprefix" | "traefik" => Ok(Self::StripPrefix),
            "rewrite" | "regex" | "nginx" => Ok(Self::Rewrite),
            other => Err(ConfigError::InvalidValue {
                var: "DEVEX_ROUTING_STRATEGY",
                value: other.to_string(),
            }),
        }
    }
}

/// Runtime profile for one template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateProfile {
    /// Template name, e.g. `node`.
    pub name: String,
    /// Application port the runner image listens on.
    pub port: i32,
}

/// Template name to profile lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateTable {
    profiles: BTreeMap<String, TemplateProfile>,
}

impl Default for TemplateTable {
    fn default() -> Self {
        Self::from_ports([("node", 3000), ("python", 8000), ("go", 9000)])
    }
}

impl TemplateTable {
    /// Build a table from `(name, port)` pairs.
    pub fn from_ports<'a>(ports: impl IntoIterator<Item = (&'a str, i32)>) -> Self {
        let profiles = ports
            .into_iter()
            .map(|(name, port)| {
                (
                    name.to_string(),
                    TemplateProfile {
                        name: name.to_string(),
                        port,
                    },
                )
            })
            .collect();
        Self { profiles }
    }

    /// Parse `name=port,name=port`.
    fn parse(value: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            var: "DEVEX_TEMPLATE_PORTS",
            value: value.to_string(),
        };

        let mut pairs = Vec::new();
        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, port) = entry.split_once('=').ok_or_else(invalid)?;
            let port: u16 = port.trim().parse().map_err(|_| invalid())?;
            if name.trim().is_empty() || port == 0 {
                return Err(invalid());
            }
            pairs.push((name.trim(), i32::from(port)));
        }
        if pairs.is_empty() {
            return Err(invalid());
        }
        Ok(Self::from_ports(pairs))
    }

    /// Look up a template profile.
    pub fn get(&self, name: &str) -> Option<&TemplateProfile> {
        self.profiles.get(name)
    }

    /// Known template names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

/// Object storage settings.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Bucket holding every workspace.
    pub bucket: String,
    /// S3-compatible endpoint (R2, MinIO, AWS).
    pub endpoint: String,
    /// Signing region.
    pub region: String,
    /// Static access key for the orchestrator's own client.
    pub access_key: String,
    /// Static secret key for the orchestrator's own client.
    pub secret_key: String,
}

/// Images used in generated workloads.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Prefix for runner images; the template name and `:latest` are appended.
    pub runner_prefix: String,
    /// MCP sidecar image.
    pub sidecar: String,
    /// Image providing the `aws` CLI for download/upload steps.
    pub aws_cli: String,
}

/// Cluster-side settings.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// Namespace for every per-session resource.
    pub namespace: String,
    /// Explicit kubeconfig; `None` falls back to in-cluster / default discovery.
    pub kubeconfig: Option<PathBuf>,
    /// Shared public hostname for every session.
    pub public_host: String,
    /// Secret holding `access_key` / `secret_key` for in-pod aws-cli.
    pub credentials_secret: String,
    /// TLS secret referenced from each ingress.
    pub tls_secret: String,
    /// cert-manager cluster issuer annotation value.
    pub cluster_issuer: String,
}

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API bind address.
    pub bind_addr: SocketAddr,
    /// Cluster settings.
    pub cluster: ClusterConfig,
    /// Whether every workload gets the MCP sidecar.
    pub sidecar_enabled: bool,
    /// Ingress flavour.
    pub routing: RoutingMode,
    /// Template table.
    pub templates: TemplateTable,
    /// Images.
    pub images: ImageConfig,
    /// Object storage.
    pub storage: StorageConfig,
    /// Wait policy for the ephemeral uploader.
    pub flush: PollPolicy,
    /// Wait policy for runner readiness.
    pub readiness: PollPolicy,
    /// Base URL the readiness probe targets; `/{session_id}/ping` is appended.
    pub readiness_base_url: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let string = |key: &str, default: &str| var(key).unwrap_or_else(|| default.to_string());

        let bind_addr = string("DEVEX_BIND_ADDR", "0.0.0.0:4000");
        let bind_addr = bind_addr
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidValue {
                var: "DEVEX_BIND_ADDR",
                value: bind_addr,
            })?;

        let public_host = string("RUNNER_CLUSTER_IP", "localhost");

        let routing = match var("DEVEX_ROUTING_STRATEGY") {
            Some(v) => RoutingMode::parse(&v)?,
            None => RoutingMode::StripPrefix,
        };

        let templates = match var("DEVEX_TEMPLATE_PORTS") {
            Some(v) => TemplateTable::parse(&v)?,
            None => TemplateTable::default(),
        };

        let flush = PollPolicy::new(
            secs(&var, "DEVEX_FLUSH_INTERVAL_SECS", 2)?,
            secs(&var, "DEVEX_FLUSH_TIMEOUT_SECS", 120)?,
        );
        let readiness = PollPolicy::new(
            secs(&var, "DEVEX_READY_INTERVAL_SECS", 2)?,
            secs(&var, "DEVEX_READY_TIMEOUT_SECS", 60)?,
        );

        let readiness_base_url = var("DEVEX_READINESS_BASE_URL")
            .unwrap_or_else(|| format!("https://{}", public_host))
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            bind_addr,
            cluster: ClusterConfig {
                namespace: string("DEVEX_NAMESPACE", "default"),
                kubeconfig: var("KUBE_CONFIG_PATH").map(PathBuf::from),
                public_host,
                credentials_secret: string("DEVEX_CREDENTIALS_SECRET", "aws-creds"),
                tls_secret: string("DEVEX_TLS_SECRET", "tls-secret"),
                cluster_issuer: string("DEVEX_CLUSTER_ISSUER", "letsencrypt-cluster-issuer"),
            },
            sidecar_enabled: var("ENABLE_MCP_SIDECAR")
                .map(|v| flag(&v))
                .unwrap_or(false),
            routing,
            templates,
            images: ImageConfig {
                runner_prefix: string("DEVEX_RUNNER_IMAGE_PREFIX", "ghcr.io/devex/runner"),
                sidecar: string("DEVEX_SIDECAR_IMAGE", "ghcr.io/devex/mcp:latest"),
                aws_cli: string("DEVEX_AWS_CLI_IMAGE", "amazon/aws-cli"),
            },
            storage: StorageConfig {
                bucket: string("S3_BUCKET", "devex"),
                endpoint: var("S3_ENDPOINT").ok_or(ConfigError::MissingEnvVar("S3_ENDPOINT"))?,
                region: string("S3_REGION", "auto"),
                access_key: var("S3_ACCESS_KEY")
                    .ok_or(ConfigError::MissingEnvVar("S3_ACCESS_KEY"))?,
                secret_key: var("S3_SECRET_KEY")
                    .ok_or(ConfigError::MissingEnvVar("S3_SECRET_KEY"))?,
            },
            flush,
            readiness,
            readiness_base_url,
        })
    }
}

fn flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn secs<F>(var: &F, key: &'static str, default: u64) -> Result<Duration, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        None => Ok(Duration::from_secs(default)),
        Some(v) => match v.parse::<u64>() {
            Ok(n) if n > 0 => Ok(Duration::from_secs(n)),
            _ => Err(ConfigError::InvalidValue { var: key, value: v }),
        },
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(&'static str),
    /// A variable is present but cannot be parsed.
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let mut vars: HashMap<String, String> = [
            ("S3_ENDPOINT", "https://r2.example.com"),
            ("S3_ACCESS_KEY", "ak"),
            ("S3_SECRET_KEY", "sk"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in pairs {
            vars.insert(k.to_string(), v.to_string());
        }
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.cluster.namespace, "default");
        assert_eq!(config.cluster.public_host, "localhost");
        assert!(!config.sidecar_enabled);
        assert_eq!(config.routing, RoutingMode::StripPrefix);
        assert_eq!(config.storage.bucket, "devex");
        assert_eq!(config.flush.interval, Duration::from_secs(2));
        assert_eq!(config.flush.timeout, Duration::from_secs(120));
        assert_eq!(config.readiness.timeout, Duration::from_secs(60));
        assert_eq!(config.readiness_base_url, "https://localhost");
        assert_eq!(config.templates.get("node").map(|p| p.port), Some(3000));
    }

    #[test]
    fn test_missing_storage_credentials() {
        let err = Config::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar("S3_ENDPOINT")));
    }

    #[test]
    fn test_sidecar_flag_and_routing() {
        let config = Config::from_lookup(lookup(&[
            ("ENABLE_MCP_SIDECAR", "true"),
            ("DEVEX_ROUTING_STRATEGY", "rewrite"),
            ("RUNNER_CLUSTER_IP", "repl.example.com"),
        ]))
        .unwrap();

        assert!(config.sidecar_enabled);
        assert_eq!(config.routing, RoutingMode::Rewrite);
        assert_eq!(config.readiness_base_url, "https://repl.example.com");
    }

    #[test]
    fn test_template_ports() {
        let config = Config::from_lookup(lookup(&[(
            "DEVEX_TEMPLATE_PORTS",
            "node=3001, rust = 7000",
        )]))
        .unwrap();

        assert_eq!(config.templates.get("node").map(|p| p.port), Some(3001));
        assert_eq!(config.templates.get("rust").map(|p| p.port), Some(7000));
        assert!(config.templates.get("python").is_none());
        assert_eq!(config.templates.names().collect::<Vec<_>>(), ["node", "rust"]);
    }

    #[test]
    fn test_invalid_values() {
        for (key, value) in [
            ("DEVEX_TEMPLATE_PORTS", "node"),
            ("DEVEX_TEMPLATE_PORTS", "node=abc"),
            ("DEVEX_ROUTING_STRATEGY", "haproxy"),
            ("DEVEX_FLUSH_TIMEOUT_SECS", "0"),
            ("DEVEX_BIND_ADDR", "not-an-addr"),
        ] {
            let result = Config::from_lookup(lookup(&[(key, value)]));
            assert!(
                matches!(result, Err(ConfigError::InvalidValue { .. })),
                "{key}={value} should be rejected"
            );
        }
    }
}

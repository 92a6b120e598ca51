// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ingress routing strategies.
//!
//! Every session shares one public host and is addressed by path:
//! `/{session_id}/...` reaches the runner's app port and
//! `/mcp/{session_id}/...` reaches the sidecar. The upstream sees paths with
//! that prefix removed. Two controllers are supported, and they remove the
//! prefix differently:
//!
//! - [`StripPrefixRouting`]: a Traefik `Middleware` with `stripPrefix`, plus
//!   plain `Prefix` ingress paths.
//! - [`RewriteRouting`]: one ingress-nginx ingress with capture-group paths
//!   and `rewrite-target: /$2`. No extra object.

use std::collections::BTreeMap;
use std::fmt::Debug;

use k8s_openapi::api::networking::v1::{
    HTTPIngressPath, HTTPIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, IngressTLS, ServiceBackendPort,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::core::DynamicObject;
use serde_json::json;

use super::middleware_resource;
use crate::config::{ClusterConfig, RoutingMode, SIDECAR_PORT};
use crate::session::Session;

/// Inputs a routing strategy needs.
#[derive(Debug, Clone, Copy)]
pub struct RoutingContext<'a> {
    /// Session being routed.
    pub session: &'a Session,
    /// Template application port.
    pub app_port: i32,
    /// Whether the MCP sidecar path is routed too.
    pub sidecar: bool,
    /// Host, TLS and issuer settings.
    pub cluster: &'a ClusterConfig,
}

/// Objects a strategy produces.
#[derive(Debug, Clone)]
pub struct RoutingSpec {
    /// Extra middleware object, if the controller needs one.
    pub middleware: Option<DynamicObject>,
    /// The session's ingress.
    pub ingress: Ingress,
}

/// Produces the routing objects for a session.
pub trait RoutingStrategy: Send + Sync + Debug {
    /// Short identifier, used in logs.
    fn name(&self) -> &'static str;

    /// Whether [`RoutingSpec::middleware`] is populated, and so must be
    /// deleted on teardown.
    fn uses_middleware(&self) -> bool;

    /// Build the routing objects.
    fn build(&self, ctx: &RoutingContext<'_>) -> RoutingSpec;
}

/// Strategy selected by configuration.
pub fn strategy_for(mode: RoutingMode) -> Box<dyn RoutingStrategy> {
    match mode {
        RoutingMode::StripPrefix => Box::new(StripPrefixRouting),
        RoutingMode::Rewrite => Box::new(RewriteRouting),
    }
}

/// Traefik `stripPrefix` middleware plus `Prefix` paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct StripPrefixRouting;

impl RoutingStrategy for StripPrefixRouting {
    fn name(&self) -> &'static str {
        "strip-prefix"
    }

    fn uses_middleware(&self) -> bool {
        true
    }

    fn build(&self, ctx: &RoutingContext<'_>) -> RoutingSpec {
        let id = ctx.session.session_id();
        let middleware_name = ctx.session.middleware_name();

        let mut prefixes = vec![format!("/{}", id), format!("/{}/", id)];
        if ctx.sidecar {
            prefixes.push(format!("/mcp/{}", id));
            prefixes.push(format!("/mcp/{}/", id));
        }
        let middleware = DynamicObject::new(&middleware_name, &middleware_resource()).data(json!({
            "spec": { "stripPrefix": { "prefixes": prefixes } }
        }));

        let annotations = BTreeMap::from([
            (
                "cert-manager.io/cluster-issuer".to_string(),
                ctx.cluster.cluster_issuer.clone(),
            ),
            (
                "traefik.ingress.kubernetes.io/router.middlewares".to_string(),
                format!("{}-{}@kubernetescrd", ctx.cluster.namespace, middleware_name),
            ),
        ]);

        let mut paths = vec![backend_path(format!("/{}", id), "Prefix", id, ctx.app_port)];
        if ctx.sidecar {
            paths.push(backend_path(format!("/mcp/{}", id), "Prefix", id, SIDECAR_PORT));
        }

        RoutingSpec {
            middleware: Some(middleware),
            ingress: ingress(ctx, "traefik", annotations, paths),
        }
    }
}

/// ingress-nginx capture-group rewrite.
#[derive(Debug, Clone, Copy, Default)]
pub struct RewriteRouting;

impl RoutingStrategy for RewriteRouting {
    fn name(&self) -> &'static str {
        "rewrite"
    }

    fn uses_middleware(&self) -> bool {
        false
    }

    fn build(&self, ctx: &RoutingContext<'_>) -> RoutingSpec {
        let id = ctx.session.session_id();

        let annotations = BTreeMap::from([
            (
                "cert-manager.io/cluster-issuer".to_string(),
                ctx.cluster.cluster_issuer.clone(),
            ),
            (
                "nginx.ingress.kubernetes.io/use-regex".to_string(),
                "true".to_string(),
            ),
            (
                "nginx.ingress.kubernetes.io/rewrite-target".to_string(),
                "/$2".to_string(),
            ),
        ]);

        let mut paths = vec![backend_path(
            format!("/{}(/|$)(.*)", id),
            "ImplementationSpecific",
            id,
            ctx.app_port,
        )];
        if ctx.sidecar {
            paths.push(backend_path(
                format!("/mcp/{}(/|$)(.*)", id),
                "ImplementationSpecific",
                id,
                SIDECAR_PORT,
            ));
        }

        RoutingSpec {
            middleware: None,
            ingress: ingress(ctx, "nginx", annotations, paths),
        }
    }
}

fn ingress(
    ctx: &RoutingContext<'_>,
    class: &str,
    annotations: BTreeMap<String, String>,
    paths: Vec<HTTPIngressPath>,
) -> Ingress {
    let host = ctx.cluster.public_host.clone();
    Ingress {
        metadata: ObjectMeta {
            name: Some(ctx.session.ingress_name()),
            annotations: Some(annotations),
            ..Default::default()
        },
        spec: Some(IngressSpec {
            ingress_class_name: Some(class.to_string()),
            tls: Some(vec![IngressTLS {
                hosts: Some(vec![host.clone()]),
                secret_name: Some(ctx.cluster.tls_secret.clone()),
            }]),
            rules: Some(vec![IngressRule {
                host: Some(host),
                http: Some(HTTPIngressRuleValue { paths }),
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn backend_path(path: String, path_type: &str, service: &str, port: i32) -> HTTPIngressPath {
    HTTPIngressPath {
        path: Some(path),
        path_type: path_type.to_string(),
        backend: IngressBackend {
            service: Some(IngressServiceBackend {
                name: service.to_string(),
                port: Some(ServiceBackendPort {
                    number: Some(port),
                    ..Default::default()
                }),
            }),
            ..Default::default()
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cluster() -> ClusterConfig {
        ClusterConfig {
            namespace: "default".to_string(),
            kubeconfig: None,
            public_host: "repl.example.com".to_string(),
            credentials_secret: "aws-creds".to_string(),
            tls_secret: "tls-secret".to_string(),
            cluster_issuer: "letsencrypt-cluster-issuer".to_string(),
        }
    }

    fn paths(ingress: &Ingress) -> Vec<(String, String, i32)> {
        let spec = ingress.spec.as_ref().unwrap();
        let rule = &spec.rules.as_ref().unwrap()[0];
        rule.http
            .as_ref()
            .unwrap()
            .paths
            .iter()
            .map(|p| {
                let backend = p.backend.service.as_ref().unwrap();
                (
                    p.path.clone().unwrap(),
                    p.path_type.clone(),
                    backend.port.as_ref().unwrap().number.unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_strip_prefix_without_sidecar() {
        let session = Session::new("u1", "abc123", "node").unwrap();
        let cluster = cluster();
        let spec = StripPrefixRouting.build(&RoutingContext {
            session: &session,
            app_port: 3000,
            sidecar: false,
            cluster: &cluster,
        });

        let middleware = spec.middleware.unwrap();
        assert_eq!(middleware.metadata.name.as_deref(), Some("abc123-stripprefix"));
        assert_eq!(
            middleware.data["spec"]["stripPrefix"]["prefixes"],
            json!(["/abc123", "/abc123/"])
        );

        assert_eq!(
            paths(&spec.ingress),
            [("/abc123".to_string(), "Prefix".to_string(), 3000)]
        );
        let annotations = spec.ingress.metadata.annotations.unwrap();
        assert_eq!(
            annotations["traefik.ingress.kubernetes.io/router.middlewares"],
            "default-abc123-stripprefix@kubernetescrd"
        );
    }

    #[test]
    fn test_strip_prefix_with_sidecar_routes_mcp() {
        let session = Session::new("u1", "abc123", "node").unwrap();
        let cluster = cluster();
        let spec = StripPrefixRouting.build(&RoutingContext {
            session: &session,
            app_port: 3000,
            sidecar: true,
            cluster: &cluster,
        });

        assert_eq!(
            spec.middleware.unwrap().data["spec"]["stripPrefix"]["prefixes"],
            json!(["/abc123", "/abc123/", "/mcp/abc123", "/mcp/abc123/"])
        );
        assert_eq!(
            paths(&spec.ingress),
            [
                ("/abc123".to_string(), "Prefix".to_string(), 3000),
                ("/mcp/abc123".to_string(), "Prefix".to_string(), 8080),
            ]
        );
    }

    #[test]
    fn test_rewrite_has_no_middleware() {
        let session = Session::new("u1", "abc123", "python").unwrap();
        let cluster = cluster();
        let spec = RewriteRouting.build(&RoutingContext {
            session: &session,
            app_port: 8000,
            sidecar: true,
            cluster: &cluster,
        });

        assert!(spec.middleware.is_none());
        assert!(!RewriteRouting.uses_middleware());
        let ingress_spec = spec.ingress.spec.as_ref().unwrap();
        assert_eq!(ingress_spec.ingress_class_name.as_deref(), Some("nginx"));
        assert_eq!(
            paths(&spec.ingress),
            [
                (
                    "/abc123(/|$)(.*)".to_string(),
                    "ImplementationSpecific".to_string(),
                    8000
                ),
                (
                    "/mcp/abc123(/|$)(.*)".to_string(),
                    "ImplementationSpecific".to_string(),
                    8080
                ),
            ]
        );
        let annotations = spec.ingress.metadata.annotations.as_ref().unwrap();
        assert_eq!(annotations["nginx.ingress.kubernetes.io/rewrite-target"], "/$2");
    }

    #[test]
    fn test_shared_host_tls() {
        let session = Session::new("u1", "abc123", "node").unwrap();
        let cluster = cluster();
        for strategy in [
            strategy_for(RoutingMode::StripPrefix),
            strategy_for(RoutingMode::Rewrite),
        ] {
            let spec = strategy.build(&RoutingContext {
                session: &session,
                app_port: 3000,
                sidecar: false,
                cluster: &cluster,
            });
            let ingress_spec = spec.ingress.spec.unwrap();
            let tls = &ingress_spec.tls.unwrap()[0];
            assert_eq!(tls.hosts.as_deref(), Some(&["repl.example.com".to_string()][..]));
            assert_eq!(tls.secret_name.as_deref(), Some("tls-secret"));
            assert_eq!(
                spec.ingress.metadata.annotations.unwrap()["cert-manager.io/cluster-issuer"],
                "letsencrypt-cluster-issuer"
            );
        }
    }
}

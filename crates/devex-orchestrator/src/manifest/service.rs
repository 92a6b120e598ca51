// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session Service.

use k8s_openapi::api::core::v1::{Service, ServicePort, ServiceSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use super::session_labels;
use crate::config::{GRPC_PORT, SIDECAR_PORT, TemplateProfile};
use crate::session::Session;

/// ClusterIP service selecting the session's pods.
pub(super) fn service(session: &Session, profile: &TemplateProfile, sidecar: bool) -> Service {
    let mut ports = vec![port("http", profile.port), port("grpc", GRPC_PORT)];
    if sidecar {
        ports.push(port("mcp-http", SIDECAR_PORT));
    }

    Service {
        metadata: ObjectMeta {
            name: Some(session.session_id().to_string()),
            labels: Some(session_labels(session)),
            ..Default::default()
        },
        spec: Some(ServiceSpec {
            type_: Some("ClusterIP".to_string()),
            selector: Some(session_labels(session)),
            ports: Some(ports),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn port(name: &str, number: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port: number,
        target_port: Some(IntOrString::Int(number)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

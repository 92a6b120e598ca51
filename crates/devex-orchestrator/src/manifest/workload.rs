// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Session Deployment.

use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EmptyDirVolumeSource, EnvVar, PodSpec, PodTemplateSpec, Volume,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};

use super::{
    DOWNLOADER_CONTAINER, RUNNER_CONTAINER, SIDECAR_CONTAINER, WORKSPACE_MOUNT, WORKSPACE_VOLUME,
    credential_env, session_labels, workspace_mount,
};
use crate::config::{Config, GRPC_PORT, SIDECAR_PORT, TemplateProfile};
use crate::session::Session;

pub(super) fn deployment(
    session: &Session,
    profile: &TemplateProfile,
    config: &Config,
) -> Deployment {
    let labels = session_labels(session);

    let mut containers = vec![runner(session, profile, config)];
    if config.sidecar_enabled {
        containers.push(sidecar(session, config));
    }

    Deployment {
        metadata: ObjectMeta {
            name: Some(session.session_id().to_string()),
            labels: Some(labels.clone()),
            ..Default::default()
        },
        spec: Some(DeploymentSpec {
            replicas: Some(1),
            selector: LabelSelector {
                match_labels: Some(labels.clone()),
                ..Default::default()
            },
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: Some(labels),
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    init_containers: Some(vec![downloader(session, config)]),
                    containers,
                    volumes: Some(vec![Volume {
                        name: WORKSPACE_VOLUME.to_string(),
                        empty_dir: Some(EmptyDirVolumeSource::default()),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Restores the session folder into the scratch volume. The `&&` chain makes a
/// failed copy fail the init container, which keeps the pod from starting.
fn downloader(session: &Session, config: &Config) -> Container {
    let storage = &config.storage;
    let command = format!(
        "aws s3 cp s3://{}/{} {} --recursive --endpoint-url {} --region {} \
         && echo 'workspace restored'",
        storage.bucket,
        session.storage_prefix(),
        WORKSPACE_MOUNT,
        storage.endpoint,
        storage.region,
    );

    Container {
        name: DOWNLOADER_CONTAINER.to_string(),
        image: Some(config.images.aws_cli.clone()),
        command: Some(vec!["sh".to_string(), "-c".to_string()]),
        args: Some(vec![command]),
        env: Some(credential_env(&config.cluster.credentials_secret)),
        volume_mounts: Some(vec![workspace_mount()]),
        ..Default::default()
    }
}

fn runner(session: &Session, profile: &TemplateProfile, config: &Config) -> Container {
    Container {
        name: RUNNER_CONTAINER.to_string(),
        image: Some(format!(
            "{}-{}:latest",
            config.images.runner_prefix,
            session.template()
        )),
        image_pull_policy: Some("Always".to_string()),
        env: Some(session_env(session)),
        ports: Some(vec![
            tcp_port("http", profile.port),
            tcp_port("grpc", GRPC_PORT),
        ]),
        volume_mounts: Some(vec![workspace_mount()]),
        ..Default::default()
    }
}

fn sidecar(session: &Session, config: &Config) -> Container {
    Container {
        name: SIDECAR_CONTAINER.to_string(),
        image: Some(config.images.sidecar.clone()),
        image_pull_policy: Some("Always".to_string()),
        env: Some(session_env(session)),
        ports: Some(vec![tcp_port("mcp-http", SIDECAR_PORT)]),
        volume_mounts: Some(vec![workspace_mount()]),
        ..Default::default()
    }
}

fn session_env(session: &Session) -> Vec<EnvVar> {
    vec![
        EnvVar {
            name: "REPL_ID".to_string(),
            value: Some(session.session_id().to_string()),
            ..Default::default()
        },
        EnvVar {
            name: "TEMPLATE".to_string(),
            value: Some(session.template().to_string()),
            ..Default::default()
        },
    ]
}

fn tcp_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

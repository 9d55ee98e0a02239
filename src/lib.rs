// Copyright 2025 The openstack-k8s-operators Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::context::Context;
use crate::error_policy::error_policy;
use crate::reconcile::reconcile_memcached;
use crate::types::v1beta1::memcached::Memcached;
use futures::StreamExt;
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;
use kube::CustomResourceExt;
use kube::runtime::{Controller, watcher};
use kube::{Api, Client};
use std::pin::Pin;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod context;
pub mod error_policy;
pub mod reconcile;
pub mod router;
pub mod types;
pub mod utils;


pub async fn run(config: context::Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_level(true)
        .with_file(true)
        .with_line_number(true)
        .with_target(true)
        .init();

    let client = Client::try_default().await?;
    let memcached_client = Api::<Memcached>::all(client.clone());

    info!(
        field_manager = %config.field_manager,
        error_requeue = ?config.error_requeue,
        "starting memcached controller"
    );
    let context = Context::new(client.clone(), config);

    let controller = Controller::new(memcached_client, watcher::Config::default());
    let secret_mapper = router::secret_mapper(controller.store());

    controller
        .owns(
            Api::<appsv1::StatefulSet>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<corev1::Service>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<corev1::ConfigMap>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<corev1::ServiceAccount>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<rbacv1::Role>::all(client.clone()),
            watcher::Config::default(),
        )
        .owns(
            Api::<rbacv1::RoleBinding>::all(client.clone()),
            watcher::Config::default(),
        )
        .watches(
            Api::<corev1::Secret>::all(client.clone()),
            watcher::Config::default(),
            secret_mapper,
        )
        .shutdown_on_signal()
        .run(reconcile_memcached, error_policy, Arc::new(context))
        .for_each(|res| async move {
            match res {
                Ok((memcached, _)) => info!("reconciled successful, object{:?}", memcached.name),
                Err(e) => warn!("reconcile failed: {}", e),
            }
        })
        .await;

    Ok(())
}

pub async fn crd(file: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer: Pin<Box<dyn AsyncWrite + Send>> = if let Some(file) = file {
        Box::pin(
            tokio::fs::OpenOptions::new()
                .create(true)
                .truncate(true)
                .write(true)
                .open(file)
                .await?,
        )
    } else {
        Box::pin(tokio::io::stdout())
    };

    writer
        .write_all(serde_yaml_ng::to_string(&Memcached::crd())?.as_bytes())
        .await?;

    Ok(())
}

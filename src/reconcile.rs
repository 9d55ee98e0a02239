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

use crate::config::{self, ConfigParams, ConfigRenderer};
use crate::context::{self, Context, ResourceStore};
use crate::types;
use crate::types::v1beta1::memcached::{
    Memcached, config_data_name, ready_replicas, server_lists, service_ip_family,
};
use crate::types::v1beta1::status::condition::*;
use crate::types::v1beta1::status::{INPUT_HASH_NAME, Status};
use crate::utils::{hash, tls};
use commit::StatusCommit;
use kube::runtime::controller::Action;
use snafu::{ResultExt, Snafu};
use std::sync::Arc;
use std::time::Duration;
use sync::sync_with_condition;
use tracing::{debug, info};

mod certificate;
mod commit;
mod rbac;
pub mod sync;

/// Requeue after writing RBAC objects or new input hashes.
const SHORT_REQUEUE: Duration = Duration::from_secs(1);

/// Requeue after the StatefulSet was created or changed.
const ROLLOUT_REQUEUE: Duration = Duration::from_secs(5);

#[derive(Snafu, Debug)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(transparent)]
    Context { source: context::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(display("secret '{}' not found in namespace '{}'", name, namespace))]
    SecretNotFound { name: String, namespace: String },

    #[snafu(display("secret '{}' holds an invalid certificate: {}", name, source))]
    InvalidCertificate { name: String, source: tls::Error },

    #[snafu(display("failed to render configuration: {}", source))]
    Render { source: config::Error },

    #[snafu(transparent)]
    Serde { source: serde_json::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Context { source } => source.is_not_found(),
            Error::SecretNotFound { .. } => true,
            _ => false,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Context { source } if source.is_conflict())
    }
}

/// Conditions every instance carries, in display order.
pub fn default_conditions() -> Vec<Condition> {
    [
        (ConditionType::Ready, READY_INIT_MESSAGE),
        (ConditionType::TlsInputReady, INPUT_READY_INIT_MESSAGE),
        (ConditionType::ExposeServiceReady, EXPOSE_SERVICE_READY_INIT_MESSAGE),
        (ConditionType::ServiceConfigReady, SERVICE_CONFIG_READY_INIT_MESSAGE),
        (ConditionType::DeploymentReady, DEPLOYMENT_READY_INIT_MESSAGE),
        (ConditionType::ServiceAccountReady, SERVICE_ACCOUNT_READY_INIT_MESSAGE),
        (ConditionType::RoleReady, ROLE_READY_INIT_MESSAGE),
        (ConditionType::RoleBindingReady, ROLE_BINDING_READY_INIT_MESSAGE),
    ]
    .into_iter()
    .map(|(type_, message)| Condition::unknown(type_, Reason::Init, message))
    .collect()
}

pub async fn reconcile_memcached(memcached: Arc<Memcached>, ctx: Arc<Context>) -> Result<Action, Error> {
    let namespace = memcached.namespace()?;
    reconcile_instance(ctx.as_ref(), &ctx.renderer, &memcached.name(), &namespace).await
}

/// Runs one reconcile pass for the instance `name` in `namespace`.
pub async fn reconcile_instance<S, R>(
    store: &S,
    renderer: &R,
    name: &str,
    namespace: &str,
) -> Result<Action, Error>
where
    S: ResourceStore,
    R: ConfigRenderer,
{
    let Some(latest) = store.get::<Memcached>(name, namespace).await? else {
        debug!(name, namespace, "memcached not found");
        return Ok(Action::await_change());
    };

    if latest.metadata.deletion_timestamp.is_some() {
        debug!(
            name,
            namespace,
            deletion_timestamp = ?latest.metadata.deletion_timestamp,
            "memcached is being deleted"
        );
        return Ok(Action::await_change());
    }

    let mut commit = StatusCommit::begin(latest);
    let instance = commit.instance().clone();
    prepare_status(&instance, &mut commit.status);

    let result = run_pass(store, renderer, &instance, &mut commit.status).await;
    commit.finish(store, result).await
}

fn prepare_status(instance: &Memcached, status: &mut Status) {
    status.conditions.init(default_conditions());
    status.conditions.set(Condition::unknown(
        ConditionType::Ready,
        Reason::Init,
        READY_INIT_MESSAGE,
    ));
    status.observed_generation = instance.metadata.generation.unwrap_or_default();
}

async fn run_pass<S, R>(
    store: &S,
    renderer: &R,
    instance: &Memcached,
    status: &mut Status,
) -> Result<Action, Error>
where
    S: ResourceStore,
    R: ConfigRenderer,
{
    let name = instance.name();
    let namespace = instance.namespace()?;
    let conditions = &mut status.conditions;

    // 1. service account, role and binding
    if rbac::ensure_rbac(store, instance, conditions).await? {
        info!(%name, %namespace, "rbac objects changed, requeue");
        return Ok(Action::requeue(SHORT_REQUEUE));
    }

    // 2. tls inputs
    let mut inputs = match certificate::tls_input_hashes(store, instance).await {
        Ok(inputs) => {
            conditions.mark_true(ConditionType::TlsInputReady, INPUT_READY_MESSAGE);
            inputs
        }
        Err(Error::SecretNotFound {
            name: secret,
            namespace: secret_namespace,
        }) => {
            info!(%name, %namespace, %secret, "tls secret not found, waiting");
            conditions.mark_false(
                ConditionType::TlsInputReady,
                Reason::Requested,
                Severity::Info,
                format!("{TLS_INPUT_READY_WAITING_MESSAGE}: secret {secret_namespace}/{secret} not found"),
            );
            return Ok(Action::await_change());
        }
        Err(e) => {
            conditions.mark_false(
                ConditionType::TlsInputReady,
                Reason::Error,
                Severity::Warning,
                format!("{TLS_INPUT_ERROR_MESSAGE}: {e}"),
            );
            return Err(e);
        }
    };

    // 3. configuration
    let files = match renderer
        .render(&ConfigParams::for_memcached(instance))
        .context(RenderSnafu)
    {
        Ok(files) => files,
        Err(e) => {
            conditions.mark_false(
                ConditionType::ServiceConfigReady,
                Reason::Error,
                Severity::Warning,
                format!("{SERVICE_CONFIG_READY_ERROR_MESSAGE}: {e}"),
            );
            return Err(e);
        }
    };
    let (_, config_map) = sync_with_condition(
        store,
        &instance.new_config_map(files),
        &namespace,
        conditions,
        ConditionType::ServiceConfigReady,
        SERVICE_CONFIG_READY_MESSAGE,
        SERVICE_CONFIG_READY_ERROR_MESSAGE,
    )
    .await?;
    inputs.insert(config_data_name(&name), hash::object_hash(&config_map.data)?);
    status.tls_support = instance.spec.tls.enabled();

    // 4. input hash
    let input_hash = hash::hash_of_input_hashes(&inputs)?;
    if status.hash.get(INPUT_HASH_NAME) != Some(&input_hash) {
        info!(%name, %namespace, %input_hash, "input hash changed");
        status.hash = inputs;
        status.hash.insert(INPUT_HASH_NAME.to_owned(), input_hash);
        return Ok(Action::requeue(SHORT_REQUEUE));
    }

    let conditions = &mut status.conditions;

    // 5. headless service and server lists
    let (_, service) = sync_with_condition(
        store,
        &instance.new_headless_service(),
        &namespace,
        conditions,
        ConditionType::ExposeServiceReady,
        EXPOSE_SERVICE_READY_MESSAGE,
        EXPOSE_SERVICE_READY_ERROR_MESSAGE,
    )
    .await?;
    let (server_list, server_list_with_inet) = server_lists(instance, service_ip_family(&service));
    status.server_list = server_list;
    status.server_list_with_inet = server_list_with_inet;

    // 6. statefulset
    let (outcome, statefulset) =
        sync::sync_resource(store, &instance.new_statefulset(&input_hash), &namespace).await?;

    status.ready_count = ready_replicas(&statefulset);
    let conditions = &mut status.conditions;
    if status.ready_count > 0 {
        conditions.mark_true(ConditionType::DeploymentReady, DEPLOYMENT_READY_MESSAGE);
    } else {
        conditions.mark_false(
            ConditionType::DeploymentReady,
            Reason::Requested,
            Severity::Info,
            DEPLOYMENT_READY_RUNNING_MESSAGE,
        );
    }

    if conditions.all_sub_conditions_true() {
        conditions.mark_true(ConditionType::Ready, READY_MESSAGE);
    }

    if outcome.is_pending() {
        Ok(Action::requeue(ROLLOUT_REQUEUE))
    } else {
        Ok(Action::await_change())
    }
}

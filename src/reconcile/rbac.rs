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

use super::Error;
use super::sync::{SyncOutcome, sync_with_condition};
use crate::context::ResourceStore;
use crate::types::v1beta1::memcached::Memcached;
use crate::types::v1beta1::status::condition::{
    ConditionType, Conditions, ROLE_BINDING_READY_ERROR_MESSAGE, ROLE_BINDING_READY_MESSAGE,
    ROLE_READY_ERROR_MESSAGE, ROLE_READY_MESSAGE, SERVICE_ACCOUNT_READY_ERROR_MESSAGE,
    SERVICE_ACCOUNT_READY_MESSAGE,
};

/// Syncs the ServiceAccount, Role and RoleBinding of the memcached pods, in
/// that order. Returns whether any of them was written.
pub(super) async fn ensure_rbac<S: ResourceStore>(
    store: &S,
    memcached: &Memcached,
    conditions: &mut Conditions,
) -> Result<bool, Error> {
    let namespace = memcached.namespace()?;

    let (service_account, _) = sync_with_condition(
        store,
        &memcached.new_service_account(),
        &namespace,
        conditions,
        ConditionType::ServiceAccountReady,
        SERVICE_ACCOUNT_READY_MESSAGE,
        SERVICE_ACCOUNT_READY_ERROR_MESSAGE,
    )
    .await?;

    let (role, _) = sync_with_condition(
        store,
        &memcached.new_role(),
        &namespace,
        conditions,
        ConditionType::RoleReady,
        ROLE_READY_MESSAGE,
        ROLE_READY_ERROR_MESSAGE,
    )
    .await?;

    let (role_binding, _) = sync_with_condition(
        store,
        &memcached.new_role_binding(),
        &namespace,
        conditions,
        ConditionType::RoleBindingReady,
        ROLE_BINDING_READY_MESSAGE,
        ROLE_BINDING_READY_ERROR_MESSAGE,
    )
    .await?;

    Ok([service_account, role, role_binding]
        .into_iter()
        .any(SyncOutcome::is_pending))
}

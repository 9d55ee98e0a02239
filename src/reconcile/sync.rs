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
use crate::context::{self, Managed, ResourceStore};
use crate::types::v1beta1::status::condition::{ConditionType, Conditions, Reason, Severity};
use kube::ResourceExt;
use serde_json::Value;
use tracing::{debug, info};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncOutcome {
    Created,
    Updated,
    Unchanged,
}

impl SyncOutcome {
    /// The object was written during this pass and may not be observable yet.
    pub fn is_pending(self) -> bool {
        !matches!(self, SyncOutcome::Unchanged)
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Reports whether every field set in `desired` has the same value in
/// `current`. Arrays must match element by element.
pub(crate) fn is_subset(desired: &Value, current: &Value) -> bool {
    match (desired, current) {
        (Value::Object(desired), Value::Object(current)) => desired.iter().all(|(key, value)| {
            match current.get(key) {
                Some(current) => is_subset(value, current),
                None => is_empty(value),
            }
        }),
        (Value::Array(desired), Value::Array(current)) => {
            desired.len() == current.len()
                && desired.iter().zip(current).all(|(d, c)| is_subset(d, c))
        }
        (desired, current) => desired == current,
    }
}

/// Creates `desired` when absent, applies it when the live object drifted,
/// and returns the live object.
pub async fn sync_resource<S, K>(
    store: &S,
    desired: &K,
    namespace: &str,
) -> Result<(SyncOutcome, K), context::Error>
where
    S: ResourceStore,
    K: Managed,
{
    let name = desired.name_any();
    let kind = K::kind(&());

    let Some(current) = store.get::<K>(&name, namespace).await? else {
        let created = store.create(desired, namespace).await?;
        info!(%kind, %name, namespace, "created");
        return Ok((SyncOutcome::Created, created));
    };

    if is_subset(&serde_json::to_value(desired)?, &serde_json::to_value(&current)?) {
        debug!(%kind, %name, namespace, "up to date");
        return Ok((SyncOutcome::Unchanged, current));
    }

    let updated = store.patch(desired, namespace).await?;
    info!(%kind, %name, namespace, "updated");
    Ok((SyncOutcome::Updated, updated))
}

/// [`sync_resource`] that records the result in the condition `type_`.
pub(super) async fn sync_with_condition<S, K>(
    store: &S,
    desired: &K,
    namespace: &str,
    conditions: &mut Conditions,
    type_: ConditionType,
    ready_message: &str,
    error_message: &str,
) -> Result<(SyncOutcome, K), Error>
where
    S: ResourceStore,
    K: Managed,
{
    match sync_resource(store, desired, namespace).await {
        Ok(synced) => {
            conditions.mark_true(type_, ready_message);
            Ok(synced)
        }
        Err(source) => {
            conditions.mark_false(
                type_,
                Reason::Error,
                Severity::Warning,
                format!("{error_message}: {source}"),
            );
            Err(source.into())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{MemoryStore, create_test_memcached};
    use serde_json::json;

    #[test]
    fn test_is_subset() {
        let current = json!({
            "metadata": {"name": "a", "uid": "x", "labels": {"app": "memcached"}},
            "spec": {"ports": [{"port": 11211, "protocol": "TCP"}]}
        });

        assert!(is_subset(
            &json!({"metadata": {"name": "a"}, "spec": {"ports": [{"port": 11211}]}}),
            &current
        ));
        assert!(is_subset(&json!({"metadata": {"annotations": {}}}), &current));
        assert!(!is_subset(&json!({"spec": {"ports": [{"port": 11212}]}}), &current));
        assert!(!is_subset(&json!({"spec": {"ports": []}}), &current));
        assert!(!is_subset(&json!({"metadata": {"labels": {"app": "other"}}}), &current));
    }

    #[tokio::test]
    async fn test_sync_resource_create_update_unchanged() {
        let store = MemoryStore::default();
        let memcached = create_test_memcached("cache", "ns", Some(1));
        let desired = memcached.new_service_account();

        let (outcome, _) = sync_resource(&store, &desired, "ns").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Created);
        assert!(outcome.is_pending());

        let (outcome, _) = sync_resource(&store, &desired, "ns").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Unchanged);
        assert!(!outcome.is_pending());

        let mut changed = desired.clone();
        changed.automount_service_account_token = Some(true);
        let (outcome, live) = sync_resource(&store, &changed, "ns").await.unwrap();
        assert_eq!(outcome, SyncOutcome::Updated);
        assert_eq!(live.automount_service_account_token, Some(true));

        assert_eq!(store.creates(), 1);
        assert_eq!(store.patches(), 1);
    }
}

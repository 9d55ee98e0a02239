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
use crate::context::ResourceStore;
use crate::types::v1beta1::memcached::Memcached;
use crate::types::v1beta1::status::Status;
use crate::types::v1beta1::status::condition::{ConditionType, Conditions};
use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use tracing::{info, warn};

/// Status of one reconcile pass, written back whatever the pass outcome.
///
/// Created right after the instance is fetched. The pass mutates
/// [`StatusCommit::status`] and hands its result to [`StatusCommit::finish`].
pub(super) struct StatusCommit {
    instance: Memcached,
    saved: Conditions,
    pub(super) status: Status,
}

impl StatusCommit {
    pub(super) fn begin(mut instance: Memcached) -> Self {
        let status = instance.status.take().unwrap_or_default();
        Self {
            instance,
            saved: status.conditions.clone(),
            status,
        }
    }

    pub(super) fn instance(&self) -> &Memcached {
        &self.instance
    }

    /// Mirrors Ready when the pass left it undecided, keeps the transition
    /// time of every condition whose status did not move, and replaces the
    /// status subresource. A failed write takes precedence over `result`.
    pub(super) async fn finish<S: ResourceStore>(
        self,
        store: &S,
        result: Result<Action, Error>,
    ) -> Result<Action, Error> {
        let Self {
            mut instance,
            saved,
            mut status,
        } = self;

        if status.conditions.is_unknown(ConditionType::Ready)
            && let Some(ready) = status.conditions.mirror(ConditionType::Ready)
        {
            status.conditions.set(ready);
        }
        status.conditions.restore_last_transition_times(&saved);

        let became_ready = status.conditions.is_true(ConditionType::Ready)
            && !saved.is_true(ConditionType::Ready);
        instance.status = Some(status);

        if let Err(e) = store.replace_status(&instance).await {
            warn!(name = %instance.name(), error = %e, "status commit failed");
            return Err(e.into());
        }

        if became_ready {
            info!(name = %instance.name(), "memcached is ready");
            publish(store, &instance, EventType::Normal, "Ready", "Memcached is ready").await;
        }
        if let Err(e) = &result {
            publish(
                store,
                &instance,
                EventType::Warning,
                "ReconcileFailed",
                &e.to_string(),
            )
            .await;
        }

        result
    }
}

async fn publish<S: ResourceStore>(
    store: &S,
    instance: &Memcached,
    event_type: EventType,
    reason: &str,
    note: &str,
) {
    if let Err(e) = store.publish_event(instance, event_type, reason, note).await {
        warn!(name = %instance.name(), error = %e, "failed to publish event");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{MemoryStore, create_test_memcached};
    use crate::types::v1beta1::status::condition::{
        Condition, ConditionStatus, READY_INIT_MESSAGE, Reason, Severity,
    };

    #[tokio::test]
    async fn test_finish_mirrors_ready() {
        let store = MemoryStore::default();
        store.insert(&create_test_memcached("cache", "ns", Some(1)));
        let instance = store.memcached("cache", "ns");

        let mut commit = StatusCommit::begin(instance);
        commit.status.conditions.init([
            Condition::unknown(ConditionType::Ready, Reason::Init, READY_INIT_MESSAGE),
            Condition::unknown(ConditionType::DeploymentReady, Reason::Init, "not started"),
        ]);
        commit.status.conditions.mark_false(
            ConditionType::DeploymentReady,
            Reason::Error,
            Severity::Error,
            "boom",
        );

        let action = commit
            .finish(&store, Ok(Action::await_change()))
            .await
            .unwrap();
        assert_eq!(action, Action::await_change());

        let stored = store.memcached("cache", "ns");
        let ready = stored
            .status
            .unwrap()
            .conditions
            .get(ConditionType::Ready)
            .cloned()
            .unwrap();
        assert_eq!(ready.status, ConditionStatus::False);
        assert_eq!(ready.message, "boom");
        assert_eq!(store.status_writes(), 1);
    }

    #[tokio::test]
    async fn test_commit_error_overrides_result() {
        let store = MemoryStore::default();
        store.insert(&create_test_memcached("cache", "ns", Some(1)));
        let instance = store.memcached("cache", "ns");
        store.fail_status_writes();

        let result = StatusCommit::begin(instance)
            .finish(&store, Ok(Action::await_change()))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_stale_commit_conflicts() {
        let store = MemoryStore::default();
        store.insert(&create_test_memcached("cache", "ns", Some(1)));
        let stale = store.memcached("cache", "ns");

        StatusCommit::begin(store.memcached("cache", "ns"))
            .finish(&store, Ok(Action::await_change()))
            .await
            .unwrap();

        let err = StatusCommit::begin(stale)
            .finish(&store, Ok(Action::await_change()))
            .await
            .unwrap_err();
        assert!(err.is_conflict());
    }
}

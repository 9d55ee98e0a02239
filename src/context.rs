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

use crate::config::KollaRenderer;
use crate::types;
use crate::types::v1beta1::memcached::{FIELD_MANAGER, Memcached};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Patch, PatchParams, PostParams};
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::{Resource, ResourceExt, api::Api};
use serde::Serialize;
use serde::de::DeserializeOwned;
use snafu::Snafu;
use snafu::futures::TryFutureExt;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Kubernetes API error: {}", source))]
    Kube { source: kube::Error },

    #[snafu(display("record event error: {}", source))]
    Record { source: kube::Error },

    #[snafu(transparent)]
    Types { source: types::error::Error },

    #[snafu(transparent)]
    Serde { source: serde_json::Error },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(e) } if e.code == 404)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Kube { source: kube::Error::Api(e) } if e.code == 409)
    }
}

/// Namespaced kinds the reconciler reads and writes.
pub trait Managed:
    Resource<Scope = NamespaceResourceScope, DynamicType = ()>
    + Clone
    + Serialize
    + DeserializeOwned
    + Debug
    + Send
    + Sync
    + 'static
{
}

impl<T> Managed for T where
    T: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
        + Clone
        + Serialize
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + 'static
{
}

/// Everything a reconcile pass needs from the cluster.
///
/// `get` reports absence as `Ok(None)`. `replace_status` must carry the
/// resourceVersion of the given object so a stale write fails.
pub trait ResourceStore: Send + Sync {
    fn get<K: Managed>(
        &self,
        name: &str,
        namespace: &str,
    ) -> impl Future<Output = Result<Option<K>, Error>> + Send;

    fn create<K: Managed>(
        &self,
        resource: &K,
        namespace: &str,
    ) -> impl Future<Output = Result<K, Error>> + Send;

    /// server side apply of `resource` with the operator field manager
    fn patch<K: Managed>(
        &self,
        resource: &K,
        namespace: &str,
    ) -> impl Future<Output = Result<K, Error>> + Send;

    fn replace_status(
        &self,
        memcached: &Memcached,
    ) -> impl Future<Output = Result<Memcached, Error>> + Send;

    fn publish_event(
        &self,
        memcached: &Memcached,
        event_type: EventType,
        reason: &str,
        note: &str,
    ) -> impl Future<Output = Result<(), Error>> + Send;
}

/// Settings of the `server` subcommand.
#[derive(Clone, Debug)]
pub struct Config {
    /// Requeue delay after a failed pass.
    pub error_requeue: Duration,

    pub field_manager: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            error_requeue: Duration::from_secs(5),
            field_manager: FIELD_MANAGER.to_owned(),
        }
    }
}

pub struct Context {
    pub(crate) client: kube::Client,
    pub(crate) recorder: Recorder,
    pub(crate) renderer: KollaRenderer,
    pub(crate) config: Config,
}

impl Context {
    pub fn new(client: kube::Client, config: Config) -> Self {
        let reporter = Reporter {
            controller: config.field_manager.clone(),
            instance: std::env::var("HOSTNAME").ok(),
        };

        let recorder = Recorder::new(client.clone(), reporter);
        Self {
            client,
            recorder,
            renderer: KollaRenderer,
            config,
        }
    }

    fn api<K: Managed>(&self, namespace: &str) -> Api<K> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

impl ResourceStore for Context {
    async fn get<K: Managed>(&self, name: &str, namespace: &str) -> Result<Option<K>, Error> {
        self.api::<K>(namespace)
            .get_opt(name)
            .context(KubeSnafu)
            .await
    }

    async fn create<K: Managed>(&self, resource: &K, namespace: &str) -> Result<K, Error> {
        debug!(kind = %K::kind(&()), name = %resource.name_any(), namespace, "create");
        self.api::<K>(namespace)
            .create(&PostParams::default(), resource)
            .context(KubeSnafu)
            .await
    }

    async fn patch<K: Managed>(&self, resource: &K, namespace: &str) -> Result<K, Error> {
        debug!(kind = %K::kind(&()), name = %resource.name_any(), namespace, "apply");
        self.api::<K>(namespace)
            .patch(
                &resource.name_any(),
                &PatchParams::apply(&self.config.field_manager).force(),
                &Patch::Apply(resource),
            )
            .context(KubeSnafu)
            .await
    }

    async fn replace_status(&self, memcached: &Memcached) -> Result<Memcached, Error> {
        let api: Api<Memcached> = Api::namespaced(self.client.clone(), &memcached.namespace()?);
        api.replace_status(&memcached.name(), &PostParams::default(), memcached)
            .context(KubeSnafu)
            .await
    }

    async fn publish_event(
        &self,
        memcached: &Memcached,
        event_type: EventType,
        reason: &str,
        note: &str,
    ) -> Result<(), Error> {
        self.recorder
            .publish(
                &Event {
                    type_: event_type,
                    reason: reason.to_owned(),
                    note: Some(note.to_owned()),
                    action: "Reconcile".into(),
                    secondary: None,
                },
                &memcached.object_ref(&()),
            )
            .context(RecordSnafu)
            .await
    }
}

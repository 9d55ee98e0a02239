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

//! Routes Secret changes to the Memcached instances that reference them.

use crate::types::v1beta1::memcached::Memcached;
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;
use kube::runtime::reflector::{ObjectRef, Store};
use std::borrow::Borrow;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// (namespace, secret name) → names of the instances referencing the secret
type Index = BTreeMap<(String, String), BTreeSet<String>>;

/// Reverse index from secrets to the instances that use them.
///
/// `ca` holds `tls.caBundleSecretName` references, `cert` holds
/// `tls.secretName` references of instances with TLS enabled. Instances only
/// reference secrets in their own namespace.
#[derive(Clone, Debug, Default)]
pub struct SecretIndex {
    ca: Index,
    cert: Index,
}

fn add(index: &mut Index, namespace: &str, secret: &str, instance: &str) {
    index
        .entry((namespace.to_owned(), secret.to_owned()))
        .or_default()
        .insert(instance.to_owned());
}

fn drop_instance(index: &mut Index, namespace: &str, instance: &str) {
    index.retain(|(ns, _), instances| {
        if ns == namespace {
            instances.remove(instance);
        }
        !instances.is_empty()
    });
}

fn refs<'a>(
    index: &'a Index,
    namespace: &'a str,
    secret: &str,
) -> impl Iterator<Item = ObjectRef<Memcached>> + 'a {
    index
        .get(&(namespace.to_owned(), secret.to_owned()))
        .into_iter()
        .flatten()
        .map(move |name| ObjectRef::new(name).within(namespace))
}

impl SecretIndex {
    pub fn from_instances<I>(instances: I) -> Self
    where
        I: IntoIterator,
        I::Item: Borrow<Memcached>,
    {
        let mut index = Self::default();
        for memcached in instances {
            index.insert(memcached.borrow());
        }
        index
    }

    /// Records the secret references of `memcached`, replacing older ones.
    pub fn insert(&mut self, memcached: &Memcached) {
        let Some(namespace) = ResourceExt::namespace(memcached) else {
            return;
        };
        let name = memcached.name();
        self.remove(memcached);

        if let Some(secret) = memcached.spec.tls.ca_bundle_secret_name() {
            add(&mut self.ca, &namespace, secret, &name);
        }
        if let Some(secret) = memcached.spec.tls.cert_secret_name() {
            add(&mut self.cert, &namespace, secret, &name);
        }
    }

    pub fn remove(&mut self, memcached: &Memcached) {
        let Some(namespace) = ResourceExt::namespace(memcached) else {
            return;
        };
        let name = memcached.name();
        drop_instance(&mut self.ca, &namespace, &name);
        drop_instance(&mut self.cert, &namespace, &name);
    }

    /// One request per CA bundle match followed by one per certificate match.
    /// An instance using the secret for both appears twice.
    pub fn requests_for(&self, namespace: &str, secret: &str) -> Vec<ObjectRef<Memcached>> {
        refs(&self.ca, namespace, secret)
            .chain(refs(&self.cert, namespace, secret))
            .collect()
    }
}

/// Mapper for the controller's Secret watch. The index is rebuilt from the
/// reflector cache on every event so it follows instance changes.
pub fn secret_mapper(
    instances: Store<Memcached>,
) -> impl Fn(corev1::Secret) -> Vec<ObjectRef<Memcached>> + Send + Sync + 'static {
    move |secret| {
        let Some(namespace) = secret.namespace() else {
            return Vec::new();
        };
        let name = secret.name_any();
        let requests = SecretIndex::from_instances(instances.state()).requests_for(&namespace, &name);

        if !requests.is_empty() {
            debug!(%namespace, secret = %name, count = requests.len(), "secret changed");
        }
        requests
    }
}

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

use crate::types;
use crate::types::error::NoNamespaceSnafu;
use crate::types::v1beta1::tls::TlsSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use kube::{CustomResource, Resource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::OptionExt;
use std::collections::BTreeMap;

mod config;
mod rbac;
mod services;
mod workloads;

pub use config::config_data_name;
pub use services::{server_lists, service_ip_family};
pub use workloads::{CONFIG_HASH_ENV, ready_replicas};
pub(crate) use workloads::{CA_BUNDLE_PATH, CERT_PATH, KEY_PATH};

pub const GROUP: &str = "memcached.openstack.org";

/// Plain (non TLS) memcached listener, always exposed.
pub const MEMCACHED_PORT: i32 = 11211;

/// TLS listener, only exposed when TLS is enabled.
pub const MEMCACHED_TLS_PORT: i32 = 11212;

pub const DEFAULT_IMAGE: &str =
    "quay.io/podified-antelope-centos9/openstack-memcached:current-podified";

const APP_LABEL: &str = "app";
const APP_NAME: &str = "memcached";
const OWNER_LABEL: &str = const_str::concat!(GROUP, "/name");
const MANAGED_BY_LABEL: &str = "app.kubernetes.io/managed-by";
pub(crate) const FIELD_MANAGER: &str = "memcached-operator";

#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema, Default)]
#[kube(
    group = "memcached.openstack.org",
    version = "v1beta1",
    kind = "Memcached",
    namespaced,
    status = "crate::types::v1beta1::status::Status",
    shortname = "mc",
    plural = "memcacheds",
    singular = "memcached",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#,
    printcolumn = r#"{"name":"Replicas", "type":"integer", "jsonPath":".status.readyCount"}"#,
    printcolumn = r#"{"name":"Age", "type":"date", "jsonPath":".metadata.creationTimestamp"}"#,
    crates(serde_json = "k8s_openapi::serde_json")
)]
#[serde(rename_all = "camelCase")]
pub struct MemcachedSpec {
    /// Memcached container image, defaults to the podified antelope build.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_image: Option<String>,

    /// Number of memcached pods. Defaults to 1.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default)]
    pub tls: TlsSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
}

impl Memcached {
    pub fn namespace(&self) -> Result<String, types::error::Error> {
        ResourceExt::namespace(self).context(NoNamespaceSnafu)
    }

    pub fn name(&self) -> String {
        ResourceExt::name_any(self)
    }

    pub fn replicas(&self) -> i32 {
        self.spec.replicas.unwrap_or(1).max(0)
    }

    pub fn image(&self) -> String {
        self.spec
            .container_image
            .clone()
            .filter(|image| !image.is_empty())
            .unwrap_or_else(|| DEFAULT_IMAGE.to_owned())
    }

    /// Port clients should use: the TLS listener when TLS is on.
    pub fn client_port(&self) -> i32 {
        if self.spec.tls.enabled() {
            MEMCACHED_TLS_PORT
        } else {
            MEMCACHED_PORT
        }
    }

    /// a new owner reference for memcached
    pub fn new_owner_ref(&self) -> metav1::OwnerReference {
        metav1::OwnerReference {
            api_version: Self::api_version(&()).to_string(),
            kind: Self::kind(&()).to_string(),
            name: self.name(),
            uid: self.meta().uid.clone().unwrap_or_default(),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        [
            (APP_LABEL.to_owned(), APP_NAME.to_owned()),
            (OWNER_LABEL.to_owned(), self.name()),
        ]
        .into_iter()
        .collect()
    }

    pub fn common_labels(&self) -> BTreeMap<String, String> {
        let mut labels = self.selector_labels();
        labels.insert(MANAGED_BY_LABEL.to_owned(), FIELD_MANAGER.to_owned());
        labels
    }

    pub(crate) fn object_meta(&self, name: String) -> metav1::ObjectMeta {
        metav1::ObjectMeta {
            name: Some(name),
            namespace: self.namespace().ok(),
            owner_references: Some(vec![self.new_owner_ref()]),
            labels: Some(self.common_labels()),
            ..Default::default()
        }
    }

    /// The headless service and the statefulset share the instance name so
    /// pods resolve as `<name>-<i>.<name>.<namespace>.svc`.
    pub fn service_name(&self) -> String {
        self.name()
    }

    pub fn statefulset_name(&self) -> String {
        self.name()
    }

    pub fn service_account_name(&self) -> String {
        format!("memcached-{}", self.name())
    }

    pub fn role_name(&self) -> String {
        format!("{}-role", self.service_account_name())
    }

    pub fn role_binding_name(&self) -> String {
        format!("{}-rolebinding", self.service_account_name())
    }
}

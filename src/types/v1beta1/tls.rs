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

use crate::types::error::{Error, MissingSecretKeySnafu};
use k8s_openapi::api::core::v1 as corev1;
use kube::ResourceExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use snafu::OptionExt;

/// Key of the CA bundle inside the `caBundleSecretName` secret.
pub const CA_BUNDLE_KEY: &str = "tls-ca-bundle.pem";
pub const CERT_KEY: &str = "tls.crt";
pub const PRIVATE_KEY_KEY: &str = "tls.key";

/// TLS settings of a Memcached instance.
///
/// Both secrets live in the instance namespace. Setting `secretName` turns TLS
/// on; `caBundleSecretName` can be used on its own to ship a CA bundle.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TlsSpec {
    /// Secret holding `tls-ca-bundle.pem`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle_secret_name: Option<String>,

    /// Secret holding the server `tls.crt`/`tls.key` pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl TlsSpec {
    pub fn enabled(&self) -> bool {
        self.cert_secret_name().is_some()
    }

    pub fn ca_bundle_secret_name(&self) -> Option<&str> {
        non_empty(&self.ca_bundle_secret_name)
    }

    pub fn cert_secret_name(&self) -> Option<&str> {
        non_empty(&self.secret_name)
    }
}

/// Returns the raw bytes stored under `key`, failing when the entry is absent
/// or empty.
pub fn secret_value<'a>(secret: &'a corev1::Secret, key: &str) -> Result<&'a [u8], Error> {
    secret
        .data
        .as_ref()
        .and_then(|data| data.get(key))
        .map(|value| value.0.as_slice())
        .filter(|value| !value.is_empty())
        .context(MissingSecretKeySnafu {
            secret: secret.name_any(),
            key,
        })
}

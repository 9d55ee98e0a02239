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

pub mod condition;

use condition::Conditions;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key of the combined fingerprint inside [`Status::hash`].
pub const INPUT_HASH_NAME: &str = "input";

/// Fingerprint of the CA bundle secret.
pub const CA_HASH_NAME: &str = "CA";

/// Fingerprint of the server certificate secret.
pub const CERT_HASH_NAME: &str = "Cert";

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    #[serde(default)]
    pub conditions: Conditions,

    #[serde(default)]
    pub observed_generation: i64,

    /// Fingerprints of every input that requires a pod restart when it changes.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub hash: BTreeMap<String, String>,

    /// `host:port` of every memcached pod.
    #[serde(default)]
    pub server_list: Vec<String>,

    /// Same as `server_list` with the `inet:`/`inet6:` prefix some clients need.
    #[serde(default)]
    pub server_list_with_inet: Vec<String>,

    #[serde(default)]
    pub ready_count: i32,

    #[serde(default)]
    pub tls_support: bool,
}

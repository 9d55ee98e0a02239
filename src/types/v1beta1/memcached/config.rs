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

use super::Memcached;
use k8s_openapi::api::core::v1 as corev1;
use std::collections::BTreeMap;

pub fn config_data_name(instance_name: &str) -> String {
    format!("{instance_name}-config-data")
}

impl Memcached {
    pub fn config_map_name(&self) -> String {
        config_data_name(&self.name())
    }

    /// a new ConfigMap carrying the rendered configuration files
    pub fn new_config_map(&self, files: BTreeMap<String, String>) -> corev1::ConfigMap {
        corev1::ConfigMap {
            metadata: self.object_meta(self.config_map_name()),
            data: Some(files),
            ..Default::default()
        }
    }
}

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
use k8s_openapi::Resource as _;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::api::rbac::v1 as rbacv1;

fn verbs(verbs: &[&str]) -> Vec<String> {
    verbs.iter().map(|v| (*v).to_owned()).collect()
}

impl Memcached {
    pub fn new_service_account(&self) -> corev1::ServiceAccount {
        corev1::ServiceAccount {
            metadata: self.object_meta(self.service_account_name()),
            ..Default::default()
        }
    }

    /// Role of the memcached pods: run as anyuid on OpenShift and manage
    /// their own pods.
    pub fn new_role(&self) -> rbacv1::Role {
        rbacv1::Role {
            metadata: self.object_meta(self.role_name()),
            rules: Some(vec![
                rbacv1::PolicyRule {
                    api_groups: Some(vec!["security.openshift.io".to_owned()]),
                    resource_names: Some(vec!["anyuid".to_owned()]),
                    resources: Some(vec!["securitycontextconstraints".to_owned()]),
                    verbs: verbs(&["use"]),
                    ..Default::default()
                },
                rbacv1::PolicyRule {
                    api_groups: Some(vec![String::new()]),
                    resources: Some(vec!["pods".to_owned()]),
                    verbs: verbs(&[
                        "create", "get", "list", "watch", "update", "patch", "delete",
                    ]),
                    ..Default::default()
                },
            ]),
        }
    }

    pub fn new_role_binding(&self) -> rbacv1::RoleBinding {
        rbacv1::RoleBinding {
            metadata: self.object_meta(self.role_binding_name()),
            subjects: Some(vec![rbacv1::Subject {
                kind: corev1::ServiceAccount::KIND.to_owned(),
                namespace: self.namespace().ok(),
                name: self.service_account_name(),
                ..Default::default()
            }]),
            role_ref: rbacv1::RoleRef {
                api_group: rbacv1::Role::GROUP.to_owned(),
                kind: rbacv1::Role::KIND.to_owned(),
                name: self.role_name(),
            },
        }
    }
}

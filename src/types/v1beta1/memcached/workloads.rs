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

use super::{MEMCACHED_PORT, MEMCACHED_TLS_PORT, Memcached};
use crate::types::v1beta1::tls::{CA_BUNDLE_KEY, CERT_KEY, PRIVATE_KEY_KEY};
use k8s_openapi::api::apps::v1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1 as metav1;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

/// Env var carrying the combined input hash. Changing it rolls the pods.
pub const CONFIG_HASH_ENV: &str = "CONFIG_HASH";

const CONFIG_VOLUME: &str = "config-data";
const KOLLA_CONFIG_PATH: &str = "/var/lib/kolla/config_files/config.json";
const SYSCONFIG_PATH: &str = "/etc/sysconfig/memcached";
const CERT_VOLUME: &str = "memcached-tls-certs";
const CA_VOLUME: &str = "combined-ca-bundle";
pub(crate) const CERT_PATH: &str = "/etc/pki/tls/certs/memcached.crt";
pub(crate) const KEY_PATH: &str = "/etc/pki/tls/private/memcached.key";
pub(crate) const CA_BUNDLE_PATH: &str = "/etc/pki/ca-trust/extracted/pem/tls-ca-bundle.pem";

fn sub_path_mount(volume: &str, mount_path: &str, key: &str) -> corev1::VolumeMount {
    corev1::VolumeMount {
        name: volume.to_owned(),
        mount_path: mount_path.to_owned(),
        sub_path: Some(key.to_owned()),
        read_only: Some(true),
        ..Default::default()
    }
}

fn secret_volume(name: &str, secret_name: &str) -> corev1::Volume {
    corev1::Volume {
        name: name.to_owned(),
        secret: Some(corev1::SecretVolumeSource {
            secret_name: Some(secret_name.to_owned()),
            default_mode: Some(0o400),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn tcp_probe(initial_delay_seconds: i32) -> corev1::Probe {
    corev1::Probe {
        tcp_socket: Some(corev1::TCPSocketAction {
            port: IntOrString::Int(MEMCACHED_PORT),
            ..Default::default()
        }),
        initial_delay_seconds: Some(initial_delay_seconds),
        period_seconds: Some(10),
        timeout_seconds: Some(5),
        ..Default::default()
    }
}

impl Memcached {
    fn volumes_and_mounts(&self) -> (Vec<corev1::Volume>, Vec<corev1::VolumeMount>) {
        let mut volumes = vec![corev1::Volume {
            name: CONFIG_VOLUME.to_owned(),
            config_map: Some(corev1::ConfigMapVolumeSource {
                name: self.config_map_name(),
                ..Default::default()
            }),
            ..Default::default()
        }];
        let mut mounts = vec![
            sub_path_mount(CONFIG_VOLUME, KOLLA_CONFIG_PATH, "config.json"),
            sub_path_mount(CONFIG_VOLUME, SYSCONFIG_PATH, "memcached"),
        ];

        // the CA bundle is only used by the TLS listener
        if let Some(secret) = self.spec.tls.cert_secret_name() {
            volumes.push(secret_volume(CERT_VOLUME, secret));
            mounts.push(sub_path_mount(CERT_VOLUME, CERT_PATH, CERT_KEY));
            mounts.push(sub_path_mount(CERT_VOLUME, KEY_PATH, PRIVATE_KEY_KEY));

            if let Some(secret) = self.spec.tls.ca_bundle_secret_name() {
                volumes.push(secret_volume(CA_VOLUME, secret));
                mounts.push(sub_path_mount(CA_VOLUME, CA_BUNDLE_PATH, CA_BUNDLE_KEY));
            }
        }

        (volumes, mounts)
    }

    /// a new StatefulSet running the memcached pods.
    ///
    /// `input_hash` is the combined fingerprint of every restart relevant
    /// input; it lands in the pod template so a change recreates the pods.
    pub fn new_statefulset(&self, input_hash: &str) -> v1::StatefulSet {
        let labels = self.common_labels();
        let (volumes, volume_mounts) = self.volumes_and_mounts();

        let mut ports = vec![corev1::ContainerPort {
            container_port: MEMCACHED_PORT,
            name: Some("memcached".to_owned()),
            protocol: Some("TCP".to_owned()),
            ..Default::default()
        }];
        if self.spec.tls.enabled() {
            ports.push(corev1::ContainerPort {
                container_port: MEMCACHED_TLS_PORT,
                name: Some("memcached-tls".to_owned()),
                protocol: Some("TCP".to_owned()),
                ..Default::default()
            });
        }

        let env = vec![
            corev1::EnvVar {
                name: "KOLLA_CONFIG_STRATEGY".to_owned(),
                value: Some("COPY_ALWAYS".to_owned()),
                ..Default::default()
            },
            corev1::EnvVar {
                name: "POD_IP".to_owned(),
                value_from: Some(corev1::EnvVarSource {
                    field_ref: Some(corev1::ObjectFieldSelector {
                        field_path: "status.podIP".to_owned(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            },
            corev1::EnvVar {
                name: CONFIG_HASH_ENV.to_owned(),
                value: Some(input_hash.to_owned()),
                ..Default::default()
            },
        ];

        let container = corev1::Container {
            name: "memcached".to_owned(),
            image: Some(self.image()),
            command: Some(vec![
                "/usr/bin/dumb-init".to_owned(),
                "--".to_owned(),
                "/usr/local/bin/kolla_start".to_owned(),
            ]),
            env: Some(env),
            ports: Some(ports),
            volume_mounts: Some(volume_mounts),
            readiness_probe: Some(tcp_probe(5)),
            liveness_probe: Some(tcp_probe(3)),
            ..Default::default()
        };

        v1::StatefulSet {
            metadata: self.object_meta(self.statefulset_name()),
            spec: Some(v1::StatefulSetSpec {
                replicas: Some(self.replicas()),
                service_name: Some(self.service_name()),
                pod_management_policy: Some("Parallel".to_owned()),
                selector: metav1::LabelSelector {
                    match_labels: Some(self.selector_labels()),
                    ..Default::default()
                },
                template: corev1::PodTemplateSpec {
                    metadata: Some(metav1::ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(corev1::PodSpec {
                        service_account_name: Some(self.service_account_name()),
                        containers: vec![container],
                        volumes: Some(volumes),
                        node_selector: self.spec.node_selector.clone(),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Observed ready pods of a statefulset as reported by its status.
pub fn ready_replicas(statefulset: &v1::StatefulSet) -> i32 {
    statefulset
        .status
        .as_ref()
        .and_then(|status| status.ready_replicas)
        .unwrap_or_default()
}

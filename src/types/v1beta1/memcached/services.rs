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
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::util::intstr;

pub const IPV6_FAMILY: &str = "IPv6";

impl Memcached {
    /// a new headless Service giving every memcached pod a stable DNS name
    pub fn new_headless_service(&self) -> corev1::Service {
        let mut ports = vec![corev1::ServicePort {
            name: Some("memcached".to_owned()),
            port: MEMCACHED_PORT,
            target_port: Some(intstr::IntOrString::Int(MEMCACHED_PORT)),
            protocol: Some("TCP".to_owned()),
            ..Default::default()
        }];
        if self.spec.tls.enabled() {
            ports.push(corev1::ServicePort {
                name: Some("memcached-tls".to_owned()),
                port: MEMCACHED_TLS_PORT,
                target_port: Some(intstr::IntOrString::Int(MEMCACHED_TLS_PORT)),
                protocol: Some("TCP".to_owned()),
                ..Default::default()
            });
        }

        corev1::Service {
            metadata: self.object_meta(self.service_name()),
            spec: Some(corev1::ServiceSpec {
                type_: Some("ClusterIP".to_owned()),
                cluster_ip: Some("None".to_owned()),
                publish_not_ready_addresses: Some(true),
                selector: Some(self.selector_labels()),
                ports: Some(ports),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

/// Primary IP family the cluster assigned to `service`, if any.
pub fn service_ip_family(service: &corev1::Service) -> Option<&str> {
    service
        .spec
        .as_ref()
        .and_then(|spec| spec.ip_families.as_ref())
        .and_then(|families| families.first())
        .map(String::as_str)
}

/// Builds the memcached server lists of an instance.
///
/// The first list holds `<name>-<i>.<name>.<namespace>.svc:<port>` for every
/// replica. The second prefixes each pod with `inet:` or `inet6:` (depending on
/// the service IP family) and always points at the plain listener, which stays
/// up when TLS is enabled.
pub fn server_lists(memcached: &Memcached, ip_family: Option<&str>) -> (Vec<String>, Vec<String>) {
    let name = memcached.name();
    let namespace = memcached.namespace().unwrap_or_default();
    let port = memcached.client_port();
    let prefix = if ip_family == Some(IPV6_FAMILY) {
        "inet6"
    } else {
        "inet"
    };

    (0..memcached.replicas())
        .map(|i| {
            let server = format!("{name}-{i}.{}.{namespace}.svc", memcached.service_name());
            (
                format!("{server}:{port}"),
                format!("{prefix}:{server}:{MEMCACHED_PORT}"),
            )
        })
        .unzip()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::{server_lists, service_ip_family};
    use k8s_openapi::api::core::v1 as corev1;

    #[test]
    fn test_server_lists_without_tls() {
        let memcached = crate::tests::create_test_memcached("cache", "ns", Some(3));

        let (servers, inet) = server_lists(&memcached, Some("IPv4"));

        assert_eq!(
            servers,
            vec![
                "cache-0.cache.ns.svc:11211",
                "cache-1.cache.ns.svc:11211",
                "cache-2.cache.ns.svc:11211",
            ]
        );
        assert_eq!(
            inet,
            vec![
                "inet:cache-0.cache.ns.svc:11211",
                "inet:cache-1.cache.ns.svc:11211",
                "inet:cache-2.cache.ns.svc:11211",
            ]
        );
    }

    #[test]
    fn test_server_lists_ipv6_with_tls() {
        let mut memcached = crate::tests::create_test_memcached("cache", "ns", Some(2));
        memcached.spec.tls.secret_name = Some("cert".to_owned());

        let (servers, inet) = server_lists(&memcached, Some("IPv6"));

        assert_eq!(
            servers,
            vec!["cache-0.cache.ns.svc:11212", "cache-1.cache.ns.svc:11212"]
        );
        assert_eq!(
            inet,
            vec![
                "inet6:cache-0.cache.ns.svc:11211",
                "inet6:cache-1.cache.ns.svc:11211"
            ]
        );
    }

    #[test]
    fn test_server_lists_length_matches_replicas() {
        for replicas in [0, 1, 5] {
            let memcached = crate::tests::create_test_memcached("m", "ns", Some(replicas));
            let (servers, inet) = server_lists(&memcached, None);
            assert_eq!(servers.len(), replicas as usize);
            assert_eq!(inet.len(), replicas as usize);
            for (i, server) in servers.iter().enumerate() {
                assert_eq!(server, &format!("m-{i}.m.ns.svc:11211"));
            }
        }
    }

    #[test]
    fn test_headless_service_ports() {
        let mut memcached = crate::tests::create_test_memcached("cache", "ns", Some(1));
        let svc = memcached.new_headless_service();
        let spec = svc.spec.unwrap();
        assert_eq!(svc.metadata.name, Some("cache".to_owned()));
        assert_eq!(spec.cluster_ip, Some("None".to_owned()));
        assert_eq!(spec.ports.unwrap().len(), 1);

        memcached.spec.tls.secret_name = Some("cert".to_owned());
        let ports = memcached.new_headless_service().spec.unwrap().ports.unwrap();
        assert_eq!(ports.len(), 2);
        assert_eq!(ports[1].port, 11212);
    }

    #[test]
    fn test_service_ip_family() {
        let svc = corev1::Service {
            spec: Some(corev1::ServiceSpec {
                ip_families: Some(vec!["IPv6".to_owned(), "IPv4".to_owned()]),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(service_ip_family(&svc), Some("IPv6"));
        assert_eq!(service_ip_family(&corev1::Service::default()), None);
    }
}

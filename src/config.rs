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

//! Rendering of the memcached configuration files.
//!
//! The reconciler only deals with [`ConfigParams`], a typed description of
//! every knob the templates understand, and hands it to a [`ConfigRenderer`].
//! The rendered files end up in the `<name>-config-data` ConfigMap and their
//! fingerprint is part of the input hash.

use crate::types::v1beta1::memcached::{
    CA_BUNDLE_PATH, CERT_PATH, KEY_PATH, MEMCACHED_PORT, MEMCACHED_TLS_PORT, Memcached,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use snafu::{ResultExt, Snafu, ensure};
use std::collections::BTreeMap;

pub const SYSCONFIG_FILE: &str = "memcached";
pub const KOLLA_CONFIG_FILE: &str = "config.json";

const DEFAULT_MAX_CONNECTIONS: u32 = 8192;
const DEFAULT_CACHE_SIZE_MB: u32 = 1024;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("invalid render parameter '{}': {}", name, reason))]
    InvalidParameter { name: String, reason: String },

    #[snafu(display("failed to encode {}: {}", file, source))]
    Encode {
        file: String,
        source: serde_json::Error,
    },
}

/// Certificate locations handed to memcached when TLS is on.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TlsParams {
    pub cert_path: String,
    pub key_path: String,

    /// Only set when a CA bundle secret is mounted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_path: Option<String>,
}

/// Every parameter understood by the configuration templates.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ConfigParams {
    /// Listener clients connect to; the TLS one when `tls` is set.
    pub port: i32,

    /// Plain listener kept open next to the TLS one.
    pub plain_port: i32,

    pub max_connections: u32,

    pub cache_size_mb: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsParams>,
}

impl ConfigParams {
    pub fn for_memcached(memcached: &Memcached) -> Self {
        let tls = memcached.spec.tls.enabled().then(|| TlsParams {
            cert_path: CERT_PATH.to_owned(),
            key_path: KEY_PATH.to_owned(),
            ca_path: memcached
                .spec
                .tls
                .ca_bundle_secret_name()
                .map(|_| CA_BUNDLE_PATH.to_owned()),
        });

        Self {
            port: if tls.is_some() {
                MEMCACHED_TLS_PORT
            } else {
                MEMCACHED_PORT
            },
            plain_port: MEMCACHED_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            cache_size_mb: DEFAULT_CACHE_SIZE_MB,
            tls,
        }
    }

    fn validate(&self) -> Result<(), Error> {
        for (name, port) in [("port", self.port), ("plainPort", self.plain_port)] {
            ensure!(
                (1..=65535).contains(&port),
                InvalidParameterSnafu {
                    name,
                    reason: format!("{port} is not a valid port"),
                }
            );
        }
        ensure!(
            self.max_connections > 0,
            InvalidParameterSnafu {
                name: "maxConnections",
                reason: "must be greater than zero",
            }
        );
        ensure!(
            self.cache_size_mb > 0,
            InvalidParameterSnafu {
                name: "cacheSizeMb",
                reason: "must be greater than zero",
            }
        );
        Ok(())
    }

    /// Listen directives: the client port, plus the plain port flagged
    /// `notls` when TLS is on.
    fn listen(&self) -> String {
        match self.tls {
            Some(_) => format!(
                "${{POD_IP}}:{},notls:${{POD_IP}}:{}",
                self.port, self.plain_port
            ),
            None => format!("${{POD_IP}}:{}", self.port),
        }
    }

    fn tls_options(&self) -> String {
        match &self.tls {
            Some(tls) => {
                let mut options = format!(
                    " -Z -o ssl_chain_cert={} -o ssl_key={}",
                    tls.cert_path, tls.key_path
                );
                if let Some(ca_path) = &tls.ca_path {
                    options.push_str(&format!(" -o ssl_ca_cert={ca_path}"));
                }
                options
            }
            None => String::new(),
        }
    }
}

/// Turns [`ConfigParams`] into file name → content. Must be deterministic.
pub trait ConfigRenderer: Send + Sync {
    fn render(&self, params: &ConfigParams) -> Result<BTreeMap<String, String>, Error>;
}

/// Renders the kolla `config.json` and the memcached sysconfig file.
#[derive(Clone, Debug, Default)]
pub struct KollaRenderer;

impl ConfigRenderer for KollaRenderer {
    fn render(&self, params: &ConfigParams) -> Result<BTreeMap<String, String>, Error> {
        params.validate()?;

        let sysconfig = format!(
            "PORT=\"{port}\"\nUSER=\"memcached\"\nMAXCONN=\"{maxconn}\"\nCACHESIZE=\"{cache}\"\nOPTIONS=\"-l {listen}{tls}\"\n",
            port = params.port,
            maxconn = params.max_connections,
            cache = params.cache_size_mb,
            listen = params.listen(),
            tls = params.tls_options(),
        );

        let kolla = json!({
            "command": "/bin/bash -c '. /etc/sysconfig/memcached; exec /usr/bin/memcached -p $PORT -u $USER -m $CACHESIZE -c $MAXCONN $OPTIONS'",
            "config_files": [],
        });
        let kolla = serde_json::to_string_pretty(&kolla).context(EncodeSnafu {
            file: KOLLA_CONFIG_FILE,
        })?;

        Ok([
            (KOLLA_CONFIG_FILE.to_owned(), kolla),
            (SYSCONFIG_FILE.to_owned(), sysconfig),
        ]
        .into_iter()
        .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_params_without_tls() {
        let memcached = crate::tests::create_test_memcached("cache", "ns", Some(1));
        let params = ConfigParams::for_memcached(&memcached);
        assert_eq!(params.port, 11211);
        assert!(params.tls.is_none());

        let files = KollaRenderer.render(&params).unwrap();
        let sysconfig = &files[SYSCONFIG_FILE];
        assert!(sysconfig.contains("PORT=\"11211\""));
        assert!(!sysconfig.contains("-Z"));
        assert!(!sysconfig.contains("notls"));
        assert!(files.contains_key(KOLLA_CONFIG_FILE));
    }

    #[test]
    fn test_params_with_tls() {
        let mut memcached = crate::tests::create_test_memcached("cache", "ns", Some(1));
        memcached.spec.tls.secret_name = Some("cert".to_owned());
        let params = ConfigParams::for_memcached(&memcached);
        assert_eq!(params.port, 11212);

        let sysconfig = KollaRenderer.render(&params).unwrap()[SYSCONFIG_FILE].clone();
        assert!(sysconfig.contains("PORT=\"11212\""));
        assert!(sysconfig.contains("notls:${POD_IP}:11211"));
        assert!(sysconfig.contains("-o ssl_chain_cert=/etc/pki/tls/certs/memcached.crt"));
        assert!(sysconfig.contains("-o ssl_key=/etc/pki/tls/private/memcached.key"));
        assert!(!sysconfig.contains("ssl_ca_cert"));

        memcached.spec.tls.ca_bundle_secret_name = Some("ca".to_owned());
        let params = ConfigParams::for_memcached(&memcached);
        let sysconfig = KollaRenderer.render(&params).unwrap()[SYSCONFIG_FILE].clone();
        assert!(sysconfig.contains("-o ssl_ca_cert=/etc/pki/ca-trust/extracted/pem/tls-ca-bundle.pem"));
    }

    #[test]
    fn test_render_is_deterministic() {
        let memcached = crate::tests::create_test_memcached("cache", "ns", Some(1));
        let params = ConfigParams::for_memcached(&memcached);
        assert_eq!(
            KollaRenderer.render(&params).unwrap(),
            KollaRenderer.render(&params.clone()).unwrap()
        );
    }

    #[test]
    fn test_invalid_params_rejected() {
        let memcached = crate::tests::create_test_memcached("cache", "ns", Some(1));
        let mut params = ConfigParams::for_memcached(&memcached);
        params.port = 0;
        assert!(matches!(
            KollaRenderer.render(&params),
            Err(Error::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_unknown_parameter_rejected() {
        let value = serde_json::json!({
            "port": 11211,
            "plainPort": 11211,
            "maxConnections": 10,
            "cacheSizeMb": 64,
            "memcachedTLSListen": "",
        });
        assert!(serde_json::from_value::<ConfigParams>(value).is_err());
    }
}

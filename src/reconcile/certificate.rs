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

use super::{Error, InvalidCertificateSnafu, SecretNotFoundSnafu};
use crate::context::ResourceStore;
use crate::types::v1beta1::memcached::Memcached;
use crate::types::v1beta1::status::{CA_HASH_NAME, CERT_HASH_NAME};
use crate::types::v1beta1::tls::{CA_BUNDLE_KEY, CERT_KEY, PRIVATE_KEY_KEY, secret_value};
use crate::utils::{hash, tls};
use k8s_openapi::api::core::v1 as corev1;
use snafu::{OptionExt, ResultExt};
use std::collections::BTreeMap;
use tracing::debug;

async fn get_secret<S: ResourceStore>(
    store: &S,
    name: &str,
    namespace: &str,
) -> Result<corev1::Secret, Error> {
    store
        .get::<corev1::Secret>(name, namespace)
        .await?
        .context(SecretNotFoundSnafu { name, namespace })
}

fn fingerprint(secret: &corev1::Secret) -> Result<String, Error> {
    Ok(hash::object_hash(&secret.data)?)
}

/// Validates the TLS secrets referenced by `memcached` and returns their
/// fingerprints, keyed by input hash name.
///
/// A configured CA bundle is always checked, CA first, but only contributes a
/// fingerprint while TLS is enabled. A referenced secret that does not exist
/// yields [`Error::SecretNotFound`].
pub(super) async fn tls_input_hashes<S: ResourceStore>(
    store: &S,
    memcached: &Memcached,
) -> Result<BTreeMap<String, String>, Error> {
    let namespace = memcached.namespace()?;
    let tls_enabled = memcached.spec.tls.enabled();
    let mut hashes = BTreeMap::new();

    if let Some(name) = memcached.spec.tls.ca_bundle_secret_name() {
        let secret = get_secret(store, name, &namespace).await?;
        let count = tls::ca_bundle(secret_value(&secret, CA_BUNDLE_KEY)?)
            .context(InvalidCertificateSnafu { name })?;
        debug!(secret = name, certificates = count, "ca bundle validated");
        if tls_enabled {
            hashes.insert(CA_HASH_NAME.to_owned(), fingerprint(&secret)?);
        }
    }

    if let Some(name) = memcached.spec.tls.cert_secret_name() {
        let secret = get_secret(store, name, &namespace).await?;
        let certificate = tls::server_certificate(
            secret_value(&secret, CERT_KEY)?,
            secret_value(&secret, PRIVATE_KEY_KEY)?,
        )
        .context(InvalidCertificateSnafu { name })?;
        debug!(
            secret = name,
            chain = certificate.chain_len,
            key_format = %certificate.key_format,
            "server certificate validated"
        );
        hashes.insert(CERT_HASH_NAME.to_owned(), fingerprint(&secret)?);
    }

    Ok(hashes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{
        MemoryStore, TEST_CERT_PEM, TEST_KEY_PEM, create_test_memcached, create_test_secret,
    };

    fn tls_memcached() -> Memcached {
        let mut memcached = create_test_memcached("cache", "ns", Some(1));
        memcached.spec.tls.ca_bundle_secret_name = Some("ca".to_owned());
        memcached.spec.tls.secret_name = Some("cert".to_owned());
        memcached
    }

    #[tokio::test]
    async fn test_no_tls_no_hashes() {
        let store = MemoryStore::default();
        let memcached = create_test_memcached("cache", "ns", Some(1));
        assert!(tls_input_hashes(&store, &memcached).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ca_bundle_checked_but_not_hashed_without_tls() {
        let store = MemoryStore::default();
        let mut memcached = create_test_memcached("cache", "ns", Some(1));
        memcached.spec.tls.ca_bundle_secret_name = Some("ca".to_owned());

        let err = tls_input_hashes(&store, &memcached).await.unwrap_err();
        assert!(matches!(err, Error::SecretNotFound { ref name, .. } if name == "ca"));

        store.insert(&create_test_secret("ns", "ca", &[(CA_BUNDLE_KEY, "garbage")]));
        let err = tls_input_hashes(&store, &memcached).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCertificate { ref name, .. } if name == "ca"));

        store.insert(&create_test_secret("ns", "ca", &[(CA_BUNDLE_KEY, TEST_CERT_PEM)]));
        assert!(tls_input_hashes(&store, &memcached).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_ca_secret() {
        let store = MemoryStore::default();
        let err = tls_input_hashes(&store, &tls_memcached()).await.unwrap_err();
        assert!(matches!(err, Error::SecretNotFound { ref name, .. } if name == "ca"));
    }

    #[tokio::test]
    async fn test_valid_secrets() {
        let store = MemoryStore::default();
        store.insert(&create_test_secret("ns", "ca", &[(CA_BUNDLE_KEY, TEST_CERT_PEM)]));
        store.insert(&create_test_secret(
            "ns",
            "cert",
            &[(CERT_KEY, TEST_CERT_PEM), (PRIVATE_KEY_KEY, TEST_KEY_PEM)],
        ));

        let hashes = tls_input_hashes(&store, &tls_memcached()).await.unwrap();
        assert_eq!(
            hashes.keys().collect::<Vec<_>>(),
            vec![CA_HASH_NAME, CERT_HASH_NAME]
        );
        assert_ne!(hashes[CA_HASH_NAME], hashes[CERT_HASH_NAME]);
    }

    #[tokio::test]
    async fn test_invalid_certificate() {
        let store = MemoryStore::default();
        store.insert(&create_test_secret("ns", "ca", &[(CA_BUNDLE_KEY, TEST_CERT_PEM)]));
        store.insert(&create_test_secret(
            "ns",
            "cert",
            &[(CERT_KEY, "garbage"), (PRIVATE_KEY_KEY, TEST_KEY_PEM)],
        ));

        let err = tls_input_hashes(&store, &tls_memcached()).await.unwrap_err();
        assert!(matches!(err, Error::InvalidCertificate { ref name, .. } if name == "cert"));

        store.insert(&create_test_secret("ns", "cert", &[(CERT_KEY, TEST_CERT_PEM)]));
        let err = tls_input_hashes(&store, &tls_memcached()).await.unwrap_err();
        assert!(matches!(err, Error::Types { .. }));
    }
}

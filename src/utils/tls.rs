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

use rustls::crypto::ring::sign;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use rustls_pemfile::Item;
use snafu::{ResultExt, Snafu, ensure};
use std::io::{self, Cursor};
use strum::Display;

#[derive(Snafu, Debug)]
pub enum Error {
    #[snafu(display("parse certificate error: {}", source))]
    InvalidCertificate { source: io::Error },

    #[snafu(display("no certificate"))]
    NonCertificate,

    #[snafu(display("parse private key error: {}", source))]
    InvalidPrivateKey { source: io::Error },

    #[snafu(display("no private key"))]
    NonPrivateKey,

    #[snafu(display("key pair match failed: {}", source))]
    MatchFailed { source: rustls::Error },

    #[snafu(display("no supported sign type: {}", source))]
    NoSupportedSignType { source: rustls::Error },

    #[snafu(display("no supported pem type"))]
    NoSupportedPEMType,
}

/// PEM encoding of a private key.
#[derive(Display, Debug, Clone, Copy, PartialEq, Eq)]
#[strum(serialize_all = "lowercase")]
pub enum KeyFormat {
    Pkcs8,
    Pkcs1,
    Sec1,
}

/// Summary of a server certificate secret that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerCertificate {
    /// certificates in the chain, leaf included
    pub chain_len: usize,
    pub key_format: KeyFormat,
}

fn certificate_chain(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>, Error> {
    let mut chain = Vec::new();
    for item in rustls_pemfile::read_all(&mut Cursor::new(pem)) {
        if let Item::X509Certificate(cert) = item.context(InvalidCertificateSnafu)? {
            chain.push(cert);
        }
    }

    ensure!(!chain.is_empty(), NonCertificateSnafu);
    Ok(chain)
}

// first pkcs8/pkcs1/sec1 section wins, other sections are skipped
fn private_key(pem: &[u8]) -> Result<(PrivateKeyDer<'static>, KeyFormat), Error> {
    let mut skipped = false;
    for item in rustls_pemfile::read_all(&mut Cursor::new(pem)) {
        match item.context(InvalidPrivateKeySnafu)? {
            Item::Pkcs8Key(key) => return Ok((key.into(), KeyFormat::Pkcs8)),
            Item::Pkcs1Key(key) => return Ok((key.into(), KeyFormat::Pkcs1)),
            Item::Sec1Key(key) => return Ok((key.into(), KeyFormat::Sec1)),
            _ => skipped = true,
        }
    }

    if skipped {
        NoSupportedPEMTypeSnafu.fail()
    } else {
        NonPrivateKeySnafu.fail()
    }
}

/// Validates the `tls.crt`/`tls.key` pair of a server certificate secret: the
/// chain must parse and its leaf must match the private key.
pub fn server_certificate(cert_pem: &[u8], key_pem: &[u8]) -> Result<ServerCertificate, Error> {
    let chain = certificate_chain(cert_pem)?;
    let chain_len = chain.len();
    let (key, key_format) = private_key(key_pem)?;

    let signing_key = sign::any_supported_type(&key).context(NoSupportedSignTypeSnafu)?;
    CertifiedKey::new(chain, signing_key)
        .keys_match()
        .context(MatchFailedSnafu)?;

    Ok(ServerCertificate {
        chain_len,
        key_format,
    })
}

/// Checks that `bundle_pem` holds at least one certificate and returns how
/// many it holds.
pub fn ca_bundle(bundle_pem: &[u8]) -> Result<usize, Error> {
    certificate_chain(bundle_pem).map(|chain| chain.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::tests::{TEST_CERT_PEM, TEST_KEY_PEM};

    #[test]
    fn test_server_certificate_sec1() {
        let summary =
            server_certificate(TEST_CERT_PEM.as_bytes(), TEST_KEY_PEM.as_bytes()).unwrap();
        assert_eq!(summary.chain_len, 1);
        assert_eq!(summary.key_format, KeyFormat::Sec1);
        assert_eq!(summary.key_format.to_string(), "sec1");
    }

    #[test]
    fn test_key_after_certificate_section() {
        let combined = format!("{TEST_CERT_PEM}{TEST_KEY_PEM}");
        let (_, format) = private_key(combined.as_bytes()).unwrap();
        assert_eq!(format, KeyFormat::Sec1);
    }

    #[test]
    fn test_server_certificate_rejects_garbage() {
        assert!(matches!(
            server_certificate(b"not a cert", TEST_KEY_PEM.as_bytes()),
            Err(Error::NonCertificate)
        ));
        assert!(matches!(
            server_certificate(TEST_CERT_PEM.as_bytes(), b""),
            Err(Error::NonPrivateKey)
        ));
        assert!(matches!(
            server_certificate(TEST_CERT_PEM.as_bytes(), TEST_CERT_PEM.as_bytes()),
            Err(Error::NoSupportedPEMType)
        ));
    }

    #[test]
    fn test_ca_bundle() {
        let bundle = format!("{TEST_CERT_PEM}{TEST_CERT_PEM}");
        assert_eq!(ca_bundle(bundle.as_bytes()).unwrap(), 2);
        assert!(matches!(ca_bundle(b""), Err(Error::NonCertificate)));
    }
}

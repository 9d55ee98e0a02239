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

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex(&Sha256::digest(data))
}

/// SHA-256 over the JSON form of `value`. Maps must be ordered (`BTreeMap`)
/// for the result to be stable.
pub fn object_hash<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(&serde_json::to_vec(value)?))
}

/// Combines named fingerprints into one. Entries are hashed in name order so
/// the order they were collected in does not matter.
pub fn hash_of_input_hashes(inputs: &BTreeMap<String, String>) -> Result<String, serde_json::Error> {
    object_hash(inputs)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_hash_of_input_hashes_is_order_independent() {
        let forward: BTreeMap<String, String> = [("CA", "1"), ("Cert", "2"), ("cache-config-data", "3")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        let backward: BTreeMap<String, String> = [("cache-config-data", "3"), ("Cert", "2"), ("CA", "1")]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v.to_owned()))
            .collect();

        let a = hash_of_input_hashes(&forward).unwrap();
        assert_eq!(a, hash_of_input_hashes(&backward).unwrap());
        assert_eq!(a.len(), 64);

        let mut changed = forward.clone();
        changed.insert("CA".to_owned(), "other".to_owned());
        assert_ne!(a, hash_of_input_hashes(&changed).unwrap());
    }
}

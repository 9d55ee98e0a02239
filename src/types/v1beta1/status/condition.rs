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

//! Readiness conditions for the Memcached status.
//!
//! Every concern the reconciler converges (RBAC, TLS inputs, configuration,
//! the endpoint and the workload) owns one condition. `Ready` aggregates the
//! others and only becomes `True` when all of them are.

use chrono::{SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::Display;

pub const READY_INIT_MESSAGE: &str = "Setup started";
pub const READY_MESSAGE: &str = "Setup complete";
pub const INPUT_READY_INIT_MESSAGE: &str = "Input data not checked";
pub const INPUT_READY_MESSAGE: &str = "Input data complete";
pub const TLS_INPUT_READY_WAITING_MESSAGE: &str = "TLSInput not yet available";
pub const TLS_INPUT_ERROR_MESSAGE: &str = "TLSInput error occured in TLS sources";
pub const EXPOSE_SERVICE_READY_INIT_MESSAGE: &str = "Service not exposed";
pub const EXPOSE_SERVICE_READY_MESSAGE: &str = "Service exposed";
pub const EXPOSE_SERVICE_READY_ERROR_MESSAGE: &str = "Service error occured";
pub const SERVICE_CONFIG_READY_INIT_MESSAGE: &str = "Service config create not started";
pub const SERVICE_CONFIG_READY_MESSAGE: &str = "Service config create completed";
pub const SERVICE_CONFIG_READY_ERROR_MESSAGE: &str = "Service config create error occurred";
pub const DEPLOYMENT_READY_INIT_MESSAGE: &str = "Deployment not started";
pub const DEPLOYMENT_READY_MESSAGE: &str = "Deployment completed";
pub const DEPLOYMENT_READY_RUNNING_MESSAGE: &str = "Deployment in progress";
pub const SERVICE_ACCOUNT_READY_INIT_MESSAGE: &str = "ServiceAccount create not started";
pub const SERVICE_ACCOUNT_READY_MESSAGE: &str = "ServiceAccount created";
pub const SERVICE_ACCOUNT_READY_ERROR_MESSAGE: &str = "ServiceAccount error occured";
pub const ROLE_READY_INIT_MESSAGE: &str = "Role create not started";
pub const ROLE_READY_MESSAGE: &str = "Role created";
pub const ROLE_READY_ERROR_MESSAGE: &str = "Role error occured";
pub const ROLE_BINDING_READY_INIT_MESSAGE: &str = "RoleBinding create not started";
pub const ROLE_BINDING_READY_MESSAGE: &str = "RoleBinding created";
pub const ROLE_BINDING_READY_ERROR_MESSAGE: &str = "RoleBinding error occured";

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq)]
pub enum ConditionType {
    Ready,
    #[serde(rename = "TLSInputReady")]
    #[strum(serialize = "TLSInputReady")]
    TlsInputReady,
    ExposeServiceReady,
    ServiceConfigReady,
    DeploymentReady,
    ServiceAccountReady,
    RoleReady,
    RoleBindingReady,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Severity of a `False` condition. Empty for `True` and `Unknown`.
#[derive(Default, Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
    Info,
    #[default]
    #[serde(rename = "")]
    #[strum(serialize = "")]
    None,
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, JsonSchema, Display, PartialEq, Eq)]
pub enum Reason {
    Init,
    Ready,
    Requested,
    Error,
}

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: ConditionType,

    pub status: ConditionStatus,

    pub reason: Reason,

    #[serde(default)]
    pub severity: Severity,

    #[serde(default)]
    pub message: String,

    /// RFC 3339 time of the last status change.
    pub last_transition_time: String,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl Condition {
    pub fn unknown(type_: ConditionType, reason: Reason, message: &str) -> Self {
        Self {
            type_,
            status: ConditionStatus::Unknown,
            reason,
            severity: Severity::None,
            message: message.to_owned(),
            last_transition_time: now(),
        }
    }

    pub fn ready(type_: ConditionType, message: &str) -> Self {
        Self {
            type_,
            status: ConditionStatus::True,
            reason: Reason::Ready,
            severity: Severity::None,
            message: message.to_owned(),
            last_transition_time: now(),
        }
    }

    pub fn not_ready(
        type_: ConditionType,
        reason: Reason,
        severity: Severity,
        message: impl Into<String>,
    ) -> Self {
        Self {
            type_,
            status: ConditionStatus::False,
            reason,
            severity,
            message: message.into(),
            last_transition_time: now(),
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }

    pub fn is_unknown(&self) -> bool {
        self.status == ConditionStatus::Unknown
    }

    // lower is worse
    fn rank(&self) -> u8 {
        match (self.status, self.severity) {
            (ConditionStatus::False, Severity::Error) => 0,
            (ConditionStatus::False, Severity::Warning) => 1,
            (ConditionStatus::False, Severity::Info) => 2,
            (ConditionStatus::False, Severity::None) => 3,
            (ConditionStatus::Unknown, _) => 4,
            (ConditionStatus::True, _) => 5,
        }
    }
}

/// Ordered set of conditions, at most one per type.
#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, Default, PartialEq)]
#[serde(transparent)]
pub struct Conditions(Vec<Condition>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, type_: ConditionType) -> Option<&Condition> {
        self.0.iter().find(|c| c.type_ == type_)
    }

    /// Adds every condition of `defaults` whose type is not tracked yet.
    /// Conditions already present keep their state.
    pub fn init(&mut self, defaults: impl IntoIterator<Item = Condition>) {
        for condition in defaults {
            if self.get(condition.type_).is_none() {
                self.0.push(condition);
            }
        }
    }

    /// Inserts or replaces the condition of the same type. The previous
    /// transition time survives when the status does not change.
    pub fn set(&mut self, mut condition: Condition) {
        match self.0.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time.clone();
                }
                *existing = condition;
            }
            None => self.0.push(condition),
        }
    }

    pub fn mark_true(&mut self, type_: ConditionType, message: &str) {
        self.set(Condition::ready(type_, message));
    }

    pub fn mark_false(
        &mut self,
        type_: ConditionType,
        reason: Reason,
        severity: Severity,
        message: impl Into<String>,
    ) {
        self.set(Condition::not_ready(type_, reason, severity, message));
    }

    pub fn is_unknown(&self, type_: ConditionType) -> bool {
        self.get(type_).is_none_or(Condition::is_unknown)
    }

    pub fn is_true(&self, type_: ConditionType) -> bool {
        self.get(type_).is_some_and(Condition::is_true)
    }

    /// Puts back the saved transition time of every condition whose status is
    /// the same as in `saved`.
    pub fn restore_last_transition_times(&mut self, saved: &Conditions) {
        for condition in &mut self.0 {
            if let Some(prev) = saved.get(condition.type_)
                && prev.status == condition.status
            {
                condition.last_transition_time = prev.last_transition_time.clone();
            }
        }
    }

    /// Builds a condition of type `target` from the least favorable of the
    /// other conditions. Returns `None` when there is nothing to mirror.
    pub fn mirror(&self, target: ConditionType) -> Option<Condition> {
        let worst = self
            .0
            .iter()
            .filter(|c| c.type_ != target)
            .min_by_key(|c| c.rank())?;

        Some(Condition {
            type_: target,
            status: worst.status,
            reason: worst.reason,
            severity: worst.severity,
            message: worst.message.clone(),
            last_transition_time: now(),
        })
    }

    /// True when every condition except `Ready` is `True`.
    pub fn all_sub_conditions_true(&self) -> bool {
        self.0
            .iter()
            .filter(|c| c.type_ != ConditionType::Ready)
            .all(Condition::is_true)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const OLD: &str = "2020-01-01T00:00:00Z";

    fn aged(mut condition: Condition) -> Condition {
        condition.last_transition_time = OLD.to_owned();
        condition
    }

    fn defaults() -> Vec<Condition> {
        vec![
            Condition::unknown(ConditionType::Ready, Reason::Init, READY_INIT_MESSAGE),
            Condition::unknown(
                ConditionType::TlsInputReady,
                Reason::Init,
                INPUT_READY_INIT_MESSAGE,
            ),
            Condition::unknown(
                ConditionType::DeploymentReady,
                Reason::Init,
                DEPLOYMENT_READY_INIT_MESSAGE,
            ),
        ]
    }

    #[test]
    fn test_init_keeps_existing_and_declaration_order() {
        let mut conditions = Conditions::new();
        conditions.set(aged(Condition::ready(
            ConditionType::TlsInputReady,
            INPUT_READY_MESSAGE,
        )));

        conditions.init(defaults());

        let types: Vec<_> = conditions.iter().map(|c| c.type_).collect();
        assert_eq!(
            types,
            vec![
                ConditionType::TlsInputReady,
                ConditionType::Ready,
                ConditionType::DeploymentReady
            ]
        );
        let tls = conditions.get(ConditionType::TlsInputReady).unwrap();
        assert!(tls.is_true());
        assert_eq!(tls.last_transition_time, OLD);
    }

    #[test]
    fn test_set_keeps_time_when_status_unchanged() {
        let mut conditions = Conditions::new();
        conditions.set(aged(Condition::not_ready(
            ConditionType::DeploymentReady,
            Reason::Requested,
            Severity::Info,
            "waiting",
        )));

        conditions.mark_false(
            ConditionType::DeploymentReady,
            Reason::Requested,
            Severity::Info,
            "still waiting",
        );
        let c = conditions.get(ConditionType::DeploymentReady).unwrap();
        assert_eq!(c.last_transition_time, OLD);
        assert_eq!(c.message, "still waiting");

        conditions.mark_true(ConditionType::DeploymentReady, DEPLOYMENT_READY_MESSAGE);
        let c = conditions.get(ConditionType::DeploymentReady).unwrap();
        assert_ne!(c.last_transition_time, OLD);
    }

    #[test]
    fn test_restore_last_transition_times() {
        let mut saved = Conditions::new();
        saved.set(aged(Condition::ready(ConditionType::Ready, READY_MESSAGE)));
        saved.set(aged(Condition::ready(
            ConditionType::DeploymentReady,
            DEPLOYMENT_READY_MESSAGE,
        )));

        let mut current = Conditions::new();
        current.set(Condition::ready(ConditionType::Ready, READY_MESSAGE));
        current.set(Condition::not_ready(
            ConditionType::DeploymentReady,
            Reason::Requested,
            Severity::Info,
            DEPLOYMENT_READY_RUNNING_MESSAGE,
        ));

        current.restore_last_transition_times(&saved);

        assert_eq!(
            current.get(ConditionType::Ready).unwrap().last_transition_time,
            OLD
        );
        assert_ne!(
            current
                .get(ConditionType::DeploymentReady)
                .unwrap()
                .last_transition_time,
            OLD
        );
    }

    #[test]
    fn test_mirror_picks_worst_sub_condition() {
        let mut conditions = Conditions::new();
        conditions.init(defaults());
        conditions.mark_true(ConditionType::TlsInputReady, INPUT_READY_MESSAGE);
        conditions.mark_false(
            ConditionType::DeploymentReady,
            Reason::Error,
            Severity::Warning,
            "boom",
        );

        let mirrored = conditions.mirror(ConditionType::Ready).unwrap();
        assert_eq!(mirrored.type_, ConditionType::Ready);
        assert_eq!(mirrored.status, ConditionStatus::False);
        assert_eq!(mirrored.reason, Reason::Error);
        assert_eq!(mirrored.message, "boom");
    }

    #[test]
    fn test_mirror_prefers_unknown_over_true() {
        let mut conditions = Conditions::new();
        conditions.init(defaults());
        conditions.mark_true(ConditionType::TlsInputReady, INPUT_READY_MESSAGE);

        let mirrored = conditions.mirror(ConditionType::Ready).unwrap();
        assert_eq!(mirrored.status, ConditionStatus::Unknown);
        assert_eq!(mirrored.message, DEPLOYMENT_READY_INIT_MESSAGE);
    }

    #[test]
    fn test_all_sub_conditions_true_ignores_ready() {
        let mut conditions = Conditions::new();
        conditions.init(defaults());
        assert!(!conditions.all_sub_conditions_true());

        conditions.mark_true(ConditionType::TlsInputReady, INPUT_READY_MESSAGE);
        conditions.mark_true(ConditionType::DeploymentReady, DEPLOYMENT_READY_MESSAGE);
        assert!(conditions.is_unknown(ConditionType::Ready));
        assert!(conditions.all_sub_conditions_true());
    }

    #[test]
    fn test_condition_serialization() {
        let condition = aged(Condition::not_ready(
            ConditionType::TlsInputReady,
            Reason::Requested,
            Severity::Info,
            "waiting",
        ));
        let value = serde_json::to_value(&condition).unwrap();
        assert_eq!(value["type"], "TLSInputReady");
        assert_eq!(value["status"], "False");
        assert_eq!(value["severity"], "Info");
        assert_eq!(value["lastTransitionTime"], OLD);

        let ready = serde_json::to_value(Condition::ready(ConditionType::Ready, "ok")).unwrap();
        assert_eq!(ready["severity"], "");
    }
}

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

use crate::context::Context;
use crate::reconcile::Error;
use crate::types::v1beta1::memcached::Memcached;
use kube::runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

pub fn error_policy(object: Arc<Memcached>, error: &Error, ctx: Arc<Context>) -> Action {
    error!(name = %object.name(), error = %error, "reconcile failed");
    retry_action(error, ctx.config.error_requeue)
}

/// Missing objects wait for a watch event, everything else retries after
/// `error_requeue`.
fn retry_action(error: &Error, error_requeue: Duration) -> Action {
    if error.is_not_found() {
        Action::await_change()
    } else {
        Action::requeue(error_requeue)
    }
}

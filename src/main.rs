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

use clap::{Parser, Subcommand};
use memcached_operator::context::Config;
use memcached_operator::{crd, run};
use std::time::Duration;

shadow_rs::shadow!(build);

const LONG_VERSION: &str = const_str::concat!(
    build::PKG_VERSION,
    " (",
    build::SHORT_COMMIT,
    ", built ",
    build::BUILD_TIME,
    ")"
);

#[derive(Parser)]
#[command(name = "memcached-operator")]
#[command(about = "Memcached Kubernetes Operator CLI", long_about = None)]
#[command(version = build::PKG_VERSION, long_version = LONG_VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Output CRDs in YAML
    Crd {
        /// Optional output path. If not set, the output will be written to stdout.
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Run the controller
    Server {
        /// Seconds to wait before retrying a failed reconcile
        #[arg(long, default_value_t = 5)]
        error_requeue_secs: u64,

        /// Field manager used for server side apply
        #[arg(long, default_value = "memcached-operator")]
        field_manager: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Crd { file } => crd(file).await?,
        Commands::Server {
            error_requeue_secs,
            field_manager,
        } => {
            run(Config {
                error_requeue: Duration::from_secs(error_requeue_secs),
                field_manager,
            })
            .await?
        }
    }

    Ok(())
}

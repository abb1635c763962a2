// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//     http://www.apache.org/licenses/LICENSE-2.0
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

#![forbid(unsafe_code)]

//! `rendezvous-keygen` — generates (or reloads) a node's Ed25519 identity
//! key and prints its public key as hex.

use anyhow::Result;
use clap::Parser;
use infrasim_rendezvous::core::security::keystore::{FileEd25519Backend, SignerBackend};
use std::path::PathBuf;

/// Generate or reload an Ed25519 node identity key.
#[derive(Parser, Debug)]
#[command(name = "rendezvous-keygen", version)]
struct Cli {
    /// Directory the key file is written into (or read from, if it already exists).
    #[arg(default_value = "data")]
    out_dir: PathBuf,

    /// Name of the key file within `out_dir`.
    #[arg(short, long, default_value = "node.key")]
    file_name: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.out_dir)?;
    let key_path = cli.out_dir.join(&cli.file_name);

    let backend = FileEd25519Backend::load_or_create(&key_path)
        .map_err(|e| anyhow::anyhow!("keystore error: {e}"))?;

    println!("{}", hex::encode(backend.public_key()));
    Ok(())
}

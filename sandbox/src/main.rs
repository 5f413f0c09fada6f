// Copyright 2025 eraflo
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

// Satchel sandbox
// Packs asset directories into containers and loads bundles end to end.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use satchel_agents::{
    AssetManager, AssetManagerConfig, BundleSource, BundleState, ChannelObserver, ModPaths,
    ShaderAssetConsumer, ShaderSource, Texture,
};
use satchel_lanes::PackBuilder;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(version, about = "Satchel bundle sandbox")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Packs the files of a directory into a container
    Pack {
        /// Directory whose top-level files are packed
        source: PathBuf,
        /// Container file to write
        output: PathBuf,
    },
    /// Loads one bundle, ticks it until it is released, and prints metrics
    Load {
        /// Install root holding GameData
        #[arg(long)]
        root: PathBuf,
        /// Mod directory below GameData
        #[arg(long = "mod", default_value = "Tint")]
        mod_name: String,
        /// File or directory name inside the mod's Packages directory
        bundle: String,
        /// Treat the bundle as a directory of loose files
        #[arg(long)]
        directory: bool,
        /// RON manager configuration
        #[arg(long)]
        config: Option<PathBuf>,
        /// Milliseconds between scheduler ticks
        #[arg(long, default_value_t = 16)]
        tick_ms: u64,
    },
}

fn main() -> Result<()> {
    satchel_telemetry::logging::init("info");
    let cli = Cli::parse();

    match cli.command {
        Command::Pack { source, output } => pack(&source, &output),
        Command::Load {
            root,
            mod_name,
            bundle,
            directory,
            config,
            tick_ms,
        } => {
            let config = match config {
                Some(path) => AssetManagerConfig::load(&path)
                    .with_context(|| format!("Failed to load config '{}'", path.display()))?,
                None => AssetManagerConfig::default(),
            };
            let paths = ModPaths::new(&root, &mod_name)?;
            let source = if directory {
                BundleSource::Directory
            } else {
                BundleSource::Container
            };

            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start the tokio runtime")?;
            runtime.block_on(load(config, paths, &bundle, source, Duration::from_millis(tick_ms)))
        }
    }
}

fn pack(source: &Path, output: &Path) -> Result<()> {
    let mut builder = PackBuilder::new();
    for entry in WalkDir::new(source)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.with_context(|| format!("Failed to read '{}'", source.display()))?;
        if entry.file_type().is_file() {
            builder = builder.add_file(entry.path())?;
        }
    }
    builder.write_to(output)?;
    log::info!("Packed {} file(s) into '{}'.", builder.len(), output.display());
    Ok(())
}

async fn load(
    config: AssetManagerConfig,
    paths: ModPaths,
    bundle_name: &str,
    source: BundleSource,
    tick: Duration,
) -> Result<()> {
    let manager = AssetManager::new(config)?;
    let shaders = Arc::new(ShaderAssetConsumer::new(manager.index().clone()));
    let (observer, events) = ChannelObserver::new();

    let bundle = manager.create_bundle(&paths, bundle_name, bundle_name, source)?;
    bundle.add_observer(Arc::new(observer));
    bundle.add_observer(shaders.clone());
    manager.dispatch(&bundle)?;

    let mut interval = tokio::time::interval(tick);
    while !bundle.state().is_terminal() {
        interval.tick().await;
        for event in events.try_iter().filter(|e| !e.finalized) {
            log::info!("{} -> {:?}", event.bundle_id, event.state);
            if event.state == BundleState::WaitingForUnload {
                report(&manager, bundle_name);
            }
        }
        manager.tick();
    }

    for record in shaders.records() {
        println!(
            "shader {} replaces [{}] ({} parameter(s))",
            record.name,
            record.replaces.join(", "),
            record.parameters.len()
        );
    }
    if let Some(status) = manager.bundle_status(bundle_name) {
        println!("bundle {bundle_name}: {:?}", status.state);
        if let Some(failure) = status.failure {
            println!("  failure: {failure}");
        }
    }
    println!("{}", manager.metrics().export_json()?);

    manager.shutdown().await;
    Ok(())
}

fn report(manager: &AssetManager, bundle_id: &str) {
    let textures = manager.get_assets_of_type::<Texture>(Some(bundle_id));
    let shaders = manager.get_assets_of_type::<ShaderSource>(Some(bundle_id));
    match (textures, shaders) {
        (Ok(textures), Ok(shaders)) => {
            for (name, record) in &textures {
                let attributed = if record.attributes().is_some() { " +attributes" } else { "" };
                println!("texture {name}{attributed}");
            }
            for name in shaders.keys() {
                println!("shader source {name}");
            }
        }
        (Err(e), _) | (_, Err(e)) => log::warn!("Bundle '{bundle_id}' is no longer queryable: {e}"),
    }
}

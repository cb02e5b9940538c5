use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use scenelink_components::{Health, Name, Renderable, Transform, register_builtin_components};
use scenelink_core::{Manager, ManagerConfig, Scene};
use scenelink_tools::ManagerInspector;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scenelink-cli", about = "CLI tool for scenelink operations")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Manager configuration (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and crate info
    Info,
    /// Populate a scene, cycle materialization and round-trip a snapshot
    Demo {
        /// Number of entities to create
        #[arg(short, long, default_value = "5")]
        entities: usize,
    },
    /// Write a registry snapshot of a demo population
    Save {
        /// Number of entities to create
        #[arg(short, long, default_value = "5")]
        entities: usize,
        /// Output file
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Load a registry snapshot into a fresh scene and inspect it
    Load {
        /// Snapshot file
        file: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ManagerConfig::default(),
    };

    match cli.command {
        Commands::Info => {
            println!("scenelink-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", scenelink_common::crate_info());
            println!("ecs: {}", scenelink_ecs::crate_info());
            println!("archive: {}", scenelink_archive::crate_info());
            println!("scene: {}", scenelink_scene::crate_info());
            println!("core: {}", scenelink_core::crate_info());
            println!("components: {}", scenelink_components::crate_info());
            println!("tools: {}", scenelink_tools::crate_info());
            println!("entities container: {}", config.entities_container);
        }
        Commands::Demo { entities } => demo(config, entities)?,
        Commands::Save { entities, out } => {
            let (mut manager, _scene) = populate(config, entities)?;
            let bytes = manager.encode_registry()?;
            std::fs::write(&out, &bytes)
                .with_context(|| format!("writing snapshot to {}", out.display()))?;
            println!(
                "Saved {} entities ({} bytes) to {}",
                manager.registry().len(),
                bytes.len(),
                out.display()
            );
        }
        Commands::Load { file } => {
            let bytes = std::fs::read(&file)
                .with_context(|| format!("reading snapshot from {}", file.display()))?;
            let (mut manager, mut scene) = new_manager(config)?;
            manager
                .decode_registry(&bytes)
                .with_context(|| format!("decoding {}", file.display()))?;
            scene.update(&mut manager);

            println!("{}", ManagerInspector::summary(&manager));
            print!("{}", scene.tree_string());
            for entity in ManagerInspector::list_entities(&manager) {
                if let Some(info) = ManagerInspector::inspect_entity(&manager, entity) {
                    println!("{info}");
                }
            }
            print!("{}", ManagerInspector::render_text(&mut manager));
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> anyhow::Result<ManagerConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    ManagerConfig::from_json(&text).with_context(|| format!("parsing config {}", path.display()))
}

fn new_manager(config: ManagerConfig) -> anyhow::Result<(Manager, Scene)> {
    let mut manager = Manager::new(config);
    register_builtin_components(&mut manager)?;
    manager.set_entity_label(|registry, entity| {
        registry
            .get::<Name>(entity)
            .map_or_else(|| entity.to_string(), |name| format!("{} ({entity})", name.0))
    });
    let mut scene = Scene::new();
    manager.attach_to_scene(&mut scene)?;
    Ok((manager, scene))
}

/// `count` named entities along the x axis; even ones are materialized.
fn populate(config: ManagerConfig, count: usize) -> anyhow::Result<(Manager, Scene)> {
    let (mut manager, mut scene) = new_manager(config)?;
    for i in 0..count {
        let entity = manager.registry_mut().create();
        let registry = manager.registry_mut();
        registry.insert(entity, Name(format!("entity-{i}")))?;
        registry.insert(
            entity,
            Transform::from_position(glam::Vec3::new(i as f32 * 2.0, 0.0, 0.0)),
        )?;
        registry.insert(entity, Health::default())?;
        if i % 3 == 0 {
            registry.insert(
                entity,
                Renderable {
                    mesh: "meshes/cube.glb".to_owned(),
                    material: "default".to_owned(),
                    visible: true,
                },
            )?;
        }
        if i % 2 == 0 {
            manager.materialize(&mut scene, entity);
        }
    }
    scene.update(&mut manager);
    Ok((manager, scene))
}

fn demo(config: ManagerConfig, count: usize) -> anyhow::Result<()> {
    println!("Demo: creating {count} entities");
    let (mut manager, mut scene) = populate(config.clone(), count)?;
    println!("{}", ManagerInspector::summary(&manager));
    print!("{}", scene.tree_string());

    if let Some(&first) = manager.entities().first() {
        manager.dematerialize(&mut scene, first);
        let handle = manager.materialize(&mut scene, first);
        println!(
            "Cycled {first}: materialized={} same id={}",
            manager.is_materialized(first),
            handle.is_some_and(|handle| handle.entity() == first)
        );
    }

    let bytes = manager.encode_registry()?;
    let (mut loaded, mut fresh) = new_manager(config)?;
    loaded.decode_registry(&bytes)?;
    fresh.update(&mut loaded);
    let reencoded = loaded.encode_registry()?;
    println!(
        "Snapshot: {} bytes, reloaded entities={}, materialized={}, match={}",
        bytes.len(),
        loaded.registry().len(),
        ManagerInspector::summary(&loaded).materialized_count,
        if reencoded == bytes { "OK" } else { "MISMATCH" }
    );
    Ok(())
}

//! Synthetic host loop.
//!
//! Walks a square of chunks through the patched hook points the way a host
//! generator would (surface, noise, carvers, density samples, surface
//! blocks, biomes), runs server ticks, registers custom dimensions, and
//! prints the dispatch, cache and executor stats.

use anyhow::Result;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use strata_core::{
    BiomeRef, BlockState, ChunkHandle, ChunkPos, ClimateSample, DimensionConfigData, DimensionRegistrar,
    DimensionSink, DimensionTypeConfig, HookPoints, RandomState, RegionHandle,
};
use strata_sdk::extensions::{ExtensionRuntime, NativeCallback, NativeRuntime};
use strata_sdk::{EventsApi, Strata};

use crate::cli::SimulateArgs;
use crate::config::Config;

const MIN_Y: i32 = -64;
const HEIGHT: i32 = 384;
const SEA_LEVEL: i32 = 63;
const DENSITY_SAMPLES_PER_CHUNK: usize = 256;

const DEFAULT_SURFACE: &str = "minecraft:grass_block";
const DEFAULT_BIOME: &str = "minecraft:plains";

/// What the host observed during the run.
#[derive(Debug, Default, Serialize)]
struct HostReport {
    chunks: u32,
    ticks: u64,
    surfaces_skipped: u64,
    carvers_skipped: u64,
    noise_replaced: u64,
    density_samples: u64,
    density_overridden: u64,
    surface_blocks: u64,
    surface_blocks_overridden: u64,
    biomes_overridden: u64,
    dimensions_registered: Vec<String>,
    dimensions_rejected: Vec<(String, String)>,
}

/// Records created dimensions and rejects repeated ids.
#[derive(Default)]
struct RecordingSink {
    created: Vec<String>,
}

impl DimensionSink for RecordingSink {
    fn create_dimension(&mut self, config: &DimensionConfigData) -> strata_core::Result<()> {
        if self.created.contains(&config.id) {
            return Err(strata_core::Error::DimensionExists(config.id.clone()));
        }
        self.created.push(config.id.clone());
        Ok(())
    }
}

pub async fn execute(args: SimulateArgs, config: &Config) -> Result<()> {
    match args.packs.clone() {
        Some(dir) => run_scripted(dir, &args, config).await,
        None => {
            let strata = Strata::new(config.runtime.clone(), NativeRuntime::new())?;
            register_builtin(strata.events())?;
            run(&strata, &args).await
        }
    }
}

#[cfg(feature = "scripting")]
async fn run_scripted(dir: std::path::PathBuf, args: &SimulateArgs, config: &Config) -> Result<()> {
    use strata_sdk::extensions::{ScriptRuntime, discover_packs};

    let strata = Strata::new(config.runtime.clone(), ScriptRuntime::new())?;
    let packs = discover_packs(&dir).await?;
    let summary = ScriptRuntime::load_packs(strata.events(), &packs).await;

    println!(
        "{} {} pack(s) loaded, {} failed, {} callback(s)",
        "Packs:".cyan(),
        summary.loaded,
        summary.failed,
        summary.callbacks
    );
    run(&strata, args).await
}

#[cfg(not(feature = "scripting"))]
async fn run_scripted(_dir: std::path::PathBuf, _args: &SimulateArgs, _config: &Config) -> Result<()> {
    anyhow::bail!("--packs needs a build with the `scripting` feature")
}

/// Demo callbacks used when no packs are given.
fn register_builtin(events: &EventsApi<NativeRuntime>) -> Result<()> {
    events.on_started(NativeCallback::new(|_| {
        tracing::info!("Built-in extension saw server start");
        Ok(Value::Null)
    }));

    events.on_tick(NativeCallback::new(|event| {
        tracing::debug!(tick = %event["tick"], "Built-in extension tick");
        Ok(Value::Null)
    }));

    // No carvers on chunks with even x and z.
    events.on_carver(NativeCallback::new(|event| {
        let x = event["chunk"]["pos"]["x"].as_i64().unwrap_or_default();
        let z = event["chunk"]["pos"]["z"].as_i64().unwrap_or_default();
        Ok(json!(x % 2 == 0 && z % 2 == 0))
    }));

    // Solid below y = 0.
    events.on_density(NativeCallback::new(|event| {
        match event["y"].as_i64() {
            Some(y) if y < 0 => Ok(json!(1.0)),
            _ => Ok(Value::Null),
        }
    }));

    events.on("worldgen.surface.block", NativeCallback::new(|event| {
        match event["y"].as_i64() {
            Some(y) if y <= i64::from(SEA_LEVEL) => Ok(json!("minecraft:sand")),
            _ => Ok(Value::Null),
        }
    }))?;

    let caverns = DimensionTypeConfig {
        has_skylight: false,
        has_ceiling: true,
        ambient_light: 0.1,
        ..DimensionTypeConfig::default()
    };
    events.register_dimension(
        DimensionConfigData::new("strata:caverns")
            .with_generator("noise")
            .with_type(caverns),
    )?;
    Ok(())
}

async fn run<R: ExtensionRuntime>(strata: &Strata<R>, args: &SimulateArgs) -> Result<()> {
    strata.install();
    let points = HookPoints::global();
    let mut report = HostReport {
        chunks: args.chunks,
        ticks: args.ticks,
        ..HostReport::default()
    };

    let progress = ProgressBar::new(u64::from(args.chunks) + args.ticks);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=> "),
    );

    points.started();

    let mut rng = StdRng::seed_from_u64(args.seed);
    let random = RandomState { seed: args.seed as i64 };
    let side = (f64::from(args.chunks).sqrt().ceil() as i32).max(1);

    progress.set_message("generating chunks");
    for i in 0..args.chunks as i32 {
        let pos = ChunkPos::new(i % side, i / side);
        generate_chunk(&points, pos, &random, &mut rng, &mut report).await;
        progress.inc(1);
    }

    progress.set_message("ticking");
    for _ in 0..args.ticks {
        points.tick();
        progress.inc(1);
    }
    progress.finish_and_clear();

    let mut sink = RecordingSink::default();
    let summary = DimensionRegistrar::register_all(strata.bridge().as_ref(), &mut sink);
    report.dimensions_registered = sink.created;
    report.dimensions_rejected = summary.rejected;

    if args.json {
        print_json(strata, &report)?;
    } else {
        print_report(strata, &report);
    }

    strata_core::bridge::clear_bridge();
    strata.shutdown()?;
    Ok(())
}

async fn generate_chunk(
    points: &HookPoints<'_>,
    pos: ChunkPos,
    random: &RandomState,
    rng: &mut StdRng,
    report: &mut HostReport,
) {
    let chunk = ChunkHandle::new(pos, MIN_Y, HEIGHT);
    let region = RegionHandle::new(pos, 1);

    if let Some(fill) = points.fill_from_noise(&chunk, random) {
        let _filled = fill.await;
        report.noise_replaced += 1;
    }

    if points.build_surface(&region, &chunk).is_skip() {
        report.surfaces_skipped += 1;
    }

    if points.apply_carvers(&region, &chunk, random.seed).is_skip() {
        report.carvers_skipped += 1;
    }

    for _ in 0..DENSITY_SAMPLES_PER_CHUNK {
        let x = pos.min_block_x() + rng.gen_range(0..16);
        let y = rng.gen_range(MIN_Y..MIN_Y + HEIGHT);
        let z = pos.min_block_z() + rng.gen_range(0..16);
        let original: f64 = rng.gen_range(-1.0..1.0);

        report.density_samples += 1;
        if points.resolve_density(x, y, z, original) != original {
            report.density_overridden += 1;
        }
    }

    for dx in 0..16 {
        for dz in 0..16 {
            let x = pos.min_block_x() + dx;
            let z = pos.min_block_z() + dz;
            let y = SEA_LEVEL + rng.gen_range(-4..8);

            points.surface_rule_updated(x, y, z, 0, 3, SEA_LEVEL);
            let block = points.resolve_surface_block(x, y, z, 0, BlockState::new(DEFAULT_SURFACE));
            report.surface_blocks += 1;
            if block.id() != DEFAULT_SURFACE {
                report.surface_blocks_overridden += 1;
            }
        }
    }

    let climate = ClimateSample {
        temperature: rng.gen_range(-1.0..1.0),
        humidity: rng.gen_range(-1.0..1.0),
        ..ClimateSample::default()
    };
    let biome = points.resolve_biome(pos.min_block_x(), 64, pos.min_block_z(), &climate, BiomeRef::new(DEFAULT_BIOME));
    if biome.id() != DEFAULT_BIOME {
        report.biomes_overridden += 1;
    }
}

fn print_json<R: ExtensionRuntime>(strata: &Strata<R>, report: &HostReport) -> Result<()> {
    let caches: BTreeMap<_, _> = strata.caches().stats().into_iter().collect();

    let output = json!({
        "host": report,
        "dispatch": strata.dispatcher().stats(),
        "caches": caches,
        "executor": strata.executor().stats(),
        "ticks_seen": strata.event_manager().tick_count(),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_report<R: ExtensionRuntime>(strata: &Strata<R>, report: &HostReport) {
    println!("{}", "Simulation".bold());
    println!("{}", "═".repeat(60));
    println!("  {} {} chunks, {} ticks", "Ran:".cyan(), report.chunks, report.ticks);
    println!(
        "  {} {} surface, {} carver, {} noise replaced",
        "Stages:".cyan(),
        report.surfaces_skipped,
        report.carvers_skipped,
        report.noise_replaced
    );
    println!(
        "  {} {}/{} overridden",
        "Density:".cyan(),
        report.density_overridden,
        report.density_samples
    );
    println!(
        "  {} {}/{} overridden",
        "Surface:".cyan(),
        report.surface_blocks_overridden,
        report.surface_blocks
    );
    println!("  {} {} overridden", "Biomes:".cyan(), report.biomes_overridden);

    let dispatch = strata.dispatcher().stats();
    println!();
    println!("  {}", "Dispatch".bold());
    println!(
        "    {} dispatches, {} skipped, {} callbacks, {} failures",
        dispatch.dispatches, dispatch.skipped, dispatch.callbacks_invoked, dispatch.callback_failures
    );

    println!();
    println!("  {}", "Caches".bold());
    for (name, stats) in strata.caches().stats() {
        println!("    {}: {}", name.cyan(), stats);
    }

    let executor = strata.executor().stats();
    println!();
    println!("  {}", "Executor".bold());
    println!(
        "    {} submitted, {} completed, {} timed out ({:.1}%), {} caller-runs",
        executor.submitted,
        executor.completed,
        executor.timed_out,
        executor.timeout_rate() * 100.0,
        executor.caller_runs
    );

    println!();
    println!("  {}", "Dimensions".bold());
    for id in &report.dimensions_registered {
        println!("    {} {}", "✓".green(), id);
    }
    for (id, reason) in &report.dimensions_rejected {
        println!("    {} {}: {}", "✗".red(), id, reason);
    }
    if report.dimensions_registered.is_empty() && report.dimensions_rejected.is_empty() {
        println!("    {}", "○ none".yellow());
    }
}

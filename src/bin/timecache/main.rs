//! TimeCache CLI - inspect temporal resolution and caching of a scene.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use alembic_timecache::anim::{classify_with, clamp_time, local_transform, resolve_channel, world_transform};
use alembic_timecache::build::bake_points;
use alembic_timecache::prelude::*;
use alembic_timecache::util::{mat4_to_row_major, DMat4};
use anyhow::{anyhow, bail, Context};
use tracing::{debug, info, warn};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "TIMECACHE_LOG";

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter);
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing::subscriber::set_global_default(subscriber);
}

/// Global flags plus the remaining positional arguments.
struct Args {
    positional: Vec<String>,
    settings: Option<PathBuf>,
    lod: Option<Lod>,
    fps: Option<f64>,
    group: ChannelGroup,
    json: bool,
}

fn parse_args(raw: &[String]) -> anyhow::Result<(Args, &'static str)> {
    let mut level = "info";
    let mut args = Args {
        positional: Vec::new(),
        settings: None,
        lod: None,
        fps: None,
        group: ChannelGroup::Geometry,
        json: false,
    };
    let mut it = raw.iter();
    while let Some(arg) = it.next() {
        let mut value = |flag: &str| it.next().cloned().ok_or_else(|| anyhow!("{flag} needs a value"));
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            "-j" | "--json" => args.json = true,
            "--settings" => args.settings = Some(PathBuf::from(value("--settings")?)),
            "--lod" => args.lod = Some(value("--lod")?.parse()?),
            "--fps" => args.fps = Some(value("--fps")?.parse().context("--fps")?),
            "--group" => {
                let name = value("--group")?;
                args.group = ChannelGroup::ALL
                    .into_iter()
                    .find(|g| g.as_str() == name)
                    .ok_or_else(|| anyhow!("unknown channel group '{name}'"))?;
            }
            _ => args.positional.push(arg.clone()),
        }
    }
    Ok((args, level))
}

fn main() {
    let raw: Vec<String> = env::args().skip(1).collect();
    let (args, level) = match parse_args(&raw) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(2);
        }
    };
    init_tracing(level);

    if let Err(e) = run(args) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let Some(command) = args.positional.first() else {
        print_help();
        return Ok(());
    };
    let pos = &args.positional[1..];
    let file = || pos.first().map(String::as_str).ok_or_else(|| anyhow!("missing scene file argument"));

    match command.as_str() {
        "info" | "i" => {
            let (ctx, archive) = open(&args, file()?)?;
            cmd_info(&ctx, &archive)
        }
        "tree" | "t" => {
            let (ctx, archive) = open(&args, file()?)?;
            cmd_tree(&ctx, &archive)
        }
        "classify" | "c" => {
            let (ctx, archive) = open(&args, file()?)?;
            cmd_classify(&ctx, &archive, pos.get(1).map(String::as_str), args.json)
        }
        "resolve" | "r" => {
            let (ctx, archive) = open(&args, file()?)?;
            let [_, path, channel, t] = pos else {
                bail!("usage: timecache resolve <file> <object> <channel> <time> [--group <group>]");
            };
            cmd_resolve(&ctx, &archive, path, channel, parse_time(t)?, args.group)
        }
        "xform" | "x" => {
            let (ctx, archive) = open(&args, file()?)?;
            let t = pos.get(1).map(|s| parse_time(s)).transpose()?.unwrap_or(0.0);
            cmd_xform(&ctx, &archive, t, pos.get(2).map(String::as_str))
        }
        "play" | "p" => {
            let (ctx, archive) = open(&args, file()?)?;
            let start = pos.get(1).map(|s| parse_time(s)).transpose()?;
            let end = pos.get(2).map(|s| parse_time(s)).transpose()?;
            cmd_play(&ctx, &archive, start, end, args.lod, args.fps)
        }
        "help" | "h" | "-h" | "--help" => {
            print_help();
            Ok(())
        }
        other => {
            print_help();
            bail!("unknown command: {other}")
        }
    }
}

fn print_help() {
    println!(
        "timecache {} (built {} {})",
        env!("CARGO_PKG_VERSION"),
        env!("TIMECACHE_BUILD_DATE"),
        env!("TIMECACHE_BUILD_TIME")
    );
    println!();
    println!("USAGE:");
    println!("    timecache [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("COMMANDS:");
    println!("    i, info     <file>                          Show nodes, kinds and time range");
    println!("    t, tree     <file>                          Show hierarchy with animation tiers");
    println!("    c, classify <file> [pattern]                Classify every node");
    println!("    r, resolve  <file> <object> <channel> <t>   Print a channel's value at time t");
    println!("    x, xform    <file> [t] [pattern]            Print local and world matrices");
    println!("    p, play     <file> [start] [end]            Step through frames, report cache actions");
    println!("    h, help                                     Show this help");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose        Show debug output");
    println!("    -vv, --trace         Show trace output (cache decisions)");
    println!("    -q, --quiet          Errors only");
    println!("    -j, --json           JSON output (classify)");
    println!("    --settings <file>    Settings file (default: config dir)");
    println!("    --lod <lod>          full | points | box | centroid | hidden");
    println!("    --fps <fps>          Playback rate for play");
    println!("    --group <group>      geometry | arbitrary | user | object (resolve)");
    println!();
    println!("ENVIRONMENT:");
    println!("    {LOG_ENV}         tracing filter, e.g. alembic_timecache=trace");
}

fn parse_time(s: &str) -> anyhow::Result<f64> {
    s.parse().with_context(|| format!("invalid time '{s}'"))
}

/// Session plus the settings every command resolves with.
struct Scene {
    session: Session,
    settings: Settings,
}

fn open(args: &Args, path: &str) -> anyhow::Result<(Scene, Arc<Archive>)> {
    let mut settings = match &args.settings {
        Some(p) => Settings::load(p).with_context(|| format!("loading settings {}", p.display()))?,
        None => Settings::load_default(),
    };
    let session = Session::new();
    let archive = session.open_file(path).with_context(|| format!("opening {path}"))?;

    settings.add_recent(PathBuf::from(path));
    if args.settings.is_none() {
        if let Err(e) = settings.save_default() {
            debug!("settings not saved: {e}");
        }
    }
    Ok((Scene { session, settings }, archive))
}

fn matches(obj: &ObjectRef, pattern: Option<&str>) -> bool {
    pattern.map_or(true, |p| obj.path().contains(p))
}

fn cmd_info(ctx: &Scene, archive: &Arc<Archive>) -> anyhow::Result<()> {
    let objects = archive.objects()?;
    let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
    for obj in &objects {
        *counts.entry(obj.kind()?.as_str()).or_default() += 1;
    }

    println!("Archive: {} ({})", archive.name(), archive.id());
    match archive.read(|r| Ok(r.time_range()))? {
        Some((start, end)) => println!("Time range: {start} - {end}"),
        None => println!("Time range: static"),
    }
    println!("Time bias: {}", ctx.settings.time_bias);
    println!();
    println!("Objects:");
    for (kind, n) in &counts {
        println!("  {kind:<9} {n}");
    }
    println!();
    println!("Total objects: {}", objects.len());
    Ok(())
}

fn cmd_tree(ctx: &Scene, archive: &Arc<Archive>) -> anyhow::Result<()> {
    let options = ctx.settings.classify_options();
    println!("Archive: {}", archive.name());
    for obj in archive.objects()? {
        let depth = obj.path().matches('/').count();
        let indent = "  ".repeat(depth.saturating_sub(1));
        let name = obj.path().rsplit('/').next().unwrap_or_default();
        println!("{indent}{name} [{}] {}", obj.kind()?, classify_with(&obj, &options));
    }
    Ok(())
}

fn cmd_classify(ctx: &Scene, archive: &Arc<Archive>, pattern: Option<&str>, json: bool) -> anyhow::Result<()> {
    let options = ctx.settings.classify_options();
    let mut rows = Vec::new();
    for obj in archive.objects()?.iter().filter(|o| matches(o, pattern)) {
        let kind = obj.kind()?;
        let anim = classify_with(obj, &options);
        let anim = if kind == NodeKind::Xform { anim.transform_projection() } else { anim };
        rows.push((obj.path().to_string(), kind, anim));
    }

    if json {
        let objects: Vec<_> = rows
            .iter()
            .map(|(path, kind, anim)| serde_json::json!({ "path": path, "kind": kind.as_str(), "animation": anim }))
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "archive": archive.name(), "objects": objects }))?
        );
    } else {
        for (path, kind, anim) in rows {
            println!("{path:<40} {kind:<9} {anim}");
        }
    }
    Ok(())
}

fn cmd_resolve(
    ctx: &Scene,
    archive: &Arc<Archive>,
    path: &str,
    channel: &str,
    t: f64,
    group: ChannelGroup,
) -> anyhow::Result<()> {
    let obj = archive.object(path)?;
    let t = clamp_time(archive, t);
    let sample = resolve_channel(&obj, group, channel, t, ctx.settings.clock())?;
    println!("{path}.{channel} @ {t} [{}]", sample.data_type());

    if let Some(strings) = sample.as_strings() {
        for s in strings {
            println!("  {s:?}");
        }
    } else if let Some(matrices) = sample.as_matrices() {
        for m in matrices {
            print_matrix(m);
        }
    } else {
        for tuple in sample.to_f64_vec().chunks(sample.extent) {
            println!("  {tuple:?}");
        }
    }
    Ok(())
}

fn print_matrix(m: &DMat4) {
    for row in mat4_to_row_major(m).chunks(4) {
        println!("    [{:10.4} {:10.4} {:10.4} {:10.4}]", row[0], row[1], row[2], row[3]);
    }
}

fn cmd_xform(ctx: &Scene, archive: &Arc<Archive>, t: f64, pattern: Option<&str>) -> anyhow::Result<()> {
    let clock = ctx.settings.clock();
    println!("Transforms @ {t}{}", pattern.map(|p| format!(" (filter: {p})")).unwrap_or_default());
    for obj in archive.objects()?.iter().filter(|o| matches(o, pattern)) {
        if obj.kind()? != NodeKind::Xform {
            continue;
        }
        println!();
        println!("{}", obj.path());
        println!("  local:");
        print_matrix(&local_transform(obj, t, clock)?);
        println!("  world:");
        print_matrix(&world_transform(obj, t, clock)?);
    }
    Ok(())
}

fn cmd_play(
    ctx: &Scene,
    archive: &Arc<Archive>,
    start: Option<f64>,
    end: Option<f64>,
    lod: Option<Lod>,
    fps: Option<f64>,
) -> anyhow::Result<()> {
    let settings = &ctx.settings;
    let (lo, hi) = archive.read(|r| Ok(r.time_range()))?.unwrap_or((0.0, 0.0));
    let (start, end) = (start.unwrap_or(lo), end.unwrap_or(hi));
    let fps = fps.unwrap_or(settings.playback_fps);
    let lod = lod.unwrap_or(settings.default_lod);
    if !(fps > 0.0) {
        bail!("fps must be positive");
    }

    let pool = CachePool::new(PrimitiveBuilder::new(settings.clock()), settings.classify_options(), settings.clock());
    let objects: Vec<ObjectRef> = archive
        .objects()?
        .into_iter()
        .filter(|o| o.kind().map(|k| k.is_geometry()).unwrap_or(false))
        .collect();
    info!("playing {} geometry objects from {start} to {end} at {fps} fps ({lod})", objects.len());

    let frames = ((end - start) * fps).floor().max(0.0) as usize + 1;
    for frame in 0..frames {
        let t = start + frame as f64 / fps;
        let reps = pool.resolve_all(&objects, t, lod);

        let mut actions: BTreeMap<&'static str, usize> = BTreeMap::new();
        let mut points = 0usize;
        for (obj, rep) in objects.iter().zip(&reps) {
            let action = pool.last_action(&obj.key()).unwrap_or_default();
            *actions.entry(action.as_str()).or_default() += 1;
            match rep {
                Some(prim) => points += bake_points(prim).len(),
                None if action != CacheAction::Hidden => warn!("{} has no representation at {t}", obj.path()),
                None => {}
            }
        }
        let summary: Vec<String> = actions.iter().map(|(a, n)| format!("{a}={n}")).collect();
        println!("frame {frame:>4}  t={t:<8.4} points={points:<8} {}", summary.join(" "));
    }

    let purged = pool.purge_archive(archive.id());
    ctx.session.close(archive.id());
    debug!("closed {}, purged {purged} cache entries", archive.id());
    Ok(())
}

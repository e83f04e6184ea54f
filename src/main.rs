// src/main.rs
//
// Headless runner: leadstream [CONFIG_JSON|-] [OUT_DIR] [SECONDS]
use std::env;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use leadstream::{render_snapshot_pngs, ChannelId, EcgEngine, EngineConfig, PlotStyle, StopOutcome};
use log::{info, warn};

const DEFAULT_RUN_SECS: u64 = 5;
// Readers deliberately run slower than the producer.
const CONSUMER_PERIOD: Duration = Duration::from_millis(250);

fn main() -> Result<()> {
    env_logger::init();
    let mut args = env::args().skip(1);
    let config = match args.next() {
        Some(path) if path != "-" => EngineConfig::from_json_file(&path)
            .with_context(|| format!("loading config from {path}"))?,
        _ => EngineConfig::default(),
    };
    let out_dir = PathBuf::from(args.next().unwrap_or_else(|| "leadstream-out".to_owned()));
    let run_for = match args.next() {
        Some(secs) => Duration::from_secs(
            secs.parse()
                .with_context(|| format!("invalid run time {secs:?}"))?,
        ),
        None => Duration::from_secs(DEFAULT_RUN_SECS),
    };

    let mut engine = EcgEngine::new(config).context("building engine")?;
    let running = Arc::new(AtomicBool::new(true));
    let consumer = {
        let publisher = engine.publisher();
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut last_version = None;
            let mut reads = 0u64;
            let mut repeats = 0u64;
            while running.load(Ordering::Relaxed) {
                let snapshot = publisher.read();
                reads += 1;
                if last_version == Some(snapshot.version()) {
                    repeats += 1;
                } else {
                    let lead = ChannelId::FIRST;
                    let s = snapshot.summary(lead);
                    info!(
                        "v{} {lead}: min {:.2} max {:.2} rms {:.2}",
                        snapshot.version(),
                        s.min,
                        s.max,
                        s.rms
                    );
                }
                last_version = Some(snapshot.version());
                thread::sleep(CONSUMER_PERIOD);
            }
            (reads, repeats)
        })
    };

    engine.start()?;
    thread::sleep(run_for);
    let outcome = engine.stop();
    running.store(false, Ordering::Relaxed);
    let (reads, repeats) = consumer
        .join()
        .map_err(|_| anyhow!("consumer thread panicked"))?;
    if outcome != StopOutcome::Joined {
        warn!("stop ended with {outcome:?}");
    }

    let snapshot = engine.read();
    info!(
        "finished at version {} after {reads} reads ({repeats} repeated)",
        snapshot.version()
    );

    fs::create_dir_all(&out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;
    fs::write(
        out_dir.join("snapshot.json"),
        serde_json::to_vec_pretty(&*snapshot)?,
    )?;
    match render_snapshot_pngs(&snapshot, &PlotStyle::default()) {
        Ok(pngs) => {
            for (id, png) in pngs {
                fs::write(out_dir.join(format!("lead_{}.png", id.get())), png)?;
            }
        }
        Err(e) => warn!("skipping PNG export: {e}"),
    }
    info!("wrote {}", out_dir.display());
    Ok(())
}

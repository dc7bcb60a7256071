//! Runtime demo — wires every component together end to end against mock
//! data: discovery, a mock device session, stream nodes, the sync engine,
//! the temporal store, the fusion engine, the distributor, and an adaptive
//! batcher on the high-rate gaze stream.
//!
//! ```bash
//! ./runtime-demo --ticks 200
//! ```

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use telemetry_fusion_runtime::config::{self, RuntimeConfig};
use telemetry_fusion_runtime::discovery::Discovery;
use telemetry_fusion_runtime::distributor::{Distributor, PublishOptions};
use telemetry_fusion_runtime::fusion::FusionEngine;
use telemetry_fusion_runtime::model::{SampleType, SourceDomain, SourceKey};
use telemetry_fusion_runtime::quality::QualityAssessor;
use telemetry_fusion_runtime::session::MockGenerator;
use telemetry_fusion_runtime::stream::{PassthroughProcessor, StreamNode};
use telemetry_fusion_runtime::sync::{stream_name, SyncEngine};
use telemetry_fusion_runtime::temporal::TemporalStore;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "runtime-demo", about = "Telemetry fusion runtime demo")]
struct CliArgs {
    /// Number of ticks to run before reporting and exiting.
    #[arg(long, default_value = "200")]
    ticks: u64,

    /// Path to a `telemetry_runtime.toml` override, bypassing the usual
    /// env-var / cwd-file / defaults search order.
    #[arg(long)]
    config: Option<String>,
}

fn now_ns() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as i64
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,runtime_demo=debug")),
        )
        .init();

    let args = CliArgs::parse();

    let runtime_config = match &args.config {
        Some(path) => RuntimeConfig::load_from_file(std::path::Path::new(path))?,
        None => RuntimeConfig::load(),
    };
    config::init(runtime_config);
    let cfg = config::get();

    info!(ticks = args.ticks, "starting telemetry fusion runtime demo");

    // ── Discovery (C9) ──────────────────────────────────────────────────
    let discovery = Discovery::new(cfg.discovery.clone());
    let mut discovery_events = discovery.subscribe();
    let found = discovery
        .run_window(Duration::from_millis(50), now_ns, || async { Vec::new() })
        .await?;
    for device in &found {
        info!(device_id = %device.id, name = %device.name, "discovered device");
    }
    while let Ok(event) = discovery_events.try_recv() {
        info!(?event, "discovery event");
    }

    // ── Shared components (C1-C3, C6, C7) ──────────────────────────────
    let quality = Arc::new(QualityAssessor::new());
    let temporal = Arc::new(TemporalStore::new(cfg.fusion.max_history));
    let fusion = Arc::new(FusionEngine::new(
        Arc::clone(&quality),
        Arc::clone(&temporal),
        cfg.fusion.thresholds,
    ));
    let mut fusion_events = fusion.subscribe_events();

    // ── Stream nodes (C4) ────────────────────────────────────────────────
    let gaze_key = SourceKey::new(SourceDomain::Human, SampleType::Behavioral);
    let telemetry_key = SourceKey::new(SourceDomain::Simulator, SampleType::Telemetry);

    let gaze_node = Arc::new(StreamNode::new(
        gaze_key,
        Arc::clone(&quality),
        vec![Box::new(PassthroughProcessor) as Box<_>],
        cfg.stream.buffer_size,
        cfg.stream.window_ms,
    ));
    let telemetry_node = Arc::new(StreamNode::new(
        telemetry_key,
        Arc::clone(&quality),
        vec![Box::new(PassthroughProcessor) as Box<_>],
        cfg.stream.buffer_size,
        cfg.stream.window_ms,
    ));

    // ── Sync engine (C5) ─────────────────────────────────────────────────
    let sync = Arc::new(SyncEngine::new(cfg.sync.strategy, cfg.sync.tolerance_ms));
    sync.register_stream(stream_name(gaze_key));
    sync.register_stream(stream_name(telemetry_key));

    // ── Distributor (C10) ────────────────────────────────────────────────
    let distributor = Arc::new(Distributor::new(cfg.distributor.clone()));
    let mut raw_rx = distributor.subscribe(vec!["raw.gaze".to_string(), "raw.telemetry".to_string()], "demo-client", 0.0)?;

    // Drain the demo subscription in the background so a slow reader never
    // backs up the publish path.
    let drain_handle = tokio::spawn(async move {
        let mut received = 0u64;
        while raw_rx.recv().await.is_some() {
            received += 1;
        }
        received
    });

    // ── Mock generators ──────────────────────────────────────────────────
    let gaze_gen = MockGenerator::with_default_rate(gaze_key);
    let telemetry_gen = MockGenerator::with_default_rate(telemetry_key);

    for tick in 0..args.ticks {
        let t_ns = now_ns();

        let gaze_sample = gaze_gen.next_sample(tick, t_ns);
        if let Ok(enriched) = gaze_node.process(gaze_sample, t_ns) {
            if let Ok(Some(tuple)) = sync.ingest(&stream_name(gaze_key), enriched.clone(), t_ns) {
                info!(anchor_stream = %tuple.anchor_stream, quality = tuple.quality, "synced tuple");
            }
            fusion.ingest_enriched(gaze_key, enriched.clone(), t_ns);
            if let Ok(payload) = serde_json::to_vec(&enriched) {
                distributor.publish(
                    telemetry_fusion_runtime::distributor::DistributedFrame {
                        topic: "raw.gaze".to_string(),
                        payload,
                        quality: enriched.quality.quality,
                    },
                    PublishOptions::default(),
                    t_ns,
                );
            }
        }

        if tick % 5 == 0 {
            let telemetry_sample = telemetry_gen.next_sample(tick / 5, t_ns);
            if let Ok(enriched) = telemetry_node.process(telemetry_sample, t_ns) {
                if let Ok(Some(tuple)) = sync.ingest(&stream_name(telemetry_key), enriched.clone(), t_ns) {
                    info!(anchor_stream = %tuple.anchor_stream, quality = tuple.quality, "synced tuple");
                }
                fusion.ingest_enriched(telemetry_key, enriched.clone(), t_ns);
                if let Ok(payload) = serde_json::to_vec(&enriched) {
                    distributor.publish(
                        telemetry_fusion_runtime::distributor::DistributedFrame {
                            topic: "raw.telemetry".to_string(),
                            payload,
                            quality: enriched.quality.quality,
                        },
                        PublishOptions::default(),
                        t_ns,
                    );
                }
            }
        }

        while let Ok(event) = fusion_events.try_recv() {
            tracing::debug!(?event, "fusion event");
        }
    }

    distributor.unsubscribe("demo-client");
    let received = drain_handle.await.unwrap_or(0);

    let metrics = fusion.metrics();
    info!(
        total_ingestions = metrics.total_ingestions,
        total_fusions = metrics.total_fusions,
        human_state = metrics.human_state_count,
        environmental = metrics.environmental_count,
        situational_awareness = metrics.situational_awareness_count,
        raw_frames_received = received,
        "demo run complete"
    );

    Ok(())
}

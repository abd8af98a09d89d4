use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use anyhow::{Context as _, bail};
use ptz_controller::{
    command_executor::{CommandQueue, command_sender::PtzCommandSender, commands::PtzStatus},
    config::{SessionConfig, create_default_config, init_config},
    controller::{Axis, PtzInput, StatusListener},
    logging,
};
use ptz_device::{IrMode, SimulatedCamera};
use tracing::info;

fn should_create_config() -> bool {
    std::env::var("CREATE_CONFIG")
        .map(|val| val == "1" || val.to_lowercase() == "true")
        .unwrap_or(false)
}

struct LogStatus;

impl StatusListener for LogStatus {
    fn status_changed(&self, status: &PtzStatus) {
        info!(%status, "Camera position");
    }
}

async fn wait_connected(queue: &CommandQueue, session: &SessionConfig) -> anyhow::Result<()> {
    let deadline = Instant::now() + session.connect_timeout();
    loop {
        if queue.connected() {
            return Ok(());
        }
        if queue.error() {
            bail!(
                "Failed to connect to camera: {}",
                queue.last_error().unwrap_or_default()
            );
        }
        if Instant::now() >= deadline {
            bail!("Timed out waiting for camera session");
        }
        tokio::time::sleep(session.poll_interval()).await;
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if should_create_config() {
        create_default_config(None::<PathBuf>)?;
    }

    let (config_manager, config) = init_config().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        eprintln!("Run with CREATE_CONFIG=1 to create a default configuration file.");
        e
    })?;

    let _log_guard = logging::init(&config.logging)?;
    info!(path = %config_manager.path().display(), "Configuration loaded");

    let camera = SimulatedCamera::new(config.device.name.as_str())
        .with_ranges(config.device.ranges())
        .with_latency(config.device.latency());

    let queue = Arc::new(CommandQueue::with_policy(config.session.failure_policy));
    queue.run(camera)?;
    wait_connected(&queue, &config.session).await?;

    if let Some(device) = queue.device_info() {
        info!(%device, "Camera ready");
    }

    let sender = PtzCommandSender::new(Arc::clone(&queue));
    let status = sender.status().await?;
    info!(%status, "Initial position");

    sender.absolute_move(Some(0.25), Some(0.75), None).await?;
    sender.relative_move(0.0, 0.0, 0.2).await?;
    sender.set_imaging_mode(IrMode::Auto).await?;

    let input = Arc::new(PtzInput::new(
        Arc::clone(&queue),
        config.input.clone(),
        Some(Arc::new(LogStatus)),
    ));
    input.start().context("Failed to start input channels")?;

    let demo = Arc::clone(&input);
    tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
        for _ in 0..3 {
            demo.wheel(config.input.wheel_delta);
        }
        demo.pointer_moved(600.0, 120.0, 800.0, 600.0);
        std::thread::sleep(Duration::from_millis(300));
        demo.pointer_released()?;
        demo.slider_moved(Axis::Zoom, 0.5)?;
        Ok(())
    })
    .await??;

    tokio::time::sleep(Duration::from_millis(500)).await;
    input.shutdown();

    let status = sender.status().await?;
    info!(%status, "Final position");

    let stats = queue.request_stats();
    info!(
        requests = stats.count(),
        average_ms = stats.average().as_millis() as u64,
        "Request statistics"
    );

    queue.must_exit();
    let worker = Arc::clone(&queue);
    tokio::task::spawn_blocking(move || worker.join()).await??;

    Ok(())
}

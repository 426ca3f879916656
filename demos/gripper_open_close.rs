use anyhow::Context;
use slow_mover::{CancellationToken, Config, OpenCloseCycle, SimulatedActuator};
use std::path::PathBuf;
use structopt::StructOpt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(StructOpt)]
#[structopt(about = "Slowly open then close a gripper")]
struct Args {
    #[structopt(long, parse(from_os_str), help = "TOML configuration file")]
    config: Option<PathBuf>,
    #[structopt(long, allow_hyphen_values = true, help = "Open position override")]
    open: Option<f64>,
    #[structopt(long, allow_hyphen_values = true, help = "Close position override")]
    close: Option<f64>,
    #[structopt(long, help = "Seconds per move")]
    duration: Option<f64>,
    #[structopt(long, help = "Control loop frequency in Hz")]
    rate: Option<u32>,
}

async fn wait_for_shutdown(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(terminate) => terminate,
            Err(err) => {
                warn!(error = %err, "cannot listen for SIGTERM");
                let _ = tokio::signal::ctrl_c().await;
                cancel.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("stop requested, shutting down");
    cancel.cancel();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let args = Args::from_args();

    let mut config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading configuration from {:?}", path))?,
        None => Config::default(),
    };
    if let Some(open) = args.open {
        config.cycle.open_position = open;
    }
    if let Some(close) = args.close {
        config.cycle.close_position = close;
    }
    if let Some(duration) = args.duration {
        config.cycle.move_duration_s = duration;
    }
    if let Some(rate) = args.rate {
        config.mover.rate_hz = rate;
    }
    config.validate()?;

    let cancel = CancellationToken::new();
    tokio::spawn(wait_for_shutdown(cancel.clone()));

    let cycle = OpenCloseCycle::new(config)?;
    let mut gripper = SimulatedActuator::new(0.4);
    let report = cycle.run(&mut gripper, &cancel).await?;

    if report.cancelled {
        info!("cycle cancelled, actuator disabled");
    } else {
        info!(
            position = gripper.position(),
            "cycle complete, actuator disabled"
        );
    }
    Ok(())
}

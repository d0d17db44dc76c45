//! Entry point: textured OBJ viewer.
//! Arrow keys/WASD move, the mouse looks around, Escape quits.

use std::process::ExitCode;

use anyhow::Result;
use platform::AppConfig;

const ASSET_DIR: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../assets");

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AppConfig::with_asset_dir(ASSET_DIR);
    log::info!(
        "Starting model viewer. window_size={}x{}, msaa={}, model={:?}",
        config.width,
        config.height,
        config.sample_count,
        config.model
    );

    ExitCode::from(report(platform::run(config)))
}

/// The single place a fatal error is reported. Returns the process status.
fn report(result: Result<()>) -> u8 {
    match result {
        Ok(()) => {
            log::info!("Graceful shutdown. Bye!");
            0
        }
        Err(err) => {
            log::error!("Fatal: {err:#}");
            1
        }
    }
}

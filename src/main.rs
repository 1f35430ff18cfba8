use std::env;
use std::path::PathBuf;
use std::process;

use tracing::error;
use tracing_subscriber::EnvFilter;
use worker_bundler::{build_worker, BuildConfig, BuildMode};

const USAGE: &str =
    "usage: worker-bundler [--root <dir>] [--mode development|production] [--config <file>]";

#[derive(Debug, Default, PartialEq, Eq)]
struct CliArgs {
    root: Option<PathBuf>,
    mode: Option<BuildMode>,
    config: Option<PathBuf>,
    help: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    if let Err(err) = run().await {
        error!("❌ Build failed: {err}");
        process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let args = parse_args(env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }

    let root = match args.root {
        Some(root) => root,
        None => env::current_dir().map_err(|e| format!("cannot read working directory: {e}"))?,
    };
    let mode = args
        .mode
        .unwrap_or_else(|| BuildMode::from_env_value(env::var("NODE_ENV").ok().as_deref()));

    let config = BuildConfig::load(root, Some(mode), args.config.as_deref())
        .map_err(|e| e.to_string())?;
    build_worker(&config).await.map_err(|e| e.to_string())?;
    Ok(())
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<CliArgs, String> {
    let mut parsed = CliArgs::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("missing value for {flag}. {USAGE}"))
        };
        match arg.as_str() {
            "--root" => parsed.root = Some(PathBuf::from(value("--root")?)),
            "--mode" => {
                let mode = value("--mode")?;
                parsed.mode = Some(BuildMode::parse(&mode).map_err(|e| e.to_string())?);
            }
            "--config" => parsed.config = Some(PathBuf::from(value("--config")?)),
            "-h" | "--help" => {
                parsed.help = true;
                return Ok(parsed);
            }
            _ => return Err(format!("unknown argument '{arg}'. {USAGE}")),
        }
    }

    Ok(parsed)
}

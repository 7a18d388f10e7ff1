use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;
use vision_snip_core::{AppError, Config, VisionSnip, config::API_KEY_VAR};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Prompt sent with each capture, instead of the saved one
    #[arg(short, long)]
    prompt: Option<String>,

    /// Override the model defined in .env or the settings file
    #[arg(short, long)]
    model: Option<String>,

    /// Select which monitor to capture
    #[arg(long, default_value_t = 0)]
    monitor: usize,

    /// List available monitors and exit
    #[arg(long)]
    list_monitors: bool,

    /// Don't write a copy of each capture to disk
    #[arg(long)]
    no_debug_image: bool,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    // Handle --list-monitors
    if args.list_monitors {
        println!("Available monitors:");
        for info in VisionSnip::list_monitors().context("Failed to enumerate monitors")? {
            println!("{}", info);
        }
        return Ok(());
    }

    let mut config = match Config::load() {
        Ok(config) => config,
        Err(AppError::MissingEnvVar(var)) if var == API_KEY_VAR => {
            anyhow::bail!(
                "{} is not set. Add it to your environment or a .env file.",
                API_KEY_VAR
            );
        }
        Err(e) => return Err(e).context("Failed to load configuration"),
    };
    if args.no_debug_image {
        config.debug_image_path = None;
    }

    let mut app = VisionSnip::with_config(config).monitor(args.monitor);
    if let Some(prompt) = args.prompt {
        app = app.prompt(prompt);
    }
    if let Some(model) = args.model {
        app = app.model(model);
    }

    app.run()
        .context("Failed to run Vision Snip. Try using --list-monitors to check indices")
}

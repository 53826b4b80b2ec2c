mod launch;
mod run_local;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::launch::SubmitArgs;
use crate::run_local::RunLocalArgs;

#[derive(Parser, Debug)]
#[command(name = "streamfuse")]
#[command(about = "streamfuse command line", long_about = None)]
struct Cli {
    /// Log filter used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the runtime invocation for a driver executable.
    Submit(SubmitArgs),
    /// Build a fused pipeline and run it on the in-process runtime.
    RunLocal(RunLocalArgs),
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Submit(args) => {
            let command = args.translate()?;
            if let Some(bundle) = &command.bundle {
                tracing::info!(
                    "cluster deploy: {} must be archived to {}",
                    bundle.source_dir.display(),
                    bundle.archive.display()
                );
            }
            println!("{}", command);
        }
        Commands::RunLocal(args) => run_local::run(&args)?,
    }
    Ok(())
}

use std::process;

use clap::{Parser, Subcommand};
use notebook_init::{
    command::ShellRunner,
    config::Config,
    errors::{Error, Result},
    metadata::{self, Role},
    provision::{self, Outcome},
};

#[derive(Parser)]
#[command(name = "notebook-init")]
#[command(about = "Provisions a Jupyter notebook server on the cluster master node")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision this node (no-op unless it is the master)
    Provision {
        /// YAML config file (defaults to the built-in layout)
        #[arg(short, long)]
        config: Option<String>,

        /// Skip the metadata query and use this role (e.g., "Master")
        #[arg(long)]
        role: Option<String>,
    },

    /// Render the generated files into a directory without running anything
    Render {
        /// Artifact hash to render the file names with
        #[arg(long)]
        hash: String,

        #[arg(short, long)]
        output_dir: String,

        #[arg(short, long)]
        config: Option<String>,
    },

    /// Print (or write) the default YAML config
    DefaultConfig {
        #[arg(short, long)]
        output: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    // ref. https://github.com/env-logger-rs/env_logger/issues/47
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Provision { config, role } => run_provision(config, role).await,
        Commands::Render {
            hash,
            output_dir,
            config,
        } => run_render(config, &hash, &output_dir),
        Commands::DefaultConfig { output } => run_default_config(output),
    };

    if let Err(e) = result {
        log::error!("{}", e);
        process::exit(1);
    }
}

fn load_config(path: Option<String>) -> Result<Config> {
    match path {
        Some(p) => Config::load(&p),
        None => Ok(Config::default()),
    }
}

async fn run_provision(config: Option<String>, role: Option<String>) -> Result<()> {
    let cfg = load_config(config)?;

    let role = match role {
        Some(r) => {
            log::info!("using role '{}' from the command line", r);
            Role::from(r.as_str())
        }
        None => metadata::fetch_role(&cfg.metadata, &cfg.retry).await?,
    };

    // blocking commands; keep them off the async workers
    let outcome = tokio::task::spawn_blocking(move || {
        provision::provision(&role, &cfg, &ShellRunner)
    })
    .await
    .map_err(|e| Error::Other {
        message: format!("provisioning task failed {}", e),
        retryable: false,
    })??;

    match outcome {
        Outcome::Skipped(role) => log::info!("skipped provisioning on '{}' node", role),
        Outcome::Provisioned { hash } => log::info!("SUCCESS provisioned with hash '{}'", hash),
    }
    Ok(())
}

fn run_render(config: Option<String>, hash: &str, output_dir: &str) -> Result<()> {
    let cfg = load_config(config)?;
    cfg.validate()?;

    for p in provision::render(&cfg, hash, output_dir)? {
        println!("{}", p);
    }
    Ok(())
}

fn run_default_config(output: Option<String>) -> Result<()> {
    let cfg = Config::default();
    match output {
        Some(p) => cfg.sync(&p),
        None => {
            print!("{}", cfg.encode_yaml()?);
            Ok(())
        }
    }
}

//! Robokit CLI
//!
//! - `export`: simulate a job file and print or save the program for one platform
//! - `run`: drive a job through the chain service against the console device

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use robokit::events::output;
use robokit::{
    compiler_for, ChainService, Config, ConsoleDevice, CursorChain, ExecutionMode, Instruction, Issued, JobFile,
    Platform, Stage,
};
use std::fs;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "robokit")]
#[command(about = "Simulate robot motion jobs and generate controller programs")]
#[command(version)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a job file into a program
    Export {
        /// Job file (YAML)
        job: String,
        /// Target platform, overrides the config
        #[arg(short, long, value_enum)]
        platform: Option<PlatformArg>,
        /// Write the program here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
        /// Inline targets instead of declaring them
        #[arg(long)]
        inline: bool,
    },
    /// Run a job against the console device
    Run {
        /// Job file (YAML)
        job: String,
        /// Execution mode, overrides the config
        #[arg(short, long, value_enum)]
        mode: Option<ModeArg>,
        /// Print uploaded programs line by line
        #[arg(long)]
        pretty: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Abb,
    Ur,
    Kuka,
    Human,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Self {
        match arg {
            PlatformArg::Abb => Platform::Abb,
            PlatformArg::Ur => Platform::Ur,
            PlatformArg::Kuka => Platform::Kuka,
            PlatformArg::Human => Platform::Human,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ModeArg {
    Execute,
    Stream,
}

impl Args {
    fn get_config_path(&self) -> String {
        self.config
            .clone()
            .or_else(|| std::env::var("ROBOKIT_CONFIG").ok())
            .unwrap_or_else(|| "config/default_config.yaml".to_string())
    }
}

fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::load_from_path(path).with_context(|| format!("Failed to load config {}", path))
    } else {
        warn!("Config {} not found, using defaults", path);
        Ok(Config::default())
    }
}

fn report(issued: &Issued) {
    output::action_issued(&issued.action);
    for warning in &issued.warnings {
        output::safety_warning(warning);
    }
}

fn export(config: &Config, job: &JobFile, platform: Platform, inline: bool, output_path: Option<&str>) -> Result<()> {
    let mut chain = CursorChain::from_config(config).context("Failed to initialize cursor chain")?;
    for instruction in job.instructions() {
        match instruction {
            Instruction::Issue(kind) => {
                let description = kind.to_string();
                chain
                    .issue(kind)
                    .with_context(|| format!("Job '{}' rejected: {}", job.name, description))?;
            }
            Instruction::MarkBlock => chain.mark_block(Stage::Write)?,
        }
    }

    let compiler = compiler_for(platform);
    let write = chain
        .cursor(Stage::Write)
        .context("Cursor chain has no write stage")?;
    let program = compiler.generate_program(&job.name, write, job.uses_block(), inline)?;

    match output_path {
        Some(path) => {
            let mut text = program.join("\n");
            text.push('\n');
            fs::write(path, text).with_context(|| format!("Failed to write {}", path))?;
            info!("Wrote {} lines for {} to {}", program.len(), platform, path);
        }
        None => {
            for line in &program {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

async fn run(config: &Config, job: &JobFile, mode: ExecutionMode, pretty: bool) -> Result<()> {
    let device = if pretty { ConsoleDevice::pretty() } else { ConsoleDevice::new() };
    let handle = ChainService::spawn(config, Arc::new(device));
    handle.initialize(config.cursor.initial_state()).await?;

    for instruction in job.instructions() {
        match instruction {
            Instruction::Issue(kind) => {
                let description = kind.to_string();
                match handle.issue(kind).await {
                    Ok(issued) => report(&issued),
                    Err(e) => {
                        output::action_rejected(&description, &e.to_string());
                        handle.shutdown().await?;
                        return Err::<(), _>(e).context(format!("Job '{}' stopped", job.name));
                    }
                }
            }
            Instruction::MarkBlock => handle.mark_block().await?,
        }
    }

    match mode {
        ExecutionMode::Stream => {
            let pending = handle.snapshot(Stage::Write).await?.pending;
            let (advance, signals) = mpsc::channel(pending.max(1));
            let task = handle.stream(signals);
            // The console device consumes instructions as soon as they are printed
            for _ in 0..pending {
                if advance.send(()).await.is_err() {
                    break;
                }
            }
            drop(advance);
            let sent = task.await.context("Streaming task panicked")??;
            info!("Streamed {} instructions", sent);
        }
        ExecutionMode::Execute | ExecutionMode::Offline => {
            // Uploaded under the controller-side program name
            let name = &config.execution.program_name;
            let program = handle.export(name, job.uses_block()).await?;
            output::program(name, &config.compiler.platform.to_string(), program.len());
            match handle.execute(name, job.uses_block()).await? {
                Some(released) => {
                    for warning in &released.warnings {
                        output::safety_warning(warning);
                    }
                }
                None => warn!("Device busy, '{}' was not started", name),
            }
        }
    }

    handle.shutdown().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config_path = args.get_config_path();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(&config_path)?;

    let result = match &args.command {
        Command::Export { job, platform, output, inline } => {
            let job = JobFile::load_from_path(job).with_context(|| format!("Failed to load job {}", job))?;
            let platform = platform.map(Platform::from).unwrap_or(config.compiler.platform);
            let inline = *inline || config.compiler.inline_targets;
            export(&config, &job, platform, inline, output.as_deref())
        }
        Command::Run { job, mode, pretty } => {
            let job = JobFile::load_from_path(job).with_context(|| format!("Failed to load job {}", job))?;
            let mode = match mode {
                Some(ModeArg::Execute) => ExecutionMode::Execute,
                Some(ModeArg::Stream) => ExecutionMode::Stream,
                None => config.execution.mode,
            };
            run(&config, &job, mode, *pretty).await
        }
    };

    if let Err(e) = &result {
        error!("{:#}", e);
    }
    result
}

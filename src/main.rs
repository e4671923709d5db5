//! Ferry CLI - remote deploy runner for static sites
//!
//! Usage: ferry <COMMAND>
//!
//! Commands:
//!   deploy  Run the deploy sequence on the configured hosts

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use is_terminal::IsTerminal;

/// Ferry - remote deploy runner for static sites
#[derive(Parser, Debug)]
#[command(name = "ferry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output format for CI
    #[arg(long, default_value = "false")]
    json: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the deploy sequence on the configured hosts
    Deploy {
        /// Path to a ferry.toml config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print the command sequence without connecting
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Deploy { config, dry_run } => {
            cmd_deploy(config.as_deref(), dry_run, cli.json, cli.verbose)
        }
    }
}

/// Icons for output rendering
struct Icons {
    check: &'static str,
    run: &'static str,
    warn: &'static str,
}

impl Icons {
    fn unicode() -> Self {
        Self {
            check: "✓",
            run: "→",
            warn: "⚠",
        }
    }

    fn ascii() -> Self {
        Self {
            check: "[OK]",
            run: "->",
            warn: "[WARN]",
        }
    }

    fn auto() -> Self {
        if std::io::stdout().is_terminal() {
            Self::unicode()
        } else {
            Self::ascii()
        }
    }
}

fn cmd_deploy(config_path: Option<&Path>, dry_run: bool, json: bool, verbose: u8) -> Result<()> {
    use ferry::config::Config;
    use ferry::deploy::{DeployEvent, DeployOptions, DeployRunner};

    let (config, warnings) = match config_path {
        Some(path) => Config::load_with_warnings(path)?,
        None => Config::discover()?,
    };

    let icons = Icons::auto();

    for warning in &warnings {
        if json {
            let output = serde_json::json!({
                "event": "warning",
                "key": warning.key,
                "file": warning.file.display().to_string(),
            });
            println!("{}", serde_json::to_string(&output)?);
        } else {
            eprintln!(
                "{} unknown config key '{}' in {}",
                icons.warn,
                warning.key,
                warning.file.display()
            );
        }
    }

    if !json {
        println!("🚢 Ferry Deploy");
        println!("Hosts: {}", config.hosts.join(", "));
        println!("Site: {}", config.site.path);
        if dry_run {
            println!("Mode: Dry run");
        }
    }

    let options = DeployOptions {
        dry_run,
        json,
        verbose,
    };
    let runner = DeployRunner::new(config, options);

    let result = runner.run_with_callback(Some(|event: DeployEvent| match event {
        DeployEvent::HostStarted { host } => {
            if json {
                println!("{}", serde_json::json!({"event": "host", "host": host}));
            } else {
                println!("\n[{}]", host);
            }
        }
        DeployEvent::ScopeEntered { command } => {
            if json {
                println!("{}", serde_json::json!({"event": "scope", "command": command}));
            } else {
                println!("  {} {}", icons.run, command);
            }
        }
        DeployEvent::CommandRun { command, output } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({"event": "run", "command": command, "output": output})
                );
            } else {
                println!("  {} {}", icons.run, command);
                if verbose > 0 && !output.is_empty() {
                    for line in output.lines() {
                        println!("    {}", line);
                    }
                }
            }
        }
        DeployEvent::HostFinished { host, commands } => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({"event": "host-done", "host": host, "commands": commands})
                );
            } else {
                println!("  {} {} ({} commands)", icons.check, host, commands);
            }
        }
        DeployEvent::Planned { command } => {
            if !json {
                println!("  {} {}", icons.run, command);
            }
        }
    }));

    match result {
        Ok(report) => {
            if json {
                let output = if dry_run {
                    serde_json::json!({
                        "event": "deploy",
                        "status": "dry-run",
                        "commands": runner.plan(),
                    })
                } else {
                    serde_json::json!({
                        "event": "deploy",
                        "status": "success",
                        "hosts": report.hosts.len(),
                        "commands": report.commands,
                    })
                };
                println!("{}", serde_json::to_string(&output)?);
            } else if dry_run {
                println!("\nDry run - nothing was issued.");
            } else {
                println!(
                    "\n{} Deployed to {} host(s), {} commands",
                    icons.check,
                    report.hosts.len(),
                    report.commands
                );
            }
            Ok(())
        }
        Err(err) => {
            if json {
                let output = serde_json::json!({
                    "event": "deploy",
                    "status": "failed",
                    "error": err.to_string(),
                });
                println!("{}", serde_json::to_string(&output)?);
            }
            Err(err.into())
        }
    }
}

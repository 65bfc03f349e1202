use std::thread;

use atty::Stream;
use clap::Parser;
use color_eyre::Result;
use serde_json::json;
use tokio::signal;
use vefixer_core::{
    config::parse_timeout, migrate_all, parse_twin_pair, CancelToken, CommandRunner, ConfigError,
    ExecutionOutcome, MigrationConfig, MigrationSummary, SimulatedRunner, SystemRunner,
    TargetManager, TwinProjectConvention,
};

mod cli;
mod output;
mod style;

use cli::VefixerCli;
use style::Style;

fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = VefixerCli::parse();
    init_tracing(cli.trace, cli.verbose);

    let config = match build_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            let outcome =
                ExecutionOutcome::user_error(err.to_string(), json!({ "error": err.to_string() }));
            let code = emit_output(&cli, &outcome, None)?;
            std::process::exit(code);
        }
    };

    let cancel = CancelToken::new();
    listen_for_interrupt(cancel.clone());

    let runner: Box<dyn CommandRunner> = if config.dry_run {
        Box::new(SimulatedRunner::new())
    } else {
        Box::new(SystemRunner::new(&config, cancel.clone()))
    };
    tracing::debug!(
        target_manager = %config.target,
        dry_run = config.dry_run,
        roots = ?cli.directories,
        "starting migration"
    );
    let summary = migrate_all(&cli.directories, &config, runner.as_ref(), &cancel);
    let outcome = summary.to_outcome();
    let code = emit_output(&cli, &outcome, Some(&summary))?;

    if code == 0 {
        Ok(())
    } else {
        std::process::exit(code);
    }
}

fn init_tracing(trace: bool, verbose: u8) {
    let level = if trace {
        "trace"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = format!(
        "vefixer={level},vefixer_cli={level},vefixer_core={level},vefixer_domain={level}"
    );
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn build_config(cli: &VefixerCli) -> Result<MigrationConfig, ConfigError> {
    let mut config = MigrationConfig::from_env(TargetManager::from(cli.target))?;
    config.ignore.extend(cli.ignore.iter().cloned());
    config.dry_run = cli.dry_run;
    config.debug = cli.debug;
    if let Some(raw) = &cli.timeout {
        config.command_timeout = parse_timeout("--timeout", raw)?;
    }
    if cli.no_twin {
        config.twin_projects = TwinProjectConvention::disabled();
    } else if !cli.twin.is_empty() {
        let pairs = cli
            .twin
            .iter()
            .map(|raw| parse_twin_pair(raw))
            .collect::<Result<Vec<_>, _>>()?;
        config.twin_projects = TwinProjectConvention::new(pairs);
    }
    Ok(config)
}

/// Sets `cancel` on Ctrl-C or SIGTERM. The running command is killed and the
/// run stops before the next migration step.
fn listen_for_interrupt(cancel: CancelToken) {
    let spawned = thread::Builder::new()
        .name("vefixer-signals".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    tracing::warn!("failed to start signal listener: {err}");
                    return;
                }
            };
            runtime.block_on(wait_for_signal());
            tracing::warn!("interrupted; stopping after the current step");
            cancel.cancel();
        });
    if let Err(err) = spawned {
        tracing::warn!("failed to spawn signal listener: {err}");
    }
}

async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

fn emit_output(
    cli: &VefixerCli,
    outcome: &ExecutionOutcome,
    summary: Option<&MigrationSummary>,
) -> Result<i32> {
    let code = outcome.exit_code();
    let style = Style::new(cli.no_color, atty::is(Stream::Stdout));

    if cli.json {
        let payload = outcome.to_json_response();
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else if !cli.quiet {
        if let Some(summary) = summary {
            if let Some(table) = output::format_environment_table(&style, summary) {
                println!("{table}");
            }
            if let Some(issues) = output::format_discovery_issues(&style, summary) {
                println!("{issues}");
            }
        }
        println!("{}", style.status(&outcome.status, &outcome.message));
    } else if code != 0 {
        eprintln!("{}", outcome.message);
    }

    Ok(code)
}

//! `vellum` command-line shell
//!
//! Exit status: 0 when a publish or rollback was accepted or skipped (and
//! for successful queries), 2 for request errors such as an unknown slot or
//! revision, 1 for everything else.

mod cli;

use anyhow::{Context, Result};
use clap::ArgMatches;
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;
use vellum_artifact::{Revision, SlotName};
use vellum_core::{PublishOutcome, PublishRequest, Publisher, PublisherConfig, RollbackRequest};
use vellum_normalize::ContentNormalizer;

const EXIT_FAILURE: u8 = 1;
const EXIT_USER_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let matches = cli::build_cli().get_matches();
    let Some((name, args)) = matches.subcommand() else {
        return ExitCode::from(EXIT_USER_ERROR);
    };
    init_tracing(args.get_flag("log-json"));

    match run(name, args).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %format!("{e:#}"), "command failed");
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_ansi(std::io::stderr().is_terminal()).init();
    }
}

async fn run(name: &str, args: &ArgMatches) -> Result<ExitCode> {
    if name == "check" {
        return check(args);
    }

    let config = cli::load_config(args)?;
    match name {
        "publish" => publish(config, args).await,
        "rollback" => rollback(config, args).await,
        "history" => history(config, args).await,
        "preview" => preview(config, args).await,
        other => anyhow::bail!("unknown command {other}"),
    }
}

fn slot_arg(args: &ArgMatches) -> std::result::Result<SlotName, ExitCode> {
    let raw = args.get_one::<String>("slot").map_or("", String::as_str);
    SlotName::new(raw).map_err(|e| user_error(&e))
}

fn user_error(err: &dyn std::fmt::Display) -> ExitCode {
    eprintln!("error: {err}");
    ExitCode::from(EXIT_USER_ERROR)
}

async fn publish(config: PublisherConfig, args: &ArgMatches) -> Result<ExitCode> {
    let content = match args.get_one::<PathBuf>("file") {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading content from stdin")?;
            buf
        }
    };

    let mut request = PublishRequest::new(
        args.get_one::<String>("slot").cloned().unwrap_or_default(),
        content,
    );
    request.message = args.get_one::<String>("message").cloned();
    request.prompt = args.get_one::<String>("prompt").cloned();
    request.force = args.get_flag("force");

    let outcome = Publisher::from_config(config).publish(request).await;
    report(&outcome)
}

async fn rollback(config: PublisherConfig, args: &ArgMatches) -> Result<ExitCode> {
    let request = RollbackRequest {
        slot: args.get_one::<String>("slot").cloned().unwrap_or_default(),
        target: args.get_one::<String>("to").cloned(),
    };
    let outcome = Publisher::from_config(config).rollback(request).await;
    report(&outcome)
}

async fn history(config: PublisherConfig, args: &ArgMatches) -> Result<ExitCode> {
    let slot = match slot_arg(args) {
        Ok(slot) => slot,
        Err(code) => return Ok(code),
    };
    let records = Publisher::from_config(config).history(&slot).await?;

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(ExitCode::SUCCESS);
    }
    if records.is_empty() {
        println!("no publications recorded for {slot}");
    }
    for record in &records {
        let origin = record
            .rollback_source()
            .map(|from| format!(" (rollback to {})", from.short()))
            .unwrap_or_default();
        println!(
            "{}  {}  {}{}",
            record.timestamp.format("%Y-%m-%d %H:%M:%S"),
            record.revision.short(),
            first_line(&record.prompt),
            origin
        );
    }
    Ok(ExitCode::SUCCESS)
}

async fn preview(config: PublisherConfig, args: &ArgMatches) -> Result<ExitCode> {
    let slot = match slot_arg(args) {
        Ok(slot) => slot,
        Err(code) => return Ok(code),
    };
    let raw = args.get_one::<String>("revision").map_or("", String::as_str);
    let revision = match Revision::new(raw) {
        Ok(revision) => revision,
        Err(e) => return Ok(user_error(&e)),
    };

    match Publisher::from_config(config).preview(&slot, &revision).await {
        Ok(content) => {
            print!("{content}");
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.is_not_found() => Ok(user_error(&e)),
        Err(e) => Err(e.into()),
    }
}

fn check(args: &ArgMatches) -> Result<ExitCode> {
    let read = |name: &str| -> Result<String> {
        let path = args
            .get_one::<PathBuf>(name)
            .with_context(|| format!("missing <{name}>"))?;
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))
    };
    let (a, b) = (read("a")?, read("b")?);

    let normalizer = ContentNormalizer::new();
    let (sig_a, sig_b) = (normalizer.normalize(&a), normalizer.normalize(&b));
    let equivalent = sig_a == sig_b;
    let report = serde_json::json!({
        "equivalent": equivalent,
        "a": sig_a,
        "b": sig_b,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if equivalent {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_FAILURE)
    })
}

fn report(outcome: &PublishOutcome) -> Result<ExitCode> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    Ok(match outcome {
        PublishOutcome::Accepted { .. } | PublishOutcome::Skipped { .. } => ExitCode::SUCCESS,
        PublishOutcome::Failed { kind, .. } if kind.is_user_error() => {
            ExitCode::from(EXIT_USER_ERROR)
        }
        PublishOutcome::Failed { .. } => ExitCode::from(EXIT_FAILURE),
    })
}

fn first_line(text: &str) -> &str {
    text.lines().next().unwrap_or("")
}

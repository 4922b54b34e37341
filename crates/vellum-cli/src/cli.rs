//! Argument parsing and configuration assembly

use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use vellum_core::PublisherConfig;

pub(crate) fn build_cli() -> Command {
    let slot = || {
        Arg::new("slot")
            .long("slot")
            .short('s')
            .required(true)
            .help("Slot name (the page is <slot>.html)")
    };

    Command::new("vellum")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Publish and roll back generated pages in a git repository")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("repo")
                .long("repo")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Working copy root (overrides repo_root)"),
        )
        .arg(
            Arg::new("remote")
                .long("remote")
                .global(true)
                .help("Remote name (overrides remote)"),
        )
        .arg(
            Arg::new("branch")
                .long("branch")
                .global(true)
                .help("Published branch (overrides branch)"),
        )
        .arg(
            Arg::new("audit-dir")
                .long("audit-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Audit log directory (overrides audit_dir)"),
        )
        .arg(
            Arg::new("preview-dir")
                .long("preview-dir")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Preview directory (overrides preview_dir)"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .global(true)
                .value_parser(value_parser!(u64))
                .help("Per-command timeout in seconds"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
        .subcommand(
            Command::new("publish")
                .about("Publish a page, skipping cosmetic-only changes")
                .arg(slot())
                .arg(
                    Arg::new("file")
                        .long("file")
                        .short('f')
                        .value_parser(value_parser!(PathBuf))
                        .help("Read content from a file instead of stdin"),
                )
                .arg(
                    Arg::new("message")
                        .long("message")
                        .short('m')
                        .help("Commit message"),
                )
                .arg(
                    Arg::new("prompt")
                        .long("prompt")
                        .help("Prompt that produced the content, for the audit log"),
                )
                .arg(
                    Arg::new("force")
                        .long("force")
                        .action(ArgAction::SetTrue)
                        .help("Publish even if equivalent to the current page"),
                ),
        )
        .subcommand(
            Command::new("rollback")
                .about("Republish an earlier revision as a new revision")
                .arg(slot())
                .arg(
                    Arg::new("to")
                        .long("to")
                        .help("Revision to restore (default: the one before the latest)"),
                ),
        )
        .subcommand(
            Command::new("history")
                .about("List audit records of a slot")
                .arg(slot())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("preview")
                .about("Print a slot as published at a revision")
                .arg(slot())
                .arg(
                    Arg::new("revision")
                        .long("revision")
                        .short('r')
                        .required(true)
                        .help("Revision id"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Report whether two files are equivalent pages")
                .arg(
                    Arg::new("a")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                )
                .arg(
                    Arg::new("b")
                        .required(true)
                        .value_parser(value_parser!(PathBuf)),
                ),
        )
}

/// Config file (if any) with command-line overrides applied
///
/// Takes the subcommand's matches, which carry every global argument.
pub(crate) fn load_config(matches: &ArgMatches) -> Result<PublisherConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => PublisherConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => PublisherConfig::default(),
    };

    if let Some(repo) = matches.get_one::<PathBuf>("repo") {
        config.repo_root = repo.clone();
    }
    if let Some(remote) = matches.get_one::<String>("remote") {
        config.remote = remote.clone();
    }
    if let Some(branch) = matches.get_one::<String>("branch") {
        config.branch = branch.clone();
    }
    if let Some(dir) = matches.get_one::<PathBuf>("audit-dir") {
        config.audit_dir = dir.clone();
    }
    if let Some(dir) = matches.get_one::<PathBuf>("preview-dir") {
        config.preview_dir = dir.clone();
    }
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        config.command_timeout_secs = *secs;
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

use std::path::PathBuf;

use clap::{value_parser, ArgAction, Parser, ValueEnum};
use vefixer_core::TargetManager;

pub const VEFIXER_HELP_TEMPLATE: &str =
    "{before-help}\nUsage:\n    {usage}\n\nArguments:\n{positionals}\n\nOptions:\n{options}\n{after-help}";

pub const VEFIXER_BEFORE_HELP: &str = concat!(
    "vefixer ",
    env!("CARGO_PKG_VERSION"),
    " – Rebuild Python virtualenvs on a new toolchain manager\n\n",
    "Finds every `<env>/bin/python` link under the given directories, rebuilds the\n",
    "environment with the target manager's interpreter of the same version, then\n",
    "reinstalls dependencies from poetry.lock or requirements.txt.\n",
);

#[derive(Parser, Debug)]
#[command(
    name = "vefixer",
    author,
    version,
    before_help = VEFIXER_BEFORE_HELP,
    help_template = VEFIXER_HELP_TEMPLATE,
    after_help = "Examples:\n  vefixer ~/src --dry-run\n  vefixer ~/src ~/work -i vendor --twin admin=tools\n"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct VefixerCli {
    #[arg(
        value_name = "DIRECTORIES",
        default_value = ".",
        value_parser = value_parser!(PathBuf),
        help = "Directories to search for virtual environments"
    )]
    pub directories: Vec<PathBuf>,
    #[arg(
        short,
        long = "ignore",
        value_name = "NAME",
        action = ArgAction::Append,
        help = "Directory name to skip while searching (added to the defaults)"
    )]
    pub ignore: Vec<String>,
    #[arg(
        short = 'n',
        long,
        help = "Report what would change without running anything"
    )]
    pub dry_run: bool,
    #[arg(
        short,
        long,
        value_enum,
        default_value_t = TargetArg::Mise,
        help = "Toolchain manager to migrate to"
    )]
    pub target: TargetArg,
    #[arg(
        long = "twin",
        value_name = "LEFT=RIGHT",
        action = ArgAction::Append,
        conflicts_with = "no_twin",
        help = "Sibling directory pair searched for requirements (replaces administrator=eng-tools)"
    )]
    pub twin: Vec<String>,
    #[arg(long, help = "Never look in a twin project for requirements")]
    pub no_twin: bool,
    #[arg(
        long,
        value_name = "SECS",
        env = "VEFIXER_COMMAND_TIMEOUT",
        help = "Kill external commands after SECS seconds (0 disables)"
    )]
    pub timeout: Option<String>,
    #[arg(short, long, action = ArgAction::Count, help = "Increase logging (-vv reaches trace)")]
    pub verbose: u8,
    #[arg(long, help = "Log the output of failing commands")]
    pub debug: bool,
    #[arg(long, help = "Force trace logging regardless of -v")]
    pub trace: bool,
    #[arg(
        short,
        long,
        help = "Suppress human output (errors still print to stderr)"
    )]
    pub quiet: bool,
    #[arg(long, help = "Emit {status,message,details} JSON envelopes")]
    pub json: bool,
    #[arg(long, help = "Disable colored human output")]
    pub no_color: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetArg {
    Mise,
    Pyenv,
    Rtx,
}

impl From<TargetArg> for TargetManager {
    fn from(value: TargetArg) -> Self {
        match value {
            TargetArg::Mise => TargetManager::Mise,
            TargetArg::Pyenv => TargetManager::Pyenv,
            TargetArg::Rtx => TargetManager::Rtx,
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn defaults_search_the_current_directory() {
        let cli = VefixerCli::try_parse_from(["vefixer"]).expect("parse");
        assert_eq!(cli.directories, vec![PathBuf::from(".")]);
        assert_eq!(cli.target, TargetArg::Mise);
        assert!(!cli.dry_run);
        assert!(cli.ignore.is_empty());
    }

    #[test]
    fn repeated_flags_accumulate() {
        let cli = VefixerCli::try_parse_from([
            "vefixer", "a", "b", "-i", "vendor", "--ignore", "out", "-n", "-t", "pyenv", "-vv",
        ])
        .expect("parse");
        assert_eq!(cli.directories, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(cli.ignore, vec!["vendor", "out"]);
        assert!(cli.dry_run);
        assert_eq!(TargetManager::from(cli.target), TargetManager::Pyenv);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn twin_pairs_conflict_with_no_twin() {
        let err = VefixerCli::try_parse_from(["vefixer", "--twin", "a=b", "--no-twin"])
            .expect_err("conflicting flags");
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn trace_help_only_mentions_verbosity() {
        let command = VefixerCli::command();
        let trace = command
            .get_arguments()
            .find(|arg| arg.get_id() == "trace")
            .expect("trace flag");
        let help = trace.get_help().expect("help text").to_string();
        assert!(help.contains("-v"));
        assert!(!help.contains("-q"), "help: {help}");
    }
}

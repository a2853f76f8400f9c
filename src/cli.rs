//! CLI argument definitions using clap with subcommand architecture

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::daemon::EngineMode;

/// Incremental reconciliation engine for template-embedded data queries
#[derive(Parser, Debug)]
#[command(name = "querysync")]
#[command(about = "Keeps the site store consistent with queries embedded in template files")]
#[command(version)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Execution mode override; `build` forces a single pass with no
    /// watching regardless of subcommand
    #[arg(long, value_enum, env = "QUERYSYNC_MODE", global = true)]
    pub mode: Option<ModeArg>,

    /// Emit JSON-lines engine events on stdout
    #[arg(long, global = true)]
    pub events: bool,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available subcommands for querysync
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch template sources and reconcile continuously
    #[command(visible_alias = "w")]
    Watch(WatchArgs),

    /// Run exactly one reconciliation pass and exit
    #[command(visible_alias = "b")]
    Build(BuildArgs),
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Project root containing template sources (defaults to CWD)
    pub root: Option<PathBuf>,

    /// Debounce quiet period in milliseconds
    #[arg(long, default_value_t = 100)]
    pub quiet_ms: u64,
}

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Project root containing template sources (defaults to CWD)
    pub root: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Develop,
    Build,
}

impl Cli {
    /// Effective engine mode: the environment/flag override wins over the
    /// subcommand.
    pub fn engine_mode(&self) -> EngineMode {
        match self.mode {
            Some(ModeArg::Build) => EngineMode::Build,
            Some(ModeArg::Develop) => EngineMode::Develop,
            None => match self.command {
                Commands::Watch(_) => EngineMode::Develop,
                Commands::Build(_) => EngineMode::Build,
            },
        }
    }

    /// Project root for the selected subcommand.
    pub fn root(&self) -> Option<&PathBuf> {
        match &self.command {
            Commands::Watch(args) => args.root.as_ref(),
            Commands::Build(args) => args.root.as_ref(),
        }
    }

    /// Trigger quiet period for the selected subcommand.
    pub fn quiet_period(&self) -> Duration {
        match &self.command {
            Commands::Watch(args) => Duration::from_millis(args.quiet_ms),
            Commands::Build(_) => Duration::from_millis(100),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_defaults() {
        let cli = Cli::try_parse_from(["querysync", "watch"]).unwrap();
        assert_eq!(cli.engine_mode(), EngineMode::Develop);
        assert_eq!(cli.quiet_period(), Duration::from_millis(100));
        assert!(!cli.events);
    }

    #[test]
    fn test_build_subcommand() {
        let cli = Cli::try_parse_from(["querysync", "build", "/site"]).unwrap();
        assert_eq!(cli.engine_mode(), EngineMode::Build);
        assert_eq!(cli.root(), Some(&PathBuf::from("/site")));
    }

    #[test]
    fn test_mode_override_wins() {
        let cli = Cli::try_parse_from(["querysync", "--mode", "build", "watch"]).unwrap();
        assert_eq!(cli.engine_mode(), EngineMode::Build);
    }

    #[test]
    fn test_quiet_period_flag() {
        let cli = Cli::try_parse_from(["querysync", "watch", "--quiet-ms", "250"]).unwrap();
        assert_eq!(cli.quiet_period(), Duration::from_millis(250));
    }
}

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "tierpack")]
#[command(about = "Rule-driven packaging of full and restricted release artifacts")]
#[command(version)]
pub struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Quiet output (errors only)
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Source root (default: current directory)
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Config file (default: <root>/tierpack.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
    Elvish,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum TierArg {
    Full,
    Restricted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum BuildTier {
    Full,
    Restricted,
    Both,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show whether paths would be packaged, and why
    Check {
        /// Paths relative to the source root
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Dry-run the walk and list what is left out
    Plan {
        /// Tier to plan
        #[arg(short, long, value_enum, default_value = "full")]
        tier: TierArg,

        /// Also list every packaged file
        #[arg(long)]
        show_included: bool,
    },

    /// Assemble artifacts and write their manifests
    Build {
        /// Tier(s) to build
        #[arg(short, long, value_enum, default_value = "both")]
        tier: BuildTier,

        /// Output directory
        #[arg(short, long, default_value = "dist")]
        out: PathBuf,
    },

    /// Add the tier marker to the files listed in [tier] tagged
    Tag {
        /// Show what would change without writing
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare a full and a restricted artifact
    Compare {
        /// Full artifact: manifest file or assembled directory
        full: PathBuf,

        /// Restricted artifact: manifest file or assembled directory
        restricted: PathBuf,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// List all config values
    List,

    /// Show config file path
    Path,

    /// Initialize config file with defaults
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_build_defaults() {
        let cli = Cli::try_parse_from(["tierpack", "build"]).unwrap();
        match cli.command {
            Some(Commands::Build { tier, out }) => {
                assert_eq!(tier, BuildTier::Both);
                assert_eq!(out, PathBuf::from("dist"));
            }
            _ => panic!("expected build"),
        }
        assert_eq!(cli.root, PathBuf::from("."));
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli =
            Cli::try_parse_from(["tierpack", "plan", "--tier", "restricted", "--root", "src", "-v"])
                .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.root, PathBuf::from("src"));
        assert!(matches!(
            cli.command,
            Some(Commands::Plan {
                tier: TierArg::Restricted,
                show_included: false
            })
        ));
    }

    #[test]
    fn test_check_requires_paths() {
        assert!(Cli::try_parse_from(["tierpack", "check"]).is_err());
    }
}

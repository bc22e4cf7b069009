use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::thread;

use clap::{CommandFactory, Parser};
use clap_complete::generate;
use colored::Colorize;
use tracing::Level;

use tierpack_core::{
    diff, format_size, Assembler, Candidate, Config, DiffReport, DirectorySink, ExclusionSummary,
    Manifest, Result, RunReport, TagBatch, Taxonomy, Tier, TierpackError, TreeWalker, Warning,
    MANIFEST_SUFFIX,
};

mod args;
use args::{BuildTier, Cli, Commands, ConfigAction, Shell, TierArg};

/// Entries shown per category by `compare`.
const CATEGORY_PREVIEW: usize = 5;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let root = cli.root;
    let config_path = cli.config;

    let result = match cli.command {
        Some(Commands::Check { paths }) => handle_check(&root, config_path.as_deref(), &paths),
        Some(Commands::Plan {
            tier,
            show_included,
        }) => handle_plan(&root, config_path.as_deref(), tier.into(), show_included),
        Some(Commands::Build { tier, out }) => {
            handle_build(&root, config_path.as_deref(), tier, &out)
        }
        Some(Commands::Tag { dry_run }) => handle_tag(&root, config_path.as_deref(), dry_run),
        Some(Commands::Compare { full, restricted }) => {
            handle_compare(&root, config_path.as_deref(), &full, &restricted)
        }
        Some(Commands::Config { action }) => handle_config(action, &root, config_path.as_deref()),
        Some(Commands::Completions { shell }) => {
            handle_completions(shell);
            Ok(())
        }
        None => {
            Cli::command().print_help().ok();
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", "[ERROR]".red().bold(), e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

impl From<TierArg> for Tier {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Full => Tier::Full,
            TierArg::Restricted => Tier::Restricted,
        }
    }
}

fn init_tracing(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn handle_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let shell = match shell {
        Shell::Bash => clap_complete::Shell::Bash,
        Shell::Zsh => clap_complete::Shell::Zsh,
        Shell::Fish => clap_complete::Shell::Fish,
        Shell::PowerShell => clap_complete::Shell::PowerShell,
        Shell::Elvish => clap_complete::Shell::Elvish,
    };
    generate(shell, &mut cmd, "tierpack", &mut io::stdout());
}

fn load_config(root: &Path, config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load_from(path),
        None => Config::load(root),
    }
}

fn require_root(root: &Path) -> Result<()> {
    if root.is_dir() {
        Ok(())
    } else {
        Err(TierpackError::RootNotFound {
            path: root.to_path_buf(),
        })
    }
}

fn handle_config(action: ConfigAction, root: &Path, config_path: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::List => {
            let config = load_config(root, config_path)?;
            println!();
            for (key, value) in config.list() {
                println!("{} = {}", key.cyan(), value);
            }
            println!();
        }
        ConfigAction::Path => {
            let path = config_path
                .map(Path::to_path_buf)
                .unwrap_or_else(|| Config::path(root));
            println!("{}", path.display());
        }
        ConfigAction::Init => {
            let path = Config::init(root)?;
            println!("{} {}", "Initialized:".green(), path.display());
        }
    }

    Ok(())
}

fn handle_check(root: &Path, config_path: Option<&Path>, paths: &[String]) -> Result<()> {
    let config = load_config(root, config_path)?;
    let rules = config.rule_set()?;

    println!();
    for raw in paths {
        let candidate = if root.join(raw).is_dir() {
            Candidate::dir(raw.as_str())
        } else {
            Candidate::file(raw.as_str())
        };
        let evaluation = rules.evaluate(&candidate);
        let status = if evaluation.decision.is_included() {
            "[INCLUDED]".green()
        } else {
            "[EXCLUDED]".red()
        };
        println!(
            "  {} {} {}",
            status,
            candidate.path,
            format!("({})", evaluation.reason).dimmed()
        );
    }
    println!();

    Ok(())
}

fn handle_plan(
    root: &Path,
    config_path: Option<&Path>,
    tier: Tier,
    show_included: bool,
) -> Result<()> {
    require_root(root)?;
    let config = load_config(root, config_path)?;
    let rules = config.rule_set()?;
    let tagger = config.tagger()?;
    let walker = TreeWalker::new(root, &rules);

    let assembler = Assembler::new(&config.package.slug, &tagger);
    let plan = assembler.plan(&walker, tier);
    let summary = ExclusionSummary::from_entries(&plan.excluded);

    println!();
    println!("Package: {}", config.package.slug.cyan());
    println!("Tier: {}", tier.to_string().cyan());
    println!("Strategy: {}", rules.strategy().as_str());
    println!();

    if summary.is_empty() {
        println!("{}", "Nothing excluded".green());
    } else {
        if !summary.dirs.is_empty() {
            println!("Excluded directories:");
            for dir in &summary.dirs {
                println!("  {} {}", "[SKIP]".yellow(), dir);
            }
        }
        let root_files = summary.root_files.lines();
        if !root_files.is_empty() {
            println!("Excluded root files:");
            for line in root_files {
                println!("  {} {}", "[SKIP]".yellow(), line);
            }
        }
        if summary.nested_files > 0 {
            println!("Excluded nested files: {}", summary.nested_files);
        }
    }

    if !plan.withheld.is_empty() {
        println!();
        println!("Withheld from {} tier:", tier);
        for path in &plan.withheld {
            println!("  {} {}", "[TIER]".magenta(), path);
        }
    }

    if show_included {
        println!();
        println!("Included:");
        for entry in &plan.entries {
            println!("  {} {}", "[OK]".green(), entry.archive_path);
        }
    }

    print_report(&plan.report);
    Ok(())
}

struct TierOutcome {
    tier: Tier,
    artifact: PathBuf,
    manifest: Manifest,
    report: RunReport,
}

fn handle_build(
    root: &Path,
    config_path: Option<&Path>,
    tier: BuildTier,
    out: &Path,
) -> Result<()> {
    require_root(root)?;
    let mut config = load_config(root, config_path)?;

    fs::create_dir_all(out).map_err(|source| TierpackError::Output {
        path: out.to_path_buf(),
        source,
    })?;
    // Never package our own output.
    if let Some(name) = top_level_within(root, out)? {
        if !config.rules.structural.contains(&name) {
            config.rules.structural.push(name);
        }
    }

    let rules = config.rule_set()?;
    let tagger = config.tagger()?;
    let naming = config.artifact_name();
    let slug = config.package.slug.as_str();

    let tiers: Vec<Tier> = match tier {
        BuildTier::Full => vec![Tier::Full],
        BuildTier::Restricted => vec![Tier::Restricted],
        BuildTier::Both => vec![Tier::Full, Tier::Restricted],
    };

    let build_tier = |tier: Tier| -> Result<TierOutcome> {
        let walker = TreeWalker::new(root, &rules);
        let assembler = Assembler::new(slug, &tagger);
        let plan = assembler.plan(&walker, tier);
        let mut report = plan.report.clone();

        let name = naming.for_tier(tier);
        let mut sink = DirectorySink::create(out.join(&name))?;
        let manifest = assembler.assemble(walker.fs(), &plan, &mut sink, &mut report)?;
        manifest.save(&out.join(format!("{name}{MANIFEST_SUFFIX}")))?;

        Ok(TierOutcome {
            tier,
            artifact: out.join(&name),
            manifest,
            report,
        })
    };

    // Tiers only read the source tree, so they can run side by side.
    let build_tier = &build_tier;
    let results: Vec<Result<TierOutcome>> = thread::scope(|scope| {
        let handles: Vec<_> = tiers
            .iter()
            .map(|&tier| scope.spawn(move || build_tier(tier)))
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    let mut outcomes = Vec::new();
    for result in results {
        outcomes.push(result?);
    }

    println!();
    for outcome in &outcomes {
        println!(
            "{} {} {}",
            "[OK]".green(),
            outcome.tier.to_string().cyan(),
            outcome.artifact.display()
        );
        println!(
            "     {} files, {}",
            outcome.manifest.len(),
            format_size(outcome.manifest.total_size())
        );
        print_report(&outcome.report);
    }

    if let [full, restricted] = outcomes.as_slice() {
        let report = diff(&full.manifest, &restricted.manifest);
        print_diff_totals(&report);
        print_violations(&report);
    }

    println!();
    println!("{} {}", "Build complete:".green(), out.display());
    Ok(())
}

/// First path segment of `out` when it lies inside `root`.
fn top_level_within(root: &Path, out: &Path) -> Result<Option<String>> {
    let root = fs::canonicalize(root)?;
    let out = fs::canonicalize(out)?;
    Ok(out
        .strip_prefix(&root)
        .ok()
        .and_then(|rel| rel.components().next())
        .map(|c| c.as_os_str().to_string_lossy().into_owned()))
}

fn handle_tag(root: &Path, config_path: Option<&Path>, dry_run: bool) -> Result<()> {
    require_root(root)?;
    let config = load_config(root, config_path)?;
    let tagger = config.tagger()?;

    if config.tier.tagged.is_empty() {
        println!("{}", "No files listed in [tier] tagged".yellow());
        return Ok(());
    }

    println!();
    println!("Marker: {}", tagger.marker().cyan());
    if dry_run {
        println!("{}", "(dry run)".yellow());
    }
    println!();

    let result = TagBatch::new(root, &tagger)
        .dry_run(dry_run)
        .run(&config.tier.tagged)?;

    for path in &result.tagged {
        println!("  {} {}", "[OK]".green(), path);
    }
    for path in &result.already_tagged {
        println!("  {} {}", "[SKIP]".yellow(), path);
    }
    for warning in &result.warnings {
        println!("  {} {}", "[WARN]".yellow().bold(), warning);
    }

    let missing = result
        .warnings
        .iter()
        .filter(|w| matches!(w, Warning::MissingFile { .. }))
        .count();

    println!();
    println!("Summary:");
    println!("  Tagged: {}", result.tagged.len());
    println!("  Already tagged: {}", result.already_tagged.len());
    println!("  Missing: {}", missing);
    println!("  Malformed: {}", result.warnings.len() - missing);
    println!();

    Ok(())
}

fn handle_compare(
    root: &Path,
    config_path: Option<&Path>,
    full: &Path,
    restricted: &Path,
) -> Result<()> {
    // The taxonomy is optional configuration; fall back to the built-in one.
    let taxonomy = match load_config(root, config_path) {
        Ok(config) => config.taxonomy(),
        Err(TierpackError::ConfigNotFound { .. }) => Taxonomy::builtin(),
        Err(e) => return Err(e),
    };

    let full = Manifest::open(full)?;
    let restricted = Manifest::open(restricted)?;
    let report = diff(&full, &restricted);

    print_diff_totals(&report);

    let groups = report.categorize(&taxonomy);
    if !groups.is_empty() {
        println!();
        println!("Full-only files by category:");
        for group in &groups {
            println!();
            println!("  {} ({})", group.label.bold(), group.paths.len());
            for path in group.paths.iter().take(CATEGORY_PREVIEW) {
                println!("    {}", report.strip_slug(path));
            }
            if group.paths.len() > CATEGORY_PREVIEW {
                println!(
                    "    {}",
                    format!("... and {} more", group.paths.len() - CATEGORY_PREVIEW).dimmed()
                );
            }
        }
    }

    print_violations(&report);
    println!();
    Ok(())
}

fn print_diff_totals(report: &DiffReport) {
    println!();
    println!("Comparison:");
    println!(
        "  Full:       {} files, {}",
        report.full_count,
        format_size(report.full_size)
    );
    println!(
        "  Restricted: {} files, {}",
        report.restricted_count,
        format_size(report.restricted_size)
    );
    let delta = if report.size_delta < 0 {
        format!("-{}", format_size(report.size_delta.unsigned_abs()))
    } else {
        format_size(report.size_delta as u64)
    };
    println!(
        "  Difference: {} files, {} ({:.1}%)",
        report.full_only.len(),
        delta,
        report.reduction_percent()
    );
}

fn print_violations(report: &DiffReport) {
    if report.is_consistent() {
        return;
    }
    println!();
    println!(
        "{} restricted artifact is not a subset of the full artifact:",
        "[WARN]".yellow().bold()
    );
    for warning in report.warnings() {
        println!("  {} {}", "[WARN]".yellow().bold(), warning.path());
    }
}

fn print_report(report: &RunReport) {
    println!();
    println!("Summary:");
    println!("  Included: {}", report.included);
    println!("  Excluded: {}", report.excluded);
    if report.has_warnings() {
        println!("  Warnings: {}", report.warnings.len());
        for warning in &report.warnings {
            println!("    {} {}", "[WARN]".yellow().bold(), warning);
        }
    }
}

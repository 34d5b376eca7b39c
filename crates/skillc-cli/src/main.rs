mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "skillc",
    about = "Validate, gate and compile agent skill rule corpora",
    version,
    propagate_version = true
)]
struct Cli {
    /// Corpus root (default: auto-detect from skillc.yaml or .git/)
    #[arg(long, global = true, env = "SKILLC_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    /// Restrict the run to one skill (repeatable)
    #[arg(long = "skill", global = true, value_name = "NAME")]
    skills: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run structural and registry checks and report the gate decision
    Validate,

    /// Compile AGENTS.md and test-cases.json for every skill
    Build {
        /// Write artifacts even when the release gate fails
        #[arg(long)]
        force: bool,

        /// Compare a fresh compilation with the artifacts on disk; write nothing
        #[arg(long, conflicts_with = "force")]
        check: bool,

        /// Include the reference link check in the gate
        #[arg(long)]
        with_links: bool,
    },

    /// Probe every reference URL in the corpus
    CheckLinks,

    /// Apply the version-claims registry
    CheckVersionClaims,

    /// Apply the semantic-invariants registry
    CheckSemanticInvariants,

    /// Run every checker and print the release decision
    Gate {
        /// Leave the network link check out
        #[arg(long)]
        skip_links: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());
    let skills = &cli.skills;

    let result = match cli.command {
        Commands::Validate => cmd::validate::run(&root, skills, cli.json),
        Commands::Build {
            force,
            check,
            with_links,
        } => cmd::build::run(
            &root,
            skills,
            cmd::build::BuildMode::from_flags(force, check),
            with_links,
            cli.json,
        ),
        Commands::CheckLinks => cmd::links::run(&root, skills, cli.json),
        Commands::CheckVersionClaims => {
            cmd::claims::run(&root, skills, cmd::claims::Registry::VersionClaims, cli.json)
        }
        Commands::CheckSemanticInvariants => cmd::claims::run(
            &root,
            skills,
            cmd::claims::Registry::SemanticInvariants,
            cli.json,
        ),
        Commands::Gate { skip_links } => cmd::gate::run(&root, skills, !skip_links, cli.json),
    };

    if let Err(e) = result {
        // Print the full error chain (anyhow's alternate Display)
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

use clap::{Parser, Subcommand};
use oko::build::{self, BuildOptions};
use oko::{config, output};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oko")]
#[command(about = "Incremental static site compiler for the oko markup language")]
#[command(long_about = "\
Incremental static site compiler for the oko markup language

Every .ø (or .txt) file below the project root becomes one HTML page at the
same relative path. Plates decide how each token is turned into HTML;
snippets are reusable pieces of markup. Only documents whose source, plate,
snippet or function changed since the last build are rendered again.

Project structure:

  site/
  ├── _data/
  │   ├── oko.toml                 # Project config (domain is required)
  │   ├── plates/post.json         # Plate: fragments, injections, assets
  │   ├── snippets/nav.ø           # Snippet, used with `> nav`
  │   └── functions/toc.lua        # Custom function, called with `ø toc`
  ├── index.ø                      # → public/index.html
  ├── blog/first.ø                 # → public/blog/first.html
  ├── legacy.html                  # copied as-is
  └── _drafts/                     # names starting with _ or . are skipped

Run 'oko gen-config' to print a documented oko.toml.")]
#[command(version)]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render every changed document
    Build {
        /// Ignore timestamps and render everything
        #[arg(long)]
        all: bool,
        /// Render documents marked `draft: true`
        #[arg(long)]
        drafts: bool,
        /// Worker threads (default: all cores)
        #[arg(short, long)]
        jobs: Option<usize>,
    },
    /// Lex the project and report its documents without writing anything
    Check,
    /// Create the _data/ skeleton and a stock oko.toml
    Init,
    /// Print a stock oko.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Build { all, drafts, jobs } => {
            init_thread_pool(jobs);
            let config = config::load_config(&cli.root)?;
            let output_dir = cli.root.join(&config.output);
            println!("==> Building {} → {}", cli.root.display(), output_dir.display());
            let report = build::build_with(
                oko::context::BuildContext::new(&cli.root, config),
                BuildOptions {
                    render_all: all,
                    drafts,
                },
            )?;
            output::print_build_output(&report, &output_dir);
        }
        Command::Check => {
            println!("==> Checking {}", cli.root.display());
            let ctx = build::check(&cli.root)?;
            output::print_check_output(&ctx);
            println!("==> Project is valid");
        }
        Command::Init => {
            let path = config::init_project(&cli.root)?;
            println!("==> Created {}", path.display());
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Verbosity: 0 = WARN, 1 = INFO, 2 = DEBUG, 3+ = TRACE. `RUST_LOG` still applies.
fn init_tracing(verbose: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(jobs: Option<usize>) {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let threads = jobs.map_or(cores, |j| j.clamp(1, cores));
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_flags_parse() {
        let cli = Cli::parse_from(["oko", "build", "--all", "--drafts", "-j", "2"]);
        assert_eq!(cli.verbose, 0);
        assert_eq!(cli.root, PathBuf::from("."));
        match cli.command {
            Command::Build { all, drafts, jobs } => {
                assert!(all);
                assert!(drafts);
                assert_eq!(jobs, Some(2));
            }
            _ => panic!("expected build"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::parse_from(["oko", "check", "--root", "site", "-vv"]);
        assert_eq!(cli.root, PathBuf::from("site"));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Check));
    }
}

use clap::Parser;
use gitsite::{Config, Overrides, build_site};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::Level;

#[derive(Debug, Parser)]
#[clap(version, about = "Generate a static website for a git repository")]
struct Args {
    /// Output directory, also holds the stored configuration.
    #[clap()]
    target: PathBuf,
    /// Project name shown in page titles, defaults to the repository name.
    #[clap(short, long, env = "GITSITE_PROJECT")]
    project: Option<String>,
    /// Repository to publish.
    #[clap(short, long, env = "GITSITE_REPOSITORY")]
    repository: Option<PathBuf>,
    /// Public clone URL shown on the index page.
    #[clap(short, long, env = "GITSITE_LINK")]
    link: Option<String>,
    /// Comma separated branches to publish, all branches if not set.
    #[clap(short, long, env = "GITSITE_BRANCHES", value_delimiter = ',')]
    branches: Option<Vec<String>>,
    /// Only print warnings and errors.
    #[clap(short, long)]
    quiet: bool,
    /// Discard previous output and rebuild everything.
    #[clap(short, long)]
    force: bool,
}

fn run(args: Args) -> anyhow::Result<()> {
    let overrides = Overrides {
        project: args.project,
        repository: args.repository,
        link: args.link,
        branches: args.branches,
        force: args.force,
    };
    let config = Config::load(&args.target, overrides)?;
    config.validate()?;
    build_site(&config)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(error) => {
            let _ = error.print();
            return if error.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    let level = if args.quiet { Level::WARN } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .with_max_level(level)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

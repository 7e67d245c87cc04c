use clap::{Parser, Subcommand};
use piccolo::build::{self, BuildOptions};
use piccolo::resolver::AttributeResolver;
use piccolo::{config, output};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(clap::Args, Clone)]
struct BuildArgs {
    /// Regenerate every output, ignoring modification times
    #[arg(long)]
    force: bool,
}

#[derive(Parser)]
#[command(name = "piccolo")]
#[command(about = "Incremental static site generator driven by marker files")]
#[command(long_about = "\
Incremental static site generator driven by marker files

Empty marker files in a directory decide how it is published. Markers cascade
to subdirectories until overridden.

  site/
  ├── .root                 # Publishing root (exactly one)
  ├── .verbatim             # Copy files unchanged
  ├── .maintarget           # Site index is written here
  ├── site.toml             # Optional config (run 'piccolo gen-config')
  ├── posts/
  │   ├── .include          # *.html files are entries, rendered via tpl/entry.html
  │   └── hello.html
  ├── drafts/
  │   └── .ignore           # Never published, whatever lies below
  ├── archives/
  │   └── .archivetarget    # Archive index is written here
  ├── feed/
  │   └── .feedtarget       # Atom feed is written here
  ├── inc/                  # header.html, titlebar.html, footer.html
  ├── tpl/                  # entry.html, archive.html, index.html, index.atom
  └── dst/                  # Output

Outputs are only rewritten when one of their inputs is newer.
Set RUST_LOG=piccolo=debug for a trace of every decision.")]
#[command(version)]
struct Cli {
    /// Directory at or below the publishing root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Publish the site into dst/
    Build(BuildArgs),
    /// Show how every directory resolves, without building
    Check {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print a stock site.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Build(args) => {
            let mut resolver = AttributeResolver::discover(&cli.root)?;
            let root = resolver.root().to_path_buf();
            println!("==> Building {}", root.display());

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_build_event(&event, &root) {
                        println!("{}", line);
                    }
                }
            });
            let result = build::build(&mut resolver, BuildOptions { force: args.force }, Some(tx));
            printer.join().ok();
            output::print_build_summary(&result?);
        }
        Command::Check { json } => {
            let mut resolver = AttributeResolver::discover(&cli.root)?;
            let survey = build::survey(&mut resolver)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&survey)?);
            } else {
                output::print_survey(&survey);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Log to stderr so stdout stays clean for reports. Defaults to warnings only.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

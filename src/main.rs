use clap::{Parser, Subcommand};
use inlay::{config, BuildMode, EmbedConfig, Embedder, Freshness, Outcome};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "inlay")]
#[command(about = "Embed assets into generated Rust source")]
#[command(long_about = "\
Embed assets into generated Rust source

Paths listed on the command line (or in inlay.toml) are minified,
gzipped, and written as a generated module of byte-string literals that
a release build compiles in. Regeneration is skipped when the generated
unit is newer than every input and the path list is unchanged.

Generated layout (module mode, the default):

  <root>/
  ├── inlay.toml          # Optional config (run 'inlay gen-config')
  ├── embed.rs            # Importer, created once: declares the module
  └── assets/
      ├── assets.rs       # Generated unit, behind the `bundle` feature
      └── .inlay-snapshot.json

Run 'inlay gen-config' to print a documented inlay.toml.")]
#[command(version)]
struct Cli {
    /// Generation root; registered paths are resolved against it
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Name of the generated module
    #[arg(long, global = true)]
    module: Option<String>,

    /// Generate one self-contained file instead of a module
    #[arg(long, global = true)]
    single_file: Option<String>,

    /// Config file location
    #[arg(long, default_value = "inlay.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Embed the given paths (or the paths from inlay.toml)
    Build {
        /// Files and directories to embed, relative to the root
        paths: Vec<String>,
    },
    /// Report whether the generated unit is current, without writing
    Check {
        /// Files and directories to check, relative to the root
        paths: Vec<String>,
    },
    /// List the contents of a folder on the real filesystem
    List {
        /// Folder to list; relative paths resolve against the working directory
        folder: String,
    },
    /// Print a stock inlay.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if matches!(cli.command, Command::GenConfig) {
        print!("{}", config::stock_toml());
        return Ok(());
    }

    let file = config::load_file_config(&cli.config)?.unwrap_or_default();
    let embed_config = merge(&cli, &file);

    match cli.command {
        Command::Build { paths } => {
            let mut embedder = Embedder::new(embed_config);
            for path in resolve_paths(paths, &file) {
                embedder.register_file(path)?;
            }
            match embedder.done()? {
                Outcome::Generated(records) => {
                    println!(
                        "generated {} ({} records)",
                        embedder.config().unit_path().display(),
                        records
                    );
                }
                Outcome::Skipped => println!("up to date"),
            }
        }
        Command::Check { paths } => {
            let mut embedder = Embedder::new(embed_config);
            for path in resolve_paths(paths, &file) {
                embedder.register_file(path)?;
            }
            match embedder.check()? {
                Freshness::Skip => println!("up to date"),
                _ => {
                    println!("stale: {}", embedder.config().unit_path().display());
                    std::process::exit(1);
                }
            }
        }
        Command::List { folder } => {
            let embedder = Embedder::new(embed_config);
            for entry in embedder.list(&folder) {
                println!("{entry}");
            }
        }
        Command::GenConfig => unreachable!(),
    }

    Ok(())
}

/// CLI flags win over the config file, which wins over defaults.
fn merge(cli: &Cli, file: &config::FileConfig) -> EmbedConfig {
    let defaults = EmbedConfig::default();
    let mode = match cli.single_file.as_ref().or(file.single_file.as_ref()) {
        Some(name) => BuildMode::SingleFile(name.clone()),
        None => BuildMode::Module,
    };
    EmbedConfig {
        root: cli
            .root
            .clone()
            .or_else(|| file.root.clone())
            .unwrap_or(defaults.root),
        module: cli
            .module
            .clone()
            .or_else(|| file.module.clone())
            .unwrap_or(defaults.module),
        importer: file.importer.clone().unwrap_or(defaults.importer),
        mode,
    }
}

fn resolve_paths(cli_paths: Vec<String>, file: &config::FileConfig) -> Vec<String> {
    if cli_paths.is_empty() {
        file.paths.clone()
    } else {
        cli_paths
    }
}

use clap::{Parser, Subcommand};
use quarry::cli::{self, CliError, NormalizeOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "quarry")]
#[command(about = "Quarry - lazy SQL query building and CSV normalization for cloud warehouses")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rewrite a raw CSV into a warehouse-loadable one
    Normalize {
        /// Single-character type codes, one per column (e.g. "icc")
        #[arg(short, long)]
        types: String,

        /// Source CSV file (reads from stdin if not provided)
        input: Option<PathBuf>,

        /// Destination file
        output: PathBuf,

        /// Input delimiter (defaults to a comma)
        #[arg(short, long)]
        delimiter: Option<char>,
    },

    /// Show the column type-code reference
    Codes,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Normalize {
            types,
            input,
            output,
            delimiter,
        } => run_normalize(types, input, output, delimiter),
        Commands::Codes => {
            print!("{}", cli::type_code_reference());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn run_normalize(
    types: String,
    input: Option<PathBuf>,
    output: PathBuf,
    delimiter: Option<char>,
) -> Result<(), CliError> {
    if input.is_none() && atty::is(atty::Stream::Stdin) {
        return Err(CliError::NoInput);
    }

    let options = NormalizeOptions {
        input,
        output,
        types,
        delimiter,
    };

    let summary = cli::execute_normalize(&options)?;
    println!("{} rows, {} columns", summary.rows, summary.columns);
    Ok(())
}

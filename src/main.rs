use btxz::archive::{create_archive, extract_archive, inspect_header, list_archive_contents};
use btxz::header::Header;
use btxz::{ArchiveError, CompressionLevel};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "btxz", version, about = "Create and extract encrypted, compressed .btxz archives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pack files and folders into a new archive (always the newest format)
    Create {
        #[arg(short, long)]
        output: PathBuf,
        /// Password for encryption (required)
        #[arg(short, long, env = "BTXZ_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Compression level: fast, default, best
        #[arg(short, long, default_value = "default")]
        level: CompressionLevel,
        #[arg(required = true, num_args = 1..)]
        input: Vec<PathBuf>,
    },
    /// Extract an archive of any supported version
    Extract {
        input: PathBuf,
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
        /// Password for decryption (only plaintext v1 archives need none)
        #[arg(short, long, env = "BTXZ_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    /// List archive contents
    List {
        input: PathBuf,
        #[arg(short, long, env = "BTXZ_PASSWORD", hide_env_values = true)]
        password: Option<String>,
        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show header fields; needs no password
    Info {
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Cli::parse().command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if matches!(e.downcast_ref::<ArchiveError>(), Some(ArchiveError::DecryptionFailed)) {
                eprintln!("error: decryption failed, please check that the password is correct");
            } else {
                eprintln!("error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {

        // ── Create ───────────────────────────────────────────────────────────
        Commands::Create { output, password, level, input } => {
            let password = password.unwrap_or_default();
            create_archive(&output, &input, &password, level)?;
            println!("Created: {}", output.display());
            println!("  Encrypted    true");
            println!("  Compression  {level}");
        }

        // ── Extract ──────────────────────────────────────────────────────────
        Commands::Extract { input, output_dir, password } => {
            let password = password.unwrap_or_default();
            let report = match extract_archive(&input, &output_dir, &password) {
                Ok(report) => report,
                Err(failure) => {
                    print_skipped(&failure.skipped);
                    return Err(failure.source.into());
                }
            };
            for name in &report.extracted {
                println!("  extracted  {name}");
            }
            print_skipped(&report.skipped);
            println!("Extracted {} entries to: {}", report.extracted.len(), output_dir.display());
        }

        // ── List ─────────────────────────────────────────────────────────────
        Commands::List { input, password, json } => {
            let entries = list_archive_contents(&input, &password.unwrap_or_default())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }
            println!("Archive: {}", input.display());
            println!("{:<10} {:>12}  Name", "Mode", "Size");
            for entry in &entries {
                println!("{:<10} {:>12}  {}", entry.mode_string(), entry.size, entry.name);
            }
            println!("{} entries", entries.len());
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input } => {
            let header = inspect_header(&input)?;
            println!("── .btxz Archive ────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Format version {}", header.version());
            println!("  Header size    {} B", header.encoded_len());
            match &header {
                Header::V1(h) => {
                    println!("  Encrypted      {}", h.is_encrypted());
                    println!("  Names flag     {}", h.names_encrypted);
                }
                Header::V2(h) => {
                    println!("  Encrypted      true");
                    println!("  Compression    {}", h.level);
                }
            }
            if header.is_encrypted() {
                let kdf = header.kdf();
                println!("  Argon2 time    {}", kdf.time_cost);
                println!("  Argon2 memory  {} KiB", kdf.memory_kib);
                println!("  Argon2 lanes   {}", kdf.parallelism);
                println!("  Salt           {}", hex::encode(header.salt()));
                println!("  Nonce          {}", hex::encode(header.nonce()));
            }
        }
    }

    Ok(())
}

fn print_skipped(skipped: &[String]) {
    if skipped.is_empty() {
        return;
    }
    eprintln!("warning: {} unsafe entries were not extracted:", skipped.len());
    for name in skipped {
        eprintln!("  - {name}");
    }
}

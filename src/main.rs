use std::fs;
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use namex::source::{read_lines, write_names};
use namex::subtract::{common_names, subtract_known};
use namex::{CasePolicy, FileSource, Overrides, Pipeline, Settings, WriterSink};

#[derive(Parser)]
#[command(name = "namex", about = "Extract person names from page text")]
struct Cli {
    /// Configuration file (TOML or JSON) layered over the bundled defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a sorted, deduplicated list of names from text files
    Extract {
        /// Text files or directories of *.txt files ("-" for stdin); pages split on form feeds
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// Candidate generator
        #[arg(short, long, value_parser = ["pattern", "model"])]
        generator: Option<String>,
        /// Validator profile
        #[arg(short, long, value_parser = ["loose", "strict"])]
        profile: Option<String>,
        /// Treat names differing only in case as duplicates
        #[arg(short = 'i', long)]
        case_insensitive: bool,
        /// Recognizer command for the model generator
        #[arg(long)]
        recognizer: Option<String>,
        /// Argument passed to the recognizer command (repeatable)
        #[arg(long = "recognizer-arg", requires = "recognizer", allow_hyphen_values = true)]
        recognizer_args: Vec<String>,
        /// Per-block recognizer timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
        /// Abort if any input cannot be read
        #[arg(long)]
        strict_inputs: bool,
        /// Drop names listed (one per line) in this file
        #[arg(short = 'x', long)]
        exclude: Option<PathBuf>,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = Format::Lines)]
        format: Format,
    },
    /// Remove from TARGET every line that appears in KNOWN
    Subtract {
        known: PathBuf,
        target: PathBuf,
        /// Output file (default: overwrite TARGET)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short = 'i', long)]
        case_insensitive: bool,
    },
    /// Print the lines of TARGET that also appear in KNOWN
    Common {
        known: PathBuf,
        target: PathBuf,
        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short = 'i', long)]
        case_insensitive: bool,
    },
    /// Print the resolved configuration and check it
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    /// One name per line
    Lines,
    /// {"names": [...], "stats": {...}}
    Json,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Extract {
            inputs,
            generator,
            profile,
            case_insensitive,
            recognizer,
            recognizer_args,
            timeout_ms,
            strict_inputs,
            exclude,
            output,
            format,
        } => {
            let overrides = Overrides {
                generator,
                validator_profile: profile,
                case_insensitive,
                recognizer_command: recognizer,
                recognizer_args,
                model_timeout_ms: timeout_ms,
                fail_on_unreadable: strict_inputs,
            };
            let settings = Settings::load(cli.config.as_deref(), &overrides)?;
            let config = settings.validate()?;
            info!(
                generator = %config.generator,
                profile = %config.profile,
                case_policy = ?config.case_policy,
                "Starting extraction"
            );

            let pipeline = Pipeline::new(&config)?.with_progress(io::stderr().is_terminal());
            let mut source = FileSource::new(inputs);
            let mut out = pipeline.run_source(&mut source)?;

            if let Some(path) = exclude {
                let known = read_lines(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let (kept, report) = subtract_known(&known, out.names, config.case_policy);
                info!("Excluded {} known names", report.removed);
                out.names = kept;
            }

            let writer = open_output(output.as_deref())?;
            match format {
                Format::Lines => {
                    let mut sink = WriterSink::new(writer);
                    write_names(&mut sink, &out.names)?;
                    sink.into_inner()?;
                }
                Format::Json => {
                    let mut writer = writer;
                    serde_json::to_writer_pretty(&mut writer, &out)?;
                    writeln!(writer)?;
                    writer.flush()?;
                }
            }

            let s = out.stats;
            eprintln!(
                "Found {} unique names ({} candidates, {} accepted) in {} blocks ({} failed, {} unreadable).",
                out.names.len(),
                s.candidates,
                s.accepted,
                s.blocks,
                s.blocks_failed,
                s.blocks_unavailable,
            );
            Ok(())
        }
        Commands::Subtract {
            known,
            target,
            output,
            case_insensitive,
        } => {
            let known_names = read_lines(&known)
                .with_context(|| format!("failed to read {}", known.display()))?;
            let names = read_lines(&target)
                .with_context(|| format!("failed to read {}", target.display()))?;
            let policy = CasePolicy::from_case_sensitive(!case_insensitive);
            let (kept, report) = subtract_known(&known_names, names, policy);

            let dest = output.unwrap_or_else(|| target.clone());
            let mut sink = WriterSink::new(io::BufWriter::new(
                fs::File::create(&dest)
                    .with_context(|| format!("failed to create {}", dest.display()))?,
            ));
            write_names(&mut sink, &kept)?;
            sink.into_inner()?;

            println!("Original lines: {}", report.original);
            println!("Kept lines:     {}", report.kept);
            println!("Lines removed:  {}", report.removed);
            if dest == target {
                println!("{} updated in place", target.display());
            } else {
                println!("Output written to {}", dest.display());
            }
            Ok(())
        }
        Commands::Common {
            known,
            target,
            output,
            case_insensitive,
        } => {
            let known_names = read_lines(&known)
                .with_context(|| format!("failed to read {}", known.display()))?;
            let names = read_lines(&target)
                .with_context(|| format!("failed to read {}", target.display()))?;
            let policy = CasePolicy::from_case_sensitive(!case_insensitive);
            let (shared, report) = common_names(&known_names, names, policy);

            let mut sink = WriterSink::new(open_output(output.as_deref())?);
            write_names(&mut sink, &shared)?;
            sink.into_inner()?;
            eprintln!("{} of {} lines also in {}", report.kept, report.original, known.display());
            Ok(())
        }
        Commands::Config => {
            let settings = Settings::load(cli.config.as_deref(), &Overrides::default())?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
            settings.validate()?;
            println!("Configuration OK.");
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn open_output(path: Option<&Path>) -> anyhow::Result<Box<dyn Write>> {
    Ok(match path {
        Some(p) => Box::new(io::BufWriter::new(
            fs::File::create(p).with_context(|| format!("failed to create {}", p.display()))?,
        )),
        None => Box::new(io::stdout().lock()),
    })
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

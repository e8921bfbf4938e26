use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hmi_core::FmBank;

use hmpconv::inspect::inspect;
use hmpconv::logging::{self, Verbosity};
use hmpconv::{
    convert_hmp_to_midi, convert_midi_to_hmp, ContainerCache, ConvertOptions, Outcome,
    TerminalConfirm,
};

#[derive(Parser, Debug)]
#[command(name = "hmpconv", version)]
#[command(about = "Convert between MIDI files and Descent .HMP/.HMQ files", long_about = None)]
#[command(
    after_help = "HMP and HMQ paths may point inside a .HOG file, e.g. descent2.hog/game01.hmp"
)]
struct Cli {
    /// Only print warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Print debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert a MIDI file into an HMP file
    ToHmp {
        /// Overwrite the destination without asking
        #[arg(short = 'y', long)]
        overwrite: bool,

        /// Also write an .HMQ for FM with patches remapped for a bank pair:
        /// 1 MELODIC/DRUM (D1 & D2), 2 INTMELO/INTDRUM (D1),
        /// 3 HAMMELO/HAMDRUM (D1), 4 RICKMELO/RICKDRUM (D1),
        /// 5 D2MELOD/D2DRUMS (D2).
        /// The .SNG still needs to name the right .BNK files.
        #[arg(
            short = 'f',
            long = "fm-bank",
            value_name = "1-5",
            value_parser = clap::value_parser!(u8).range(1..=5)
        )]
        fm_bank: Option<u8>,

        /// Standard MIDI 1.0 source file
        midi: PathBuf,

        /// Destination .HMP
        hmp: PathBuf,
    },

    /// Convert an HMP or HMQ file into a MIDI file
    ToMidi {
        /// Overwrite the destination without asking
        #[arg(short = 'y', long)]
        overwrite: bool,

        /// Give tracks without a volume controller volume 0, like the
        /// original HMI DOS driver
        #[arg(short = 'd', long)]
        faithful: bool,

        /// Source .HMP or .HMQ
        hmp: PathBuf,

        /// Destination MIDI file
        midi: PathBuf,
    },

    /// Print a summary of a MIDI or HMP file
    Inspect {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,

        file: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let verbosity = Verbosity::from_flags(cli.quiet, cli.verbose);
    logging::init(verbosity);

    match run(cli.command, verbosity) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(command: Command, verbosity: Verbosity) -> Result<()> {
    let mut cache = ContainerCache::new();
    let mut prompt = TerminalConfirm::stdio();

    let result = match command {
        Command::ToHmp {
            overwrite,
            fm_bank,
            midi,
            hmp,
        } => {
            let options = ConvertOptions {
                overwrite,
                fm_bank: fm_bank.and_then(FmBank::from_number),
                ..Default::default()
            };
            convert_midi_to_hmp(&midi, &hmp, &options, &mut cache, &mut prompt)
                .with_context(|| format!("converting {} to HMP", midi.display()))
                .map(|outcome| report(outcome, "HMP file(s)", verbosity))
        }
        Command::ToMidi {
            overwrite,
            faithful,
            hmp,
            midi,
        } => {
            let options = ConvertOptions {
                overwrite,
                faithful,
                ..Default::default()
            };
            convert_hmp_to_midi(&hmp, &midi, &options, &mut cache, &mut prompt)
                .with_context(|| format!("converting {} to MIDI", hmp.display()))
                .map(|outcome| report(outcome, "MIDI file", verbosity))
        }
        Command::Inspect { json, file } => {
            let location = cache.resolve(&file)?;
            let summary = inspect(&location)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print!("{summary}");
            }
            Ok(())
        }
    };

    // archives whose write failed get one more attempt
    let closed = cache.close().context("writing HOG archives");
    result.and(closed)
}

fn report(outcome: Outcome, what: &str, verbosity: Verbosity) {
    match outcome {
        Outcome::Converted { written } => {
            for path in &written {
                tracing::debug!(path = %path.display(), "written");
            }
            if verbosity != Verbosity::Quiet {
                println!("Successfully converted and saved {what}");
            }
        }
        Outcome::Skipped { written } => {
            for path in &written {
                tracing::debug!(path = %path.display(), "written");
            }
            tracing::info!("destination kept, conversion stopped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_to_hmp() {
        let cli = Cli::try_parse_from(["hmpconv", "to-hmp", "-y", "-f", "5", "a.mid", "b.hmp"])
            .unwrap();
        match cli.command {
            Command::ToHmp {
                overwrite,
                fm_bank,
                ..
            } => {
                assert!(overwrite);
                assert_eq!(fm_bank.and_then(FmBank::from_number), Some(FmBank::D2Melod));
            }
            other => panic!("wrong command {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_bank_and_remap_on_to_midi() {
        assert!(Cli::try_parse_from(["hmpconv", "to-hmp", "-f", "6", "a.mid", "b.hmp"]).is_err());
        assert!(Cli::try_parse_from(["hmpconv", "to-midi", "-f", "1", "a.hmp", "b.mid"]).is_err());
        assert!(Cli::try_parse_from(["hmpconv", "to-midi", "a.hmp"]).is_err());
    }

    #[test]
    fn test_global_flags() {
        let cli =
            Cli::try_parse_from(["hmpconv", "to-midi", "-d", "a.hmp", "b.mid", "-q"]).unwrap();
        assert!(cli.quiet);
        assert!(matches!(cli.command, Command::ToMidi { faithful: true, .. }));
        assert!(Cli::try_parse_from(["hmpconv", "-q", "-v", "inspect", "x"]).is_err());
    }
}

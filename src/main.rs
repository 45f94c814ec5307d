#[macro_use]
extern crate log;

mod byte_size;
mod progress_reporter;
mod shared_types;
mod splitter;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::{ContextKind, ErrorKind};
use clap::Parser;
use indicatif::MultiProgress;
use indicatif_log_bridge::LogWrapper;
use simplelog::LevelFilter;
use thiserror::Error;

use byte_size::ByteSize;
use progress_reporter::ProgressReporter;
use splitter::{SplitAborted, SplitOptions};

/// Split FILE into parts named FILE<N>, last part first, shrinking FILE as each part is written.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Size of each part, e.g. 512K, 10MiB, 1GB
    #[arg(short = 'b', long = "part-size", value_name = "SIZE")]
    part_size: Option<ByteSize>,

    /// Overwrite part files that already exist
    #[arg(short = 'o', long = "overwrite-existing")]
    overwrite: bool,

    /// Log every step of the split
    #[arg(short, long)]
    verbose: bool,

    /// File to split
    #[arg(value_name = "FILE")]
    files: Vec<PathBuf>,
}

#[derive(Error, Debug)]
enum CliError {
    #[error("Missing file path argument")]
    MissingArgument,
    #[error("Too many arguments: expected one file path, got {0}")]
    TooManyArguments(usize),
    #[error("Invalid option '{0}'. Use -h for usage information.")]
    UnknownOption(String),
    #[error("{0}")]
    InvalidOption(String),
    #[error(transparent)]
    Split(#[from] SplitAborted),
}

impl CliError {
    /// 1 when the split itself failed, 2 for usage errors.
    fn exit_status(&self) -> u8 {
        match self {
            CliError::Split(_) => 1,
            _ => 2,
        }
    }
}

impl From<clap::Error> for CliError {
    fn from(e: clap::Error) -> Self {
        match e.kind() {
            ErrorKind::UnknownArgument => CliError::UnknownOption(
                e.get(ContextKind::InvalidArg)
                    .map(ToString::to_string)
                    .unwrap_or_default(),
            ),
            _ => CliError::InvalidOption(e.to_string().trim_end().to_owned()),
        }
    }
}

impl CliArgs {
    fn file(&self) -> Result<&PathBuf, CliError> {
        match self.files.as_slice() {
            [] => Err(CliError::MissingArgument),
            [file] => Ok(file),
            files => Err(CliError::TooManyArguments(files.len())),
        }
    }

    fn split_options(&self) -> SplitOptions {
        SplitOptions {
            part_size: self.part_size.unwrap_or(ByteSize::new(0)),
            overwrite: self.overwrite,
        }
    }
}

fn init_logging(level: LevelFilter, multi: MultiProgress) -> Result<(), log::SetLoggerError> {
    let logger = simplelog::TermLogger::new(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    LogWrapper::new(multi, logger).try_init()?;
    log::set_max_level(level);
    Ok(())
}

fn run(args: &CliArgs, multi: &MultiProgress) -> Result<(), CliError> {
    let path = args.file()?;
    let options = args.split_options();

    let progress = ProgressReporter::new(0, multi);
    let parts = match splitter::split(path, &options, &progress) {
        Ok(parts) => parts,
        Err(aborted) => {
            progress.clear();
            if !aborted.parts_written.is_empty() {
                warn!(
                    "{} parts were written and removed from '{}' before the failure",
                    aborted.parts_written.len(),
                    path.display()
                );
            }
            return Err(aborted.into());
        }
    };
    progress.finish(parts.len());

    info!(
        "split '{}' into {} parts ({} bytes)",
        path.display(),
        parts.len(),
        progress.position()
    );
    Ok(())
}

fn main() -> ExitCode {
    let parsed = CliArgs::try_parse();
    if let Err(e) = &parsed {
        if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) {
            return match e.print() {
                Ok(()) => ExitCode::SUCCESS,
                Err(_) => ExitCode::FAILURE,
            };
        }
    }

    let level = match &parsed {
        Ok(args) if args.verbose => LevelFilter::Debug,
        _ => LevelFilter::Info,
    };
    let multi = MultiProgress::new();
    if let Err(e) = init_logging(level, multi.clone()) {
        eprintln!("FATAL: cannot initialise logging: {e}");
        return ExitCode::FAILURE;
    }

    let result = parsed
        .map_err(CliError::from)
        .and_then(|args| run(&args, &multi));
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::from(e.exit_status())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use indicatif::ProgressDrawTarget;
    use tempfile::TempDir;

    use super::*;

    fn hidden_multi() -> MultiProgress {
        MultiProgress::with_draw_target(ProgressDrawTarget::hidden())
    }

    fn parse(args: &[&str]) -> Result<CliArgs, CliError> {
        Ok(CliArgs::try_parse_from(
            std::iter::once("splitback").chain(args.iter().copied()),
        )?)
    }

    #[test]
    fn parses_full_command_line() {
        let args = parse(&["-b", "10MiB", "-o", "data.bin"]).unwrap();
        assert_eq!(args.file().unwrap(), &PathBuf::from("data.bin"));
        let options = args.split_options();
        assert_eq!(options.part_size.bytes(), 10 * 1024 * 1024);
        assert!(options.overwrite);
        assert!(!args.verbose);
    }

    #[test]
    fn long_flags_work() {
        let args = parse(&["--part-size", "1KB", "--overwrite-existing", "-v", "f"]).unwrap();
        assert_eq!(args.split_options().part_size.bytes(), 1000);
        assert!(args.overwrite);
        assert!(args.verbose);
    }

    #[test]
    fn missing_part_size_defaults_to_zero() {
        let args = parse(&["data.bin"]).unwrap();
        assert_eq!(args.split_options().part_size.bytes(), 0);
        assert!(!args.split_options().overwrite);
    }

    #[test]
    fn file_count_is_checked() {
        let args = parse(&["-b", "1K"]).unwrap();
        assert!(matches!(args.file(), Err(CliError::MissingArgument)));

        let args = parse(&["-b", "1K", "a", "b"]).unwrap();
        assert!(matches!(args.file(), Err(CliError::TooManyArguments(2))));
    }

    #[test]
    fn unknown_option_is_reported() {
        let err = parse(&["-x", "data.bin"]).unwrap_err();
        assert!(matches!(err, CliError::UnknownOption(ref opt) if opt == "-x"));
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn bad_part_size_is_an_invalid_option() {
        let err = parse(&["-b", "10XB", "data.bin"]).unwrap_err();
        match err {
            CliError::InvalidOption(msg) => {
                assert!(msg.contains("10XB"), "{msg}");
                assert!(msg.contains("Invalid unit"), "{msg}");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(matches!(
            parse(&["-b", "MB", "data.bin"]),
            Err(CliError::InvalidOption(_))
        ));
    }

    #[test]
    fn run_splits_the_named_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data.bin");
        fs::write(&path, [7u8; 25]).unwrap();
        let args = parse(&["-b", "10B", path.to_str().unwrap()]).unwrap();

        run(&args, &hidden_multi()).unwrap();

        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
        assert_eq!(fs::read(dir.path().join("data.bin1")).unwrap().len(), 5);
    }

    #[test]
    fn run_on_empty_file_succeeds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty");
        fs::write(&path, b"").unwrap();
        let args = parse(&["-b", "1K", path.to_str().unwrap()]).unwrap();

        assert!(run(&args, &hidden_multi()).is_ok());
        assert!(!dir.path().join("empty1").exists());
    }

    #[test]
    fn run_on_missing_file_is_a_split_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope");
        let args = parse(&["-b", "1K", path.to_str().unwrap()]).unwrap();

        let err = run(&args, &hidden_multi()).unwrap_err();

        assert!(matches!(err, CliError::Split(_)));
        assert_eq!(err.exit_status(), 1);
        assert!(err.to_string().contains("cannot open file"), "{err}");
    }

    #[test]
    fn run_reports_parts_written_before_a_failure() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, [1u8; 25]).unwrap();
        fs::write(dir.path().join("data2"), b"existing").unwrap();
        let args = parse(&["-b", "10B", path.to_str().unwrap()]).unwrap();

        let err = run(&args, &hidden_multi()).unwrap_err();

        match &err {
            CliError::Split(aborted) => {
                assert_eq!(aborted.parts_written.len(), 1);
                assert_eq!(aborted.parts_written[0].index, 3);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.exit_status(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), 15);
    }

    #[test]
    fn run_rejects_missing_part_size_before_touching_the_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("data");
        fs::write(&path, [1u8; 25]).unwrap();
        let args = parse(&[path.to_str().unwrap()]).unwrap();

        let err = run(&args, &hidden_multi()).unwrap_err();

        assert_eq!(err.exit_status(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), 25);
    }

    #[test]
    fn run_without_a_file_is_a_usage_error() {
        let args = parse(&["-b", "1K"]).unwrap();
        let err = run(&args, &hidden_multi()).unwrap_err();
        assert!(matches!(err, CliError::MissingArgument));
        assert_eq!(err.exit_status(), 2);
    }

    #[test]
    fn help_is_not_an_error() {
        let err = CliArgs::try_parse_from(["splitback", "-h"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }
}

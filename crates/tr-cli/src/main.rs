use std::ffi::OsString;
use std::fs;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use anyhow::Error;
use jumprope::JumpRope;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracked_ranges::*;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(ValueEnum, Debug, Copy, Clone, Eq, PartialEq)]
enum DiffGranularity {
    Chars,
    Words,
    Lines,
}

impl From<DiffGranularity> for Granularity {
    fn from(g: DiffGranularity) -> Self {
        match g {
            DiffGranularity::Chars => Granularity::Chars,
            DiffGranularity::Words => Granularity::Words,
            DiffGranularity::Lines => Granularity::Lines,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the ops which turn one file into another, as JSON
    Diff {
        /// The original file
        before: PathBuf,

        /// The new version of the file
        after: PathBuf,

        /// How finely to diff the files
        #[arg(short, long, value_enum, default_value_t = DiffGranularity::Chars)]
        granularity: DiffGranularity,

        /// Use the patience diff algorithm instead of myers
        #[arg(long)]
        patience: bool,

        /// Give up looking for a minimal diff after this many milliseconds. 0 for no limit.
        #[arg(long, default_value_t = 100)]
        timeout_ms: u64,

        /// Output contents to the named file instead of stdout
        #[arg(short, long)]
        output: Option<OsString>,

        /// Pretty print the JSON
        #[arg(short, long)]
        pretty: bool,
    },

    /// Rebase a set of ranges through a list of ops, and print the resulting ranges
    Rebase {
        /// JSON file with the ranges ({"changes": [...], "comments": [...]})
        ranges: PathBuf,

        /// JSON file with a list of ops ([{"p": 3, "i": "hi"}, ...])
        ops: PathBuf,

        /// The user making the edits
        #[arg(short, long)]
        user: Option<String>,

        /// Record the edits as tracked changes
        #[arg(short, long)]
        track: bool,

        /// The document text before the ops. If given, the ops are applied to it too and the
        /// resulting ranges are checked against the resulting text.
        #[arg(long)]
        text: Option<PathBuf>,

        /// Output contents to the named file instead of stdout
        #[arg(short, long)]
        output: Option<OsString>,

        /// Pretty print the JSON
        #[arg(short, long)]
        pretty: bool,
    },

    /// Overwrite a document with new content, moving its ranges to match
    Set {
        /// The current document content
        content: PathBuf,

        /// The file containing the new content
        target_content_file: PathBuf,

        /// JSON file with the document's ranges. If not specified, the document has none.
        #[arg(short, long)]
        ranges: Option<PathBuf>,

        /// The document's current version
        #[arg(short, long, default_value_t = 0)]
        version: u64,

        /// The user setting the document
        #[arg(short, long, default_value = "tr-cli")]
        user: String,

        /// Restore text from tracked deletes where the new content puts it back
        #[arg(long)]
        undo: bool,

        /// Output contents to the named file instead of stdout
        #[arg(short, long)]
        output: Option<OsString>,

        /// Pretty print the JSON
        #[arg(short, long)]
        pretty: bool,
    },
}

/// What `tr set` prints: the update which was applied, and where everything ended up.
#[derive(Serialize, Debug)]
struct SetResult {
    update: Option<Update>,
    version: u64,
    ranges: Ranges,
}

fn read_ranges(path: Option<&PathBuf>) -> Result<Ranges, Error> {
    Ok(match path {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => Ranges::default(),
    })
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli: Cli = Cli::parse();
    match cli.command {
        Commands::Diff { before, after, granularity, patience, timeout_ms, output, pretty } => {
            let before = fs::read_to_string(before)?;
            let after = fs::read_to_string(after)?;

            let opts = DiffOptions {
                granularity: granularity.into(),
                algorithm: if patience { DiffAlgorithm::Patience } else { DiffAlgorithm::Myers },
                timeout: if timeout_ms == 0 { None } else { Some(Duration::from_millis(timeout_ms)) },
            };
            let ops = diff_str_as_ops_with(&before, &after, &opts);
            tracing::info!(ops = ops.len(), "diffed");
            write_serde_data(output, pretty, &ops)?;
        }

        Commands::Rebase { ranges, ops, user, track, text, output, pretty } => {
            let ranges = read_ranges(Some(&ranges))?;
            let ops: Vec<Op> = serde_json::from_str(&fs::read_to_string(ops)?)?;

            let mut tracker = RangesTracker::from(ranges);
            tracker.track_changes = track;
            let metadata = Metadata {
                user_id: user.as_deref().map(Into::into),
                ts: None,
            };

            match text {
                Some(text) => {
                    let mut doc = JumpRope::from(fs::read_to_string(text)?.as_str());
                    tracker.validate(&doc.to_string())?;
                    for op in &ops {
                        op.apply_to_rope(&mut doc)?;
                        tracker.apply_op(op, metadata.clone())?;
                    }
                    tracker.validate(&doc.to_string())?;
                }
                None => tracker.apply_ops(&ops, metadata)?,
            }

            write_serde_data(output, pretty, tracker.ranges())?;
        }

        Commands::Set { content, target_content_file, ranges, version, user, undo, output, pretty } => {
            let content = fs::read_to_string(content)?;
            let new_content = fs::read_to_string(target_content_file)?;
            let ranges = read_ranges(ranges.as_ref())?;

            let mut session = DocSession::new(&content, version, ranges);
            let new_lines: Vec<&str> = new_content.split('\n').collect();
            session.set_doc(&new_lines, &user, undo)?;
            session.ranges().validate(&session.text())?;

            let result = SetResult {
                update: session.take_pending_updates().pop(),
                version: session.version(),
                ranges: session.ranges().ranges(),
            };
            write_serde_data(output, pretty, result)?;
        }
    }

    Ok(())
}

fn write_serde_data<T: Serialize>(mut output: Option<OsString>, pretty: bool, val: T) -> Result<(), Error> {
    // Handle -o- even though its unnecessary.
    if let Some(path) = &output {
        if path == "-" { output = None; }
    }

    let mut writer: BufWriter<Box<dyn Write>> = match output {
        Some(path) => BufWriter::new(Box::new(File::create(path)?)),
        None => BufWriter::new(Box::new(std::io::stdout())),
    };

    if pretty {
        serde_json::to_writer_pretty(&mut writer, &val)?;
    } else {
        serde_json::to_writer(&mut writer, &val)?;
    }
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

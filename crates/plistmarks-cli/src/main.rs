use clap::{Args as ClapArgs, Parser, Subcommand};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use plistmarks_core::{DumpOpts, TranslateOpts};

#[derive(Parser, Debug)]
#[command(
    name = "plistmarks",
    about = "Convert property-list bookmark files (binary or XML) to JSON",
    version
)]
struct Cli {
    /// Log decoding details to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Convert a bookmarks plist to normalized JSON
    Convert(ConvertArgs),
    /// Dump every key of a plist as JSON, without normalizing
    Dump(DumpArgs),
    /// Print folder and leaf counts
    Stats(InputArgs),
    /// Convert every .plist under a directory into one JSON map
    Batch(BatchArgs),
    /// Write a small sample bookmarks plist
    Sample(SampleArgs),
}

#[derive(ClapArgs, Debug)]
#[group(required = true, multiple = false)]
struct InputArgs {
    /// Input plist file
    #[arg(long, value_name = "PLIST")]
    input: Option<PathBuf>,
    /// Read the plist from standard input
    #[arg(long)]
    stdin: bool,
}

#[derive(ClapArgs, Debug)]
struct ConvertArgs {
    #[command(flatten)]
    source: InputArgs,
    /// Output JSON path; prints to stdout when absent
    #[arg(long, value_name = "JSON")]
    out: Option<PathBuf>,
    /// Max folder nesting accepted
    #[arg(long, default_value_t = plistmarks_core::MAX_DEPTH)]
    max_depth: usize,
}

#[derive(ClapArgs, Debug)]
struct DumpArgs {
    #[command(flatten)]
    source: InputArgs,
    /// Output JSON path; prints to stdout when absent
    #[arg(long, value_name = "JSON")]
    out: Option<PathBuf>,
    /// Emit <data> payloads as base64 instead of summaries
    #[arg(long, default_value_t = false)]
    bytes_full: bool,
}

#[derive(ClapArgs, Debug)]
struct BatchArgs {
    /// Directory to scan for .plist files
    dir: PathBuf,
    /// Output JSON path; prints to stdout when absent
    #[arg(long, value_name = "JSON")]
    out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
struct SampleArgs {
    /// Output plist path
    #[arg(long, value_name = "PLIST")]
    out: PathBuf,
    /// Write the XML variant instead of binary
    #[arg(long, default_value_t = false)]
    xml: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.cmd {
        Cmd::Convert(a) => cmd_convert(a),
        Cmd::Dump(a) => cmd_dump(a),
        Cmd::Stats(a) => cmd_stats(a),
        Cmd::Batch(a) => cmd_batch(a),
        Cmd::Sample(a) => cmd_sample(a),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn read_input(args: &InputArgs) -> Vec<u8> {
    let res = match &args.input {
        Some(path) => std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e)),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .map(|_| buf)
                .map_err(|e| format!("stdin: {}", e))
        }
    };
    let data = res.unwrap_or_else(|e| {
        eprintln!("error reading input: {}", e);
        std::process::exit(2);
    });
    debug!(len = data.len(), "read input");
    data
}

fn write_output(out: Option<&Path>, data: &[u8]) {
    let res = match out {
        Some(path) => std::fs::write(path, data).map_err(|e| format!("{}: {}", path.display(), e)),
        None => io::stdout()
            .lock()
            .write_all(data)
            .map_err(|e| format!("stdout: {}", e)),
    };
    res.unwrap_or_else(|e| {
        eprintln!("error writing output: {}", e);
        std::process::exit(4);
    });
}

fn cmd_convert(args: ConvertArgs) {
    let data = read_input(&args.source);
    let opts = TranslateOpts {
        max_depth: args.max_depth,
    };
    let json = plistmarks_core::translate_with(&data, &opts).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(3);
    });
    write_output(args.out.as_deref(), &json);
}

fn cmd_dump(args: DumpArgs) {
    let data = read_input(&args.source);
    let opts = DumpOpts {
        bytes_full: args.bytes_full,
    };
    let json = plistmarks_core::dump_raw(&data, &opts).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(3);
    });
    write_output(args.out.as_deref(), &json);
}

fn cmd_stats(args: InputArgs) {
    let data = read_input(&args);
    let node = plistmarks_core::translate_to_node(&data, &TranslateOpts::default())
        .unwrap_or_else(|e| {
            eprintln!("error: {}", e);
            std::process::exit(3);
        });
    let stats = plistmarks_core::summarize(&node);
    match serde_json::to_string_pretty(&stats) {
        Ok(s) => println!("{}", s),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(3);
        }
    }
}

fn cmd_batch(args: BatchArgs) {
    let entries = plistmarks_core::translate_dir(&args.dir, &TranslateOpts::default())
        .unwrap_or_else(|e| {
            eprintln!("error: {}", e);
            std::process::exit(2);
        });
    let json = plistmarks_core::batch_to_json(&entries).unwrap_or_else(|e| {
        eprintln!("error: {}", e);
        std::process::exit(3);
    });
    write_output(args.out.as_deref(), &json);
}

fn cmd_sample(args: SampleArgs) {
    let tree = plistmarks_core::write::sample_bookmarks();
    let data = if args.xml {
        plistmarks_core::write::encode_xml(&tree)
            .unwrap_or_else(|e| {
                eprintln!("error: {}", e);
                std::process::exit(3);
            })
            .into_bytes()
    } else {
        plistmarks_core::write::encode_binary(&tree)
    };
    write_output(Some(&args.out), &data);
}

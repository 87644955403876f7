//! `sketch-binpack` command line.
//!
//! ```bash
//! # pack tmp/sketches/*.hll into bins of at most 5e8 distinct k-mers
//! sketch-binpack pack 5e8 batch1
//!
//! # build in-process sketches, then pack them with the same engine
//! sketch-binpack sketch genomes/*.fa --out-dir tmp/sketches
//! sketch-binpack pack 5e8 batch1 --engine estimator
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use sketch_binpack::engine::dashing::DASHING_BIN_ENV;
use sketch_binpack::engine::estimator::DEFAULT_K;
use sketch_binpack::{
    pack, BinStore, DashingEngine, EngineKind, Error, EstimatorEngine, FallbackPolicy,
    FitStrategy, IdentifierRules, ItemCatalog, OracleError, OutputLayout, PackerConfig,
    ReportFormat, ReportWriter, Result, SketchBackend, SketchEngine, DEFAULT_SATURATION,
};
use tracing::{error, info};

/// First-Fit bin packing of genome sketches
#[derive(Parser, Debug)]
#[command(name = "sketch-binpack", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pack sketches into capacity-bounded bins and write the bin assignment report
    Pack(PackArgs),
    /// Build in-process sketches from sequence files
    Sketch(SketchArgs),
}

#[derive(Args, Debug)]
struct PackArgs {
    /// Maximum estimated cardinality of a bin
    #[arg(value_parser = parse_capacity)]
    capacity: f64,

    /// Label namespacing the report and completion marker
    label: String,

    /// Directory holding the input sketches
    #[arg(long, default_value = "tmp/sketches")]
    sketches_dir: PathBuf,

    /// Directory receiving the bin sketches
    #[arg(long, default_value = "tmp/bins")]
    bin_dir: PathBuf,

    /// Directory receiving the report
    #[arg(long, default_value = "output")]
    output_dir: PathBuf,

    /// Directory receiving the completion marker
    #[arg(long, default_value = "tmp/completion")]
    completion_dir: PathBuf,

    /// Sketch engine answering cardinality and union queries
    #[arg(long, value_enum, default_value_t = EngineKind::Dashing)]
    engine: EngineKind,

    /// Path of the `dashing` executable (defaults to the one on PATH)
    #[arg(long, env = DASHING_BIN_ENV)]
    dashing_bin: Option<PathBuf>,

    /// Fraction of capacity at which a bin stops accepting items
    #[arg(long, default_value_t = DEFAULT_SATURATION)]
    saturation: f64,

    /// Bin selection strategy
    #[arg(long, value_enum, default_value_t = FitStrategy::FirstFit)]
    strategy: FitStrategy,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// Handling of sketch names without an identifier token
    #[arg(long, value_enum, default_value_t = FallbackPolicy::Warn)]
    on_fallback: FallbackPolicy,

    /// File name token to ignore when extracting identifiers (repeatable, replaces the defaults)
    #[arg(long = "strip-token")]
    strip_tokens: Vec<String>,
}

#[derive(Args, Debug)]
struct SketchArgs {
    /// FASTA, FASTQ or plain sequence files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory receiving `<input file name>.sketch` files
    #[arg(long, default_value = "tmp/sketches")]
    out_dir: PathBuf,

    /// K-mer length
    #[arg(short, long, default_value_t = DEFAULT_K)]
    k: usize,
}

fn parse_capacity(value: &str) -> std::result::Result<f64, String> {
    let capacity: f64 = value
        .parse()
        .map_err(|_| format!("`{value}` is not a number"))?;
    if capacity.is_finite() && capacity > 0.0 {
        Ok(capacity)
    } else {
        Err(format!("`{value}` is not a positive finite number"))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("sketch_binpack=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Command::Pack(args) => run_pack(args),
        Command::Sketch(args) => run_sketch(args),
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::FAILURE
        }
    }
}

fn run_pack(args: PackArgs) -> Result<()> {
    let layout = OutputLayout::new(&args.output_dir, &args.completion_dir, &args.label);
    layout.clear_marker()?;

    let config = PackerConfig::new(args.capacity)?
        .with_saturation(args.saturation)?
        .with_strategy(args.strategy);

    let engine: SketchEngine = match args.engine {
        EngineKind::Dashing => match args.dashing_bin {
            Some(binary) => DashingEngine::with_binary(binary),
            // clap already consulted the environment for `--dashing-bin`
            None => DashingEngine::on_path()?,
        }
        .into(),
        EngineKind::Estimator => EstimatorEngine.into(),
    };

    let mut rules = IdentifierRules::default().with_fallback(args.on_fallback);
    if !args.strip_tokens.is_empty() {
        rules = rules.with_noise_tokens(args.strip_tokens);
    }

    let catalog = ItemCatalog::scan(&args.sketches_dir, engine.extension(), &rules)?;
    info!(
        label = %args.label,
        items = catalog.len(),
        capacity = config.capacity(),
        strategy = ?config.strategy(),
        "packing sketches"
    );

    let store = BinStore::create(engine, &args.bin_dir)?;
    let result = pack(catalog, &config, &store, &store)?;

    layout.publish(&ReportWriter::new(args.format), &result)?;
    Ok(())
}

fn run_sketch(args: SketchArgs) -> Result<()> {
    if args.k == 0 {
        return Err(OracleError::other("k-mer length must be positive").into());
    }
    std::fs::create_dir_all(&args.out_dir).map_err(|e| Error::io(&args.out_dir, e))?;

    let engine = EstimatorEngine;
    for input in &args.inputs {
        let file = File::open(input).map_err(|e| Error::io(input, e))?;
        let sketch = engine
            .sketch_sequences(BufReader::new(file), args.k)
            .map_err(|e| Error::io(input, e))?;
        let output = sketch_path(&args.out_dir, input, engine.extension());
        engine.store(&output, &sketch)?;
        info!(
            input = %input.display(),
            output = %output.display(),
            estimate = sketch.estimate(),
            "sketched"
        );
    }
    Ok(())
}

fn sketch_path(out_dir: &Path, input: &Path, extension: &str) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sketch".to_string());
    out_dir.join(format!("{name}.{extension}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use test_case::test_case;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test_case("100" => Ok(100.0); "integer")]
    #[test_case("5e8" => Ok(5e8); "scientific")]
    #[test_case("0" => Err("`0` is not a positive finite number".to_string()); "zero")]
    #[test_case("-1" => Err("`-1` is not a positive finite number".to_string()); "negative")]
    #[test_case("inf" => Err("`inf` is not a positive finite number".to_string()); "infinite")]
    #[test_case("lots" => Err("`lots` is not a number".to_string()); "garbage")]
    fn test_parse_capacity(value: &str) -> std::result::Result<f64, String> {
        parse_capacity(value)
    }

    #[test]
    fn test_pack_requires_capacity_and_label() {
        assert!(Cli::try_parse_from(["sketch-binpack", "pack"]).is_err());
        assert!(Cli::try_parse_from(["sketch-binpack", "pack", "100"]).is_err());
        assert!(Cli::try_parse_from(["sketch-binpack", "pack", "abc", "run"]).is_err());

        let cli = Cli::try_parse_from(["sketch-binpack", "pack", "100", "run"]).unwrap();
        match cli.command {
            Command::Pack(args) => {
                assert_eq!(args.capacity, 100.0);
                assert_eq!(args.label, "run");
                assert_eq!(args.sketches_dir, PathBuf::from("tmp/sketches"));
                assert_eq!(args.saturation, DEFAULT_SATURATION);
                assert_eq!(args.strategy, FitStrategy::FirstFit);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_dashing_bin_env_name() {
        let cli = Cli::command();
        let pack = cli.find_subcommand("pack").unwrap();
        let arg = pack
            .get_arguments()
            .find(|arg| arg.get_id() == "dashing_bin")
            .unwrap();
        assert_eq!(arg.get_env(), Some(std::ffi::OsStr::new(DASHING_BIN_ENV)));
    }

    fn estimator_pack_args(root: &Path) -> PackArgs {
        let dir = |name: &str| root.join(name).to_string_lossy().into_owned();
        let argv = [
            "sketch-binpack".to_string(),
            "pack".to_string(),
            "100".to_string(),
            "run".to_string(),
            "--engine".to_string(),
            "estimator".to_string(),
            "--sketches-dir".to_string(),
            dir("sketches"),
            "--bin-dir".to_string(),
            dir("bins"),
            "--output-dir".to_string(),
            dir("output"),
            "--completion-dir".to_string(),
            dir("done"),
            "--strip-token".to_string(),
            "sketch".to_string(),
        ];
        match Cli::try_parse_from(argv).unwrap().command {
            Command::Pack(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_run_pack_writes_report_and_marker() {
        let root = tempfile::tempdir().unwrap();
        let sketches = root.path().join("sketches");
        std::fs::create_dir_all(&sketches).unwrap();
        let engine = EstimatorEngine;
        for (name, seq) in [("A.sketch", ">a\nAAAAC\n"), ("B.sketch", ">b\nCCCCG\n")] {
            let sketch = engine
                .sketch_sequences(std::io::Cursor::new(seq), 4)
                .unwrap();
            engine.store(&sketches.join(name), &sketch).unwrap();
        }

        run_pack(estimator_pack_args(root.path())).unwrap();

        let report = root.path().join("output/run_bin_assignment.txt");
        assert_eq!(
            std::fs::read_to_string(report).unwrap(),
            "Bin 0: A, B; Cardinality: 4.0\n"
        );
        assert!(root.path().join("done/run_binned.done").exists());
    }

    #[test]
    fn test_failed_run_pack_removes_stale_marker() {
        let root = tempfile::tempdir().unwrap();
        let sketches = root.path().join("sketches");
        std::fs::create_dir_all(&sketches).unwrap();
        std::fs::write(sketches.join("A.sketch"), "not a sketch").unwrap();
        let marker = root.path().join("done/run_binned.done");
        std::fs::create_dir_all(marker.parent().unwrap()).unwrap();
        std::fs::write(&marker, b"").unwrap();

        let err = run_pack(estimator_pack_args(root.path())).unwrap_err();

        assert!(matches!(err, Error::Oracle(OracleError::Malformed { .. })));
        assert!(!marker.exists(), "stale marker survived a failed run");
        assert!(!root.path().join("output/run_bin_assignment.txt").exists());
    }

    #[test]
    fn test_sketch_path() {
        assert_eq!(
            sketch_path(Path::new("out"), Path::new("in/S1.fa.gz"), "sketch"),
            PathBuf::from("out/S1.fa.gz.sketch")
        );
    }
}

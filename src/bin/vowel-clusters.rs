use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Parser;
use mimalloc::MiMalloc;
use strum_macros::EnumString;

use vowel_clusters::{
    analysis_config::{
        AnalysisConfig, DatasetConfig, FeatureSource, NormalizationConfig, OutputConfig,
        PipelineConfig, SweepRange,
    },
    cluster::{AlgorithmConfig, GmmConfig, KMeansConfig},
    config_file::LoadConfigFile,
    get_terminal_width::get_terminal_width,
    info,
    pipeline::{load_dataset, prepare, run_all, run_analysis, write_outputs, AnalysisOutput},
    tables::{
        table_view::Named,
        terminal_table::{print_table_view, TerminalTableOpts},
    },
    utillib::logging::{set_log_level, LogLevelOpt},
};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const PROGRAM_NAME: &str = "vowel-clusters";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(clap::Parser, Debug)]
#[command(next_line_help = true)]
#[command(term_width = get_terminal_width(4))]
struct Opts {
    #[command(flatten)]
    log_level: LogLevelOpt,

    /// The subcommand to run. Use `--help` after the sub-command to
    /// get a list of the allowed options there.
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, EnumString, PartialEq, Clone, Copy)]
#[strum(serialize_all = "kebab_case")]
enum SweepAlgorithm {
    Kmeans,
    Gmm,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print version
    Version,

    /// Run all analyses described in a config file, print the
    /// contingency tables and sweeps, and write the outputs configured
    /// there.
    Run {
        #[command(flatten)]
        terminal_table_opts: TerminalTableOpts,

        /// Do not write the CSV and Excel outputs, only print
        #[arg(long)]
        no_write: bool,

        /// Path to the config file (JSON5, YAML or HCL, by file
        /// extension). Default: `vowel-clusters.{json5,json,yml,yaml,hcl}`
        /// in the current directory.
        config: Option<PathBuf>,
    },

    /// Re-encode the config file (format determined by the file
    /// extension of `output_path`) and save it there. Paths in the
    /// config are written as given, not resolved.
    ConfigSave {
        /// Path to the config file to read, default as for `run`
        #[arg(long)]
        config: Option<PathBuf>,

        output_path: PathBuf,
    },

    /// Show how the fit criterion (inertia for kmeans, BIC for gmm)
    /// develops over a range of cluster counts, for a quick look for
    /// an elbow.
    Sweep {
        #[command(flatten)]
        terminal_table_opts: TerminalTableOpts,

        /// The CSV file with the measurements
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "speaker")]
        speaker_column: String,

        #[arg(long, default_value = "vowel")]
        category_column: String,

        /// The measurement columns to cluster on
        #[arg(long, value_delimiter = ',', default_value = "F1,F2")]
        measurements: Vec<String>,

        /// kmeans or gmm
        #[arg(long, default_value = "kmeans")]
        algorithm: SweepAlgorithm,

        #[arg(long, default_value = "1")]
        from: usize,

        #[arg(long, default_value = "8")]
        to: usize,

        /// Cluster the measurements as loaded instead of the
        /// per-speaker z-scores
        #[arg(long)]
        raw: bool,

        /// Only use rows of these categories
        #[arg(long, value_delimiter = ',')]
        categories: Option<Vec<String>>,

        /// Cluster the per speaker and category means
        #[arg(long)]
        aggregate: bool,
    },
}

fn print_outputs(outputs: &[AnalysisOutput], opts: &TerminalTableOpts) -> Result<()> {
    for output in outputs {
        let name = &output.name;
        let contingency = Named::new(
            format!("{name}: {} categories vs. clusters", output.algorithm),
            &output.contingency,
        );
        print_table_view(&contingency, opts.clone(), std::io::stdout())?;
        if let Some(sweep) = &output.sweep {
            let sweep = Named::new(format!("{name}: sweep"), sweep);
            print_table_view(&sweep, opts.clone(), std::io::stdout())?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let Opts { log_level, command } = Opts::parse();

    set_log_level(log_level.try_into()?);

    match command {
        Command::Version => println!("{PROGRAM_NAME} version {VERSION}"),

        Command::Run {
            terminal_table_opts,
            no_write,
            config,
        } => {
            let config = PipelineConfig::load(config.as_deref())?;
            let outputs = run_all(&config)?;
            print_outputs(&outputs, &terminal_table_opts)?;
            if no_write {
                info!("not writing outputs");
            } else {
                write_outputs(&outputs, &config.output)?;
            }
        }

        Command::ConfigSave {
            config,
            output_path,
        } => {
            let config = PipelineConfig::load_config(config.as_deref(), |msg| {
                bail!("no config file given, and none found: {msg}")
            })?;
            config.check()?;
            config.save(&output_path)?;
            info!("saved config to {output_path:?}");
        }

        Command::Sweep {
            terminal_table_opts,
            input,
            speaker_column,
            category_column,
            measurements,
            algorithm,
            from,
            to,
            raw,
            categories,
            aggregate,
        } => {
            if from == 0 || from > to {
                bail!("invalid range --from {from} --to {to}")
            }
            let method = match algorithm {
                SweepAlgorithm::Kmeans => AlgorithmConfig::KMeans(KMeansConfig::new(from)),
                SweepAlgorithm::Gmm => AlgorithmConfig::Gmm(GmmConfig::new(from)),
            };
            let config = PipelineConfig {
                dataset: DatasetConfig {
                    path: input,
                    speaker_column,
                    category_column,
                    measurements,
                    delimiter: ',',
                },
                normalization: NormalizationConfig {
                    enabled: !raw,
                    ..NormalizationConfig::default()
                },
                output: OutputConfig::default(),
                analyses: vec![AnalysisConfig {
                    name: "sweep".into(),
                    categories,
                    aggregate,
                    features: if raw {
                        FeatureSource::Raw
                    } else {
                        FeatureSource::Normalized
                    },
                    method,
                    sweep: Some(SweepRange { from, to }),
                }],
            };
            config.check()?;
            let prepared = prepare(load_dataset(&config)?, &config)?;
            let output = run_analysis(&prepared, &config, &config.analyses[0])?;
            if let Some(sweep) = &output.sweep {
                let elbow = sweep.elbow();
                let sweep = Named::new(
                    format!("{} over {from}..={to} clusters", sweep.criterion_name),
                    sweep,
                );
                print_table_view(&sweep, terminal_table_opts, std::io::stdout())?;
                if let Some(elbow) = elbow {
                    info!("largest improvement at {elbow} clusters");
                }
            }
        }
    }

    Ok(())
}

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::error;

use wfsim_workflow::experiment::Experiment;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Runs batch experiment with the workflow scheduler simulator
struct Args {
    /// Path to YAML file with experiment configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Path to produced JSON file with experiment results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Number of threads to use (default - use all available cores)
    #[arg(short, long, default_value_t = std::thread::available_parallelism().map_or(1, |n| n.get()))]
    threads: usize,
}

fn results_path(args: &Args) -> PathBuf {
    if let Some(output) = &args.output {
        return output.clone();
    }
    let stem = args
        .config
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "experiment".to_string());
    args.config
        .with_file_name([stem.as_str(), "-results"].concat())
        .with_extension("json")
}

fn main() -> ExitCode {
    env_logger::Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();

    let experiment = match Experiment::load(&args.config) {
        Ok(experiment) => experiment,
        Err(e) => {
            error!("can't load experiment: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let results = experiment.run(args.threads);
    let failed = results.iter().filter(|r| r.error.is_some()).count();
    if failed > 0 {
        error!("{} of {} runs failed", failed, results.len());
    }

    let path = results_path(&args);
    let written = serde_json::to_string_pretty(&results)
        .map_err(std::io::Error::from)
        .and_then(|json| std::fs::File::create(&path)?.write_all(json.as_bytes()));
    match written {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("can't write results to {}: {}", path.display(), e);
            ExitCode::FAILURE
        }
    }
}

//! Train a milk-quality classifier from a capture file and persist the
//! fitted preprocessing/model pair.

use std::path::PathBuf;

use lactograde::app_dirs;
use lactograde::train::{self, EvaluationReport, ModelFamily, TrainOptions, TrainOutcome};

fn main() {
    if let Err(err) = lactograde::logging::init() {
        eprintln!("Failed to initialize logging: {err}");
    }
    if let Err(err) = run() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    input: PathBuf,
    artifacts_dir: Option<PathBuf>,
    family: ModelFamily,
    test_fraction: f64,
    seed: u64,
    balance: bool,
    compare: bool,
    report_path: Option<PathBuf>,
}

fn run() -> Result<(), String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let train_options = TrainOptions {
        family: options.family,
        test_fraction: options.test_fraction,
        seed: options.seed,
        balance_classes: options.balance,
    };

    let outcome = if options.compare {
        train::compare_from_file(&options.input, &train_options).map_err(|err| err.to_string())?
    } else {
        let artifacts_dir = match &options.artifacts_dir {
            Some(dir) => dir.clone(),
            None => app_dirs::artifacts_dir().map_err(|err| err.to_string())?,
        };
        let outcome = train::train_from_file(&options.input, &artifacts_dir, &train_options)
            .map_err(|err| err.to_string())?;
        println!("artifacts written to {}", artifacts_dir.display());
        outcome
    };

    print_outcome(&outcome);

    if let Some(path) = &options.report_path {
        let json = serde_json::to_string_pretty(&outcome).map_err(|err| err.to_string())?;
        std::fs::write(path, json)
            .map_err(|err| format!("Failed to write {}: {err}", path.display()))?;
        println!();
        println!("report written to {}", path.display());
    }
    Ok(())
}

fn print_outcome(outcome: &TrainOutcome) {
    println!(
        "records: {} loaded, {} dropped; split {} train / {} test",
        outcome.rows_loaded, outcome.rows_dropped, outcome.train_rows, outcome.test_rows
    );
    if outcome.test_rows_skipped > 0 {
        println!(
            "  ({} held-out rows skipped: grade unseen in training)",
            outcome.test_rows_skipped
        );
    }
    println!("grade distribution:");
    for (label, count) in &outcome.class_distribution {
        println!("  {label:<10} {count}");
    }
    for report in &outcome.reports {
        println!();
        print_report(report);
    }
}

fn print_report(report: &EvaluationReport) {
    println!(
        "[{}] accuracy: {:.4}  weighted F1: {:.4}",
        report.family, report.accuracy, report.weighted_f1
    );
    for (label, stats) in &report.per_class {
        println!(
            "  {label:<10}  precision={:.3}  recall={:.3}  f1={:.3}  support={}",
            stats.precision, stats.recall, stats.f1, stats.support
        );
    }
    println!("  confusion matrix (rows=true, cols=pred):");
    for row in &report.confusion {
        let mut line = String::new();
        for count in row {
            line.push_str(&format!("{count:6}"));
        }
        println!("  {line}");
    }
    println!("  feature attribution ({}):", report.attribution_kind);
    for entry in &report.attribution {
        println!("    {:<16} {:.4}", entry.feature, entry.score);
    }
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut input: Option<PathBuf> = None;
    let mut artifacts_dir: Option<PathBuf> = None;
    let mut family = ModelFamily::Forest;
    let mut test_fraction = 0.2f64;
    let mut seed = 42u64;
    let mut balance = true;
    let mut compare = false;
    let mut report_path: Option<PathBuf> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--input" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--input requires a value".to_string())?;
                input = Some(PathBuf::from(value));
            }
            "--artifacts" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--artifacts requires a value".to_string())?;
                artifacts_dir = Some(PathBuf::from(value));
            }
            "--model" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--model requires a value".to_string())?;
                family = ModelFamily::parse(value)?;
            }
            "--test-fraction" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--test-fraction requires a value".to_string())?;
                test_fraction = value
                    .parse::<f64>()
                    .map_err(|_| format!("Invalid --test-fraction value: {value}"))?;
            }
            "--seed" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--seed requires a value".to_string())?;
                seed = value
                    .parse::<u64>()
                    .map_err(|_| format!("Invalid --seed value: {value}"))?;
            }
            "--no-balance" => balance = false,
            "--compare" => compare = true,
            "--report" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--report requires a value".to_string())?;
                report_path = Some(PathBuf::from(value));
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    let input = input.ok_or_else(|| "--input is required".to_string())?;
    Ok(CliOptions {
        input,
        artifacts_dir,
        family,
        test_fraction,
        seed,
        balance,
        compare,
        report_path,
    })
}

fn help_text() -> String {
    [
        "lactograde-train",
        "",
        "Usage:",
        "  lactograde-train --input <records.json|jsonl> [options]",
        "",
        "Options:",
        "  --artifacts <dir>        Where to write the fitted pair (default: platform dir).",
        "  --model <forest|linear>  Classifier family to persist (default: forest).",
        "  --test-fraction <f>      Held-out fraction in (0, 1) (default: 0.2).",
        "  --seed <n>               Split and trainer seed (default: 42).",
        "  --no-balance             Disable inverse-frequency class weights.",
        "  --compare                Evaluate both families; persist nothing.",
        "  --report <file>          Also write the outcome as JSON.",
    ]
    .join("\n")
}

//! Grade a single sensor reading with the persisted model pair.
//!
//! The reading comes from stdin by default, or from a file or the collector
//! endpoint. Output is one JSON object on stdout; on failure the object is
//! `{"error": ...}` and the exit code is nonzero.

use std::path::PathBuf;

use lactograde::app_dirs;
use lactograde::infer::{self, ReadingSource};

fn main() {
    if let Err(err) = lactograde::logging::init() {
        eprintln!("Failed to initialize logging: {err}");
    }
    match run() {
        Ok(prediction) => println!("{prediction}"),
        Err(err) => {
            println!("{}", serde_json::json!({ "error": err }));
            std::process::exit(1);
        }
    }
}

#[derive(Debug, Clone)]
struct CliOptions {
    artifacts_dir: Option<PathBuf>,
    input: Option<PathBuf>,
    url: Option<String>,
}

fn run() -> Result<String, String> {
    let options = parse_args(std::env::args().skip(1).collect())?;
    let artifacts_dir = match &options.artifacts_dir {
        Some(dir) => dir.clone(),
        None => app_dirs::artifacts_dir().map_err(|err| err.to_string())?,
    };
    let source = if let Some(url) = &options.url {
        ReadingSource::Endpoint(url.clone())
    } else if let Some(path) = &options.input {
        ReadingSource::File(path.clone())
    } else {
        ReadingSource::Stdin
    };

    let prediction =
        infer::run_prediction(&artifacts_dir, &source).map_err(|err| err.to_string())?;
    serde_json::to_string(&prediction).map_err(|err| err.to_string())
}

fn parse_args(args: Vec<String>) -> Result<CliOptions, String> {
    let mut artifacts_dir: Option<PathBuf> = None;
    let mut input: Option<PathBuf> = None;
    let mut url: Option<String> = None;

    let mut idx = 0usize;
    while idx < args.len() {
        match args[idx].as_str() {
            "-h" | "--help" => return Err(help_text()),
            "--artifacts" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--artifacts requires a value".to_string())?;
                artifacts_dir = Some(PathBuf::from(value));
            }
            "--input" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--input requires a value".to_string())?;
                input = Some(PathBuf::from(value));
            }
            "--url" => {
                idx += 1;
                let value = args
                    .get(idx)
                    .ok_or_else(|| "--url requires a value".to_string())?;
                url = Some(value.to_string());
            }
            unknown => return Err(format!("Unknown argument: {unknown}\n\n{}", help_text())),
        }
        idx += 1;
    }

    if input.is_some() && url.is_some() {
        return Err("--input and --url are mutually exclusive".to_string());
    }
    Ok(CliOptions {
        artifacts_dir,
        input,
        url,
    })
}

fn help_text() -> String {
    [
        "lactograde-predict",
        "",
        "Usage:",
        "  lactograde-predict [options] < reading.json",
        "",
        "Options:",
        "  --artifacts <dir>  Directory holding the fitted pair (default: platform dir).",
        "  --input <file>     Read the reading from a JSON file instead of stdin.",
        "  --url <url>        Fetch the newest reading from the collector endpoint.",
    ]
    .join("\n")
}

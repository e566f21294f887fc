use std::process::ExitCode;

use nightsail::{DioramaConfig, Preset};

/// `nightsail [credits|harbor|path/to/config.json]`
fn main() -> ExitCode {
    let config = match std::env::args().nth(1) {
        None => Ok(DioramaConfig::default()),
        Some(arg) if arg.ends_with(".json") => std::fs::read_to_string(&arg)
            .map_err(anyhow::Error::from)
            .and_then(|json| DioramaConfig::from_json(&json).map_err(anyhow::Error::from)),
        Some(arg) => arg
            .parse::<Preset>()
            .map(DioramaConfig::preset)
            .map_err(anyhow::Error::from),
    };
    let result = config.and_then(nightsail::run);
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("nightsail: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

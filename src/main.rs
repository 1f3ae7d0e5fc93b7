use std::env;
use std::path::Path;
use std::process::ExitCode;

use log::{error, LevelFilter};

use mucher::{ExamConfig, ExamGenerator, ExamGrader, MuchProcess, MucherResult};

const DEFAULT_CONFIG_FILE: &str = "mucher.yaml";

fn main() -> ExitCode {
    let mut builder = pretty_env_logger::formatted_builder();
    builder.filter_level(LevelFilter::Info);
    if let Ok(filter) = env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }
    builder.init();

    let args: Vec<String> = env::args().collect();
    let action = args.get(1).map(String::as_str).unwrap_or("c");
    let config_path = args.get(2).map(String::as_str).unwrap_or(DEFAULT_CONFIG_FILE);

    match run(action, Path::new(config_path)) {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(action: &str, config_path: &Path) -> MucherResult<ExitCode> {
    if action == "init" {
        ExamConfig::default().to_yaml(config_path)?;
        println!("Generated configuration template: {}", config_path.display());
        return Ok(ExitCode::SUCCESS);
    }

    let config = if config_path.exists() {
        ExamConfig::from_yaml(config_path)?
    } else {
        ExamConfig::default()
    };

    match action {
        "c" => {
            let runner = MuchProcess::new(&config.much_binary);
            ExamGenerator::new(config).generate(&runner)?;
            Ok(ExitCode::SUCCESS)
        }
        "v" => {
            let (_, errors) = ExamGrader::new(config).grade()?;
            // unresolved rows were already logged; signal them in the exit code
            if errors.is_empty() {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::FAILURE)
            }
        }
        other => {
            eprintln!("unknown action '{}'", other);
            eprintln!("usage: mucher <c|v|init> [{}]", DEFAULT_CONFIG_FILE);
            Ok(ExitCode::from(2))
        }
    }
}

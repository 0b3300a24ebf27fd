//! Config validation CLI tool
//!
//! Validates a blockade configuration file and reports any errors.

use blockade_util::default_config_path;
use std::path::PathBuf;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    let config_path = match args.get(1) {
        Some(path) => PathBuf::from(path),
        None => {
            let default_path = default_config_path();
            eprintln!("Usage: validate-config [config-file]");
            eprintln!();
            eprintln!("Validates a blockade configuration file.");
            eprintln!();
            eprintln!("If no path is provided, uses: {}", default_path.display());
            eprintln!();
            eprintln!("Example:");
            eprintln!("  validate-config {}", default_path.display());
            return ExitCode::from(2);
        }
    };

    if !config_path.exists() {
        eprintln!("Error: Configuration file not found: {}", config_path.display());
        return ExitCode::from(1);
    }

    match blockade_config::load_config(&config_path) {
        Ok(config) => {
            let monitor = &config.monitor;
            println!("✓ Configuration is valid");
            println!();
            println!("Summary:");
            println!("  Config version: {}", blockade_config::CURRENT_CONFIG_VERSION);
            println!("  Data directory: {}", config.service.data_dir.display());
            println!("  Trigger: {}", monitor.trigger.as_str());
            println!("  Poll interval: {}ms", monitor.poll_interval.as_millis());
            match monitor.rearm_after {
                Some(rearm) => println!("  Re-arm after: {}s", rearm.as_secs()),
                None => println!("  Re-arm after: leaving the app"),
            }
            println!("  Presenter: {}", config.presenter.command.join(" "));

            let reserved = config.reserved();
            println!();
            println!("Reserved packages ({}):", reserved.len());
            for package in &reserved {
                println!("  - {}", package);
            }

            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("✗ Configuration validation failed");
            eprintln!();
            match &e {
                blockade_config::ConfigError::ReadError(io_err) => {
                    eprintln!("Failed to read file: {}", io_err);
                }
                blockade_config::ConfigError::ParseError(parse_err) => {
                    eprintln!("TOML parse error:");
                    eprintln!("  {}", parse_err);
                }
                blockade_config::ConfigError::ValidationFailed { errors } => {
                    eprintln!("Validation errors ({}):", errors.len());
                    for err in errors {
                        eprintln!("  - {}", err);
                    }
                }
                blockade_config::ConfigError::UnsupportedVersion(ver) => {
                    eprintln!(
                        "Unsupported config version: {} (expected {})",
                        ver,
                        blockade_config::CURRENT_CONFIG_VERSION
                    );
                }
            }
            ExitCode::from(1)
        }
    }
}

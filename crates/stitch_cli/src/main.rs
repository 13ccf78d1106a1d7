//! CLI inspection entry point.
//!
//! # Responsibility
//! - Print the core version for quick linkage checks.
//! - Given a data directory, print merged entity counts per kind.
//!
//! Usage:
//! - `stitch_cli`
//! - `stitch_cli <data_dir> [db_path] [project_id]`
//! - `stitch_cli --config <config.json> [project_id]`

use log::{error, info};
use std::path::PathBuf;
use std::process::ExitCode;
use stitch_core::{init_logging, BaseCatalogLoader, CoreConfig, EntityKind, NarrativeContext};

fn main() -> ExitCode {
    println!("stitch_core version={}", stitch_core::core_version());

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return ExitCode::SUCCESS;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_run module=cli status=error error={message}");
            eprintln!("error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: &[String]) -> Result<(), String> {
    let (config, project_id) = parse_args(args)?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, &log_dir.to_string_lossy())?;
    }

    let conn = config.open_db().map_err(|err| err.to_string())?;
    let kv = config.kv_store(&conn);
    let catalog = BaseCatalogLoader::new(config.catalog_source());
    let context = NarrativeContext::new(&kv, &catalog, config.namespace());

    let snapshot = context
        .snapshot(project_id.as_deref())
        .map_err(|err| err.to_string())?;
    info!(
        "event=cli_inspect module=cli status=ok data_dir={} scope={}",
        config.data_dir.display(),
        project_id.as_deref().unwrap_or("*")
    );

    println!("scope={}", project_id.as_deref().unwrap_or("*"));
    for kind in EntityKind::ALL {
        let count = snapshot.get(&kind).map_or(0, Vec::len);
        println!("{:<14} {count}", kind.storage_name());
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<(CoreConfig, Option<String>), String> {
    if args[0] == "--config" {
        let path = args
            .get(1)
            .ok_or_else(|| "--config requires a file path".to_string())?;
        let config = CoreConfig::from_file(path).map_err(|err| err.to_string())?;
        return Ok((config, args.get(2).cloned()));
    }

    let config = CoreConfig {
        data_dir: PathBuf::from(&args[0]),
        db_path: args.get(1).filter(|path| !path.is_empty()).map(PathBuf::from),
        log_dir: std::env::var_os("STITCH_LOG_DIR").map(PathBuf::from),
        ..CoreConfig::default()
    };
    config.validate().map_err(|err| err.to_string())?;
    Ok((config, args.get(2).cloned()))
}

//! Wardrobe command line tool
//!
//! Decodes, re-encodes and inspects shareable design blobs and converts them
//! to and from design files.

use std::io::Read;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::json;
use tracing::{error, info};
use wardrobe::wardrobe_core::design::file;
use wardrobe::wardrobe_core::StaticHost;
use wardrobe::{core::Config, Error, Result, Wardrobe};

fn main() -> ExitCode {
    let matches = cli().get_matches();

    match run(&matches) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            if e.is_client_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn cli() -> Command {
    let blob = || {
        Arg::new("blob")
            .value_name("BLOB")
            .help("Design blob; read from stdin when omitted")
    };

    Command::new("wardrobe")
        .version(wardrobe::VERSION)
        .about("Inspect and convert shareable appearance designs.")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .global(true)
                .help("Configuration file path")
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .global(true)
                .help("Log level (trace, debug, info, warn, error)")
        )
        .arg(
            Arg::new("metrics")
                .long("metrics")
                .action(ArgAction::SetTrue)
                .global(true)
                .help("Print collected metrics to stderr on exit")
        )
        .subcommand(Command::new("decode").about("Decode a blob to JSON").arg(blob()))
        .subcommand(
            Command::new("encode")
                .about("Encode a design file (JSON or MessagePack) as a blob")
                .arg(Arg::new("file").value_name("FILE").required(true))
        )
        .subcommand(
            Command::new("migrate")
                .about("Re-encode a blob at the current version")
                .arg(blob())
        )
        .subcommand(
            Command::new("inspect")
                .about("Describe a blob without applying it")
                .arg(blob())
        )
        .subcommand(
            Command::new("import")
                .about("Turn a blob into a design file")
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .value_name("NAME")
                        .default_value("Imported design")
                )
                .arg(
                    Arg::new("msgpack")
                        .long("msgpack")
                        .action(ArgAction::SetTrue)
                        .help("Write MessagePack instead of JSON")
                )
                .arg(blob())
        )
}

fn run(matches: &ArgMatches) -> Result<()> {
    let mut config = match matches.get_one::<String>("config") {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };

    // Apply CLI overrides
    if let Some(level) = matches.get_one::<String>("log-level") {
        config.logging.level = level.clone();
        config.validate()?;
    }

    wardrobe::init(&config)?;
    let codec = config.wire_codec();

    let result = match matches.subcommand() {
        Some(("decode", sub)) => {
            let decoded = codec.decode(&read_blob(sub)?)?;
            println!("{}", serde_json::to_string_pretty(&decoded)?);
            Ok(())
        }
        Some(("encode", sub)) => {
            let path = required(sub, "file")?;
            let design = read_design_file(Path::new(path))?;
            println!("{}", codec.encode(&design.record, design.mask)?);
            Ok(())
        }
        Some(("migrate", sub)) => {
            let decoded = codec.decode(&read_blob(sub)?)?;
            info!("Migrating blob from version {}", decoded.version);
            println!("{}", codec.encode(&decoded.record, decoded.mask)?);
            Ok(())
        }
        Some(("inspect", sub)) => {
            let blob = read_blob(sub)?;
            let (version, payload) = codec.unwrap_payload(&blob)?;
            let decoded = codec.decode(&blob)?;
            let report = json!({
                "version": version,
                "payload_bytes": payload.len(),
                "applied_fields": decoded.mask.iter().count(),
                "categories": format!("{:?}", decoded.mask.categories()),
                "legacy_write_protected": decoded.legacy_write_protected,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
        Some(("import", sub)) => import(&config, sub),
        _ => Err(Error::invalid_input("unknown subcommand")),
    };

    if matches.get_flag("metrics") {
        eprintln!("{}", wardrobe::system::collect_metrics()?);
    }
    result
}

fn import(config: &Config, sub: &ArgMatches) -> Result<()> {
    let service = Wardrobe::new(Arc::new(StaticHost::new()), config);
    let name = required(sub, "name")?;
    let id = service.import_blob(name, &read_blob(sub)?)?;
    let design = service.registry().export(id)?;

    if sub.get_flag("msgpack") {
        use std::io::Write;
        std::io::stdout().write_all(&file::to_msgpack(&design)?)?;
    } else {
        println!("{}", file::to_json(&design)?);
    }
    Ok(())
}

fn required<'a>(matches: &'a ArgMatches, name: &str) -> Result<&'a String> {
    matches
        .get_one::<String>(name)
        .ok_or_else(|| Error::invalid_input(format!("missing {}", name)))
}

/// Blob from the argument, or the whole of stdin
fn read_blob(matches: &ArgMatches) -> Result<String> {
    if let Some(blob) = matches.get_one::<String>("blob") {
        return Ok(blob.clone());
    }
    let mut blob = String::new();
    std::io::stdin().read_to_string(&mut blob)?;
    Ok(blob)
}

fn read_design_file(path: &Path) -> Result<file::DesignFile> {
    let bytes = std::fs::read(path)?;
    let design = match path.extension().and_then(|e| e.to_str()) {
        Some("msgpack") | Some("mpk") => file::from_msgpack(&bytes)?,
        _ => {
            let text = String::from_utf8(bytes)
                .map_err(|e| Error::invalid_input(format!("design file is not UTF-8: {}", e)))?;
            file::from_json(&text)?
        }
    };
    Ok(design)
}

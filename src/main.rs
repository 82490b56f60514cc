pub mod models {
    pub mod tado;
}

pub mod client;
pub mod config;
pub mod provider;
pub mod schedule;
pub mod token;
pub mod utils;

#[cfg(test)]
mod testing;

use crate::client::TadoClient;
use crate::config::Config;
use crate::provider::{Diagnostics, ProviderConfig, Severity, TadoProvider};
use log::{error, info, warn};
use serde_json::Value;
use std::path::{Path, PathBuf};

#[derive(Debug, PartialEq)]
enum Command {
    Login,
    Schema,
    Validate { type_name: String, file: PathBuf },
    ReadData { type_name: String, file: PathBuf },
    Create { type_name: String, file: PathBuf },
    Read { type_name: String, file: PathBuf },
    Update { type_name: String, prior: PathBuf, planned: PathBuf },
    Delete { type_name: String, file: PathBuf },
    Import { type_name: String, id: String },
}

#[derive(Debug, PartialEq)]
struct Cli {
    token_path: Option<String>,
    command: Command,
}

const USAGE: &str = "usage: tado-provider [--token-path PATH] <login | schema | validate TYPE FILE | read-data TYPE FILE | create TYPE FILE | read TYPE FILE | update TYPE PRIOR PLANNED | delete TYPE FILE | import TYPE ID>";

fn parse_cli<I: IntoIterator<Item = String>>(args: I) -> Result<Cli, String> {
    let mut token_path: Option<String> = None;
    let mut positional: Vec<String> = Vec::new();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--token-path" => {
                if token_path.is_some() {
                    return Err("`--token-path` provided more than once".to_string());
                }
                let value = args
                    .next()
                    .ok_or_else(|| "`--token-path` requires a path argument".to_string())?;
                token_path = Some(value);
            }
            s if s.starts_with("--token-path=") => {
                if token_path.is_some() {
                    return Err("`--token-path` provided more than once".to_string());
                }
                let value = &s["--token-path=".len()..];
                if value.is_empty() {
                    return Err("`--token-path` requires a path argument".to_string());
                }
                token_path = Some(value.to_string());
            }
            "--" => {
                positional.extend(args.by_ref());
                break;
            }
            s if s.starts_with("--") => return Err(format!("unrecognised argument: {}", s)),
            _ => positional.push(arg),
        }
    }

    let mut rest = positional.into_iter();
    let name = rest.next().ok_or_else(|| USAGE.to_string())?;
    let operands: Vec<String> = rest.collect();
    let command = match (name.as_str(), operands.as_slice()) {
        ("login", []) => Command::Login,
        ("schema", []) => Command::Schema,
        ("validate", [t, f]) => Command::Validate {
            type_name: t.clone(),
            file: PathBuf::from(f),
        },
        ("read-data", [t, f]) => Command::ReadData {
            type_name: t.clone(),
            file: PathBuf::from(f),
        },
        ("create", [t, f]) => Command::Create {
            type_name: t.clone(),
            file: PathBuf::from(f),
        },
        ("read", [t, f]) => Command::Read {
            type_name: t.clone(),
            file: PathBuf::from(f),
        },
        ("update", [t, prior, planned]) => Command::Update {
            type_name: t.clone(),
            prior: PathBuf::from(prior),
            planned: PathBuf::from(planned),
        },
        ("delete", [t, f]) => Command::Delete {
            type_name: t.clone(),
            file: PathBuf::from(f),
        },
        ("import", [t, id]) => Command::Import {
            type_name: t.clone(),
            id: id.clone(),
        },
        _ => return Err(USAGE.to_string()),
    };

    Ok(Cli { token_path, command })
}

fn load_document(path: &Path) -> Result<Value, String> {
    let text = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("{} is not valid JSON: {}", path.display(), e))
}

fn print_json(value: &Value) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|e| format!("failed to encode output: {}", e))?;
    println!("{}", text);
    Ok(())
}

fn report(diags: &Diagnostics) -> Result<(), String> {
    for d in diags.iter() {
        match d.severity {
            Severity::Error => error!("{}: {}", d.summary, d.detail),
            Severity::Warning => warn!("{}: {}", d.summary, d.detail),
        }
    }
    if diags.has_errors() {
        Err("operation failed".to_string())
    } else {
        Ok(())
    }
}

fn connect(provider: &TadoProvider, diags: &mut Diagnostics, cfg: &ProviderConfig, env: &Config) -> Result<TadoClient, String> {
    match provider.configure(diags, cfg, env) {
        Some(client) => Ok(client),
        None => {
            report(diags)?;
            Err("provider could not be configured".to_string())
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let env = Config::from_env()?;
    let provider_cfg = ProviderConfig {
        token_path: cli.token_path,
    };
    info!(
        "Config loaded (token_path={}, http_timeout={}s)",
        TadoProvider::token_path(&provider_cfg, &env).display(),
        env.http_timeout.as_secs()
    );

    let provider = TadoProvider::default();
    let resources = provider.resources();
    let data_sources = provider.data_sources();
    let resource = |name: &str| {
        resources
            .get(name)
            .ok_or_else(|| format!("unknown resource type: {}", name))
    };
    let mut diags = Diagnostics::default();

    let output = match cli.command {
        Command::Login => {
            let path = TadoProvider::token_path(&provider_cfg, &env);
            let client = TadoProvider::login(&mut diags, path.clone(), &env);
            report(&diags)?;
            if client.is_some() {
                info!("Token stored at {}", path.display());
            }
            None
        }
        Command::Schema => {
            let resource_schemas: serde_json::Map<String, Value> = resources
                .iter()
                .map(|(name, r)| serde_json::to_value(r.schema()).map(|v| (name.to_string(), v)))
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?;
            let data_source_schemas: serde_json::Map<String, Value> = data_sources
                .iter()
                .map(|(name, d)| serde_json::to_value(d.schema()).map(|v| (name.to_string(), v)))
                .collect::<Result<_, _>>()
                .map_err(|e| e.to_string())?;
            Some(serde_json::json!({
                "provider": provider.schema(),
                "resources": resource_schemas,
                "data_sources": data_source_schemas,
            }))
        }
        Command::Validate { type_name, file } => {
            let r = resource(&type_name)?;
            r.validate(&mut diags, load_document(&file)?);
            report(&diags)?;
            info!("{} configuration in {} is valid", type_name, file.display());
            None
        }
        Command::ReadData { type_name, file } => {
            let d = data_sources
                .get(type_name.as_str())
                .ok_or_else(|| format!("unknown data source type: {}", type_name))?;
            let config = load_document(&file)?;
            let client = connect(&provider, &mut diags, &provider_cfg, &env)?;
            d.read(&mut diags, &client, config)
        }
        Command::Create { type_name, file } => {
            let r = resource(&type_name)?;
            let config = load_document(&file)?;
            let client = connect(&provider, &mut diags, &provider_cfg, &env)?;
            r.create(&mut diags, &client, config)
        }
        Command::Read { type_name, file } => {
            let r = resource(&type_name)?;
            let state = load_document(&file)?;
            let client = connect(&provider, &mut diags, &provider_cfg, &env)?;
            r.read(&mut diags, &client, state)
        }
        Command::Update {
            type_name,
            prior,
            planned,
        } => {
            let r = resource(&type_name)?;
            let prior = load_document(&prior)?;
            let planned = load_document(&planned)?;
            let client = connect(&provider, &mut diags, &provider_cfg, &env)?;
            r.update(&mut diags, &client, prior, planned)
        }
        Command::Delete { type_name, file } => {
            let r = resource(&type_name)?;
            let state = load_document(&file)?;
            let client = connect(&provider, &mut diags, &provider_cfg, &env)?;
            if r.delete(&mut diags, &client, state).is_some() {
                info!("{} removed from state", type_name);
            }
            None
        }
        Command::Import { type_name, id } => {
            let r = resource(&type_name)?;
            let client = connect(&provider, &mut diags, &provider_cfg, &env)?;
            r.import(&mut diags, &id)
                .and_then(|partial| r.read(&mut diags, &client, partial))
        }
    };

    report(&diags)?;
    if let Some(state) = output {
        print_json(&state)?;
    }
    Ok(())
}

fn main() {
    let default_filter = env_logger::Env::default().default_filter_or("info");
    env_logger::Builder::from_env(default_filter)
        .format_timestamp_secs()
        .init();

    let cli = match parse_cli(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("fatal: {}", err);
            std::process::exit(2);
        }
    };

    info!(
        "tado-provider {} (git {}) starting",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_TIME_GIT_HASH")
    );
    if let Err(e) = run(cli) {
        error!("fatal: {}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, String> {
        parse_cli(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_commands_with_token_path() {
        let cli = parse(&["--token-path", "/tmp/t.json", "create", "tado_geofencing", "geo.json"]).unwrap();
        assert_eq!(cli.token_path.as_deref(), Some("/tmp/t.json"));
        assert_eq!(
            cli.command,
            Command::Create {
                type_name: "tado_geofencing".to_string(),
                file: PathBuf::from("geo.json"),
            }
        );

        let cli = parse(&["update", "tado_heating_schedule", "prior.json", "--token-path=t.json", "plan.json"]).unwrap();
        assert_eq!(cli.token_path.as_deref(), Some("t.json"));
        assert!(matches!(cli.command, Command::Update { ref planned, .. } if planned == Path::new("plan.json")));

        let cli = parse(&["import", "tado_heating_schedule", "Home/Bedroom"]).unwrap();
        assert_eq!(
            cli.command,
            Command::Import {
                type_name: "tado_heating_schedule".to_string(),
                id: "Home/Bedroom".to_string(),
            }
        );
    }

    #[test]
    fn rejects_bad_invocations() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["login", "extra"]).is_err());
        assert!(parse(&["read", "tado_geofencing"]).is_err());
        assert!(parse(&["--token-path"]).is_err());
        assert!(parse(&["--token-path=", "login"]).is_err());
        assert!(parse(&["--token-path", "a", "--token-path", "b", "login"]).is_err());
        assert!(parse(&["--verbose", "login"]).is_err());
    }
}

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgAction, Command};
use dbo_core::{HierarchicalSettings, MatchRequest, MatchSource, NarrowingPolicy, Scope};
use dbo_schema::Catalog;
use std::path::Path;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("dbo")
        .version(dbo_core::VERSION)
        .about("Inspect DBO catalogs and narrowing settings")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("policy")
                .about("Resolve the narrowing policy at a settings folder")
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .required(true)
                        .help("Settings TOML file"),
                )
                .arg(
                    Arg::new("scope")
                        .long("scope")
                        .default_value("/")
                        .help("Folder path, e.g. /suite/login"),
                ),
        )
        .subcommand(
            Command::new("match")
                .about("Show the query a read request would run")
                .arg(
                    Arg::new("catalog")
                        .long("catalog")
                        .required(true)
                        .help("Catalog file (.toml or .json)"),
                )
                .arg(
                    Arg::new("table")
                        .long("table")
                        .conflicts_with("formula")
                        .help("Table to read from"),
                )
                .arg(
                    Arg::new("formula")
                        .long("formula")
                        .help("Formula to read from"),
                )
                .arg(
                    Arg::new("input")
                        .long("input")
                        .default_value("{}")
                        .help("Match pattern as a JSON object"),
                )
                .arg(
                    Arg::new("settings")
                        .long("settings")
                        .help("Settings TOML file used for narrowing"),
                )
                .arg(
                    Arg::new("scope")
                        .long("scope")
                        .default_value("/")
                        .help("Folder path for settings lookups"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}

fn load_settings(path: &str) -> Result<HierarchicalSettings> {
    let source =
        std::fs::read_to_string(path).with_context(|| format!("reading settings {path}"))?;
    HierarchicalSettings::from_toml_str(&source).with_context(|| format!("parsing settings {path}"))
}

fn load_catalog(path: &str) -> Result<Catalog> {
    let source = std::fs::read_to_string(path).with_context(|| format!("reading catalog {path}"))?;
    let catalog = match Path::new(path).extension().and_then(|e| e.to_str()) {
        Some("json") => Catalog::from_json_str(&source),
        _ => Catalog::from_toml_str(&source),
    };
    catalog.with_context(|| format!("loading catalog {path}"))
}

fn scope_arg(args: &clap::ArgMatches) -> Scope {
    args.get_one::<String>("scope")
        .map(|s| s.parse::<Scope>().unwrap_or_default())
        .unwrap_or_default()
}

fn policy(args: &clap::ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<String>("settings") else {
        bail!("--settings is required");
    };
    let settings = load_settings(path)?;
    let scope = scope_arg(args);
    let policy = NarrowingPolicy::resolve(&settings, &scope);

    println!("Scope: {scope}");
    println!("Narrowing: {}", policy.is_narrowing());
    match policy.narrow_value() {
        Some(value) => println!("Narrow value: {value}"),
        None => println!("Narrow value: -"),
    }
    println!(
        "Always test generating keys: {}",
        policy.always_test_generating_keys
    );
    println!("Store captured key: {}", policy.store_captured_key());
    Ok(())
}

fn plan_match(args: &clap::ArgMatches) -> Result<()> {
    let Some(path) = args.get_one::<String>("catalog") else {
        bail!("--catalog is required");
    };
    let catalog = load_catalog(path)?;

    let source: MatchSource = match (
        args.get_one::<String>("table"),
        args.get_one::<String>("formula"),
    ) {
        (Some(table), None) => catalog.table(table)?.into(),
        (None, Some(formula)) => catalog.formula(formula)?.into(),
        _ => bail!("exactly one of --table or --formula is required"),
    };

    let raw = args
        .get_one::<String>("input")
        .map_or("{}", String::as_str);
    let input: serde_json::Value = serde_json::from_str(raw).context("parsing --input")?;
    let Some(input) = input.as_object() else {
        bail!("--input must be a JSON object");
    };
    let request = MatchRequest::from_json(source, input)?;

    let policy = match args.get_one::<String>("settings") {
        Some(path) => NarrowingPolicy::resolve(&load_settings(path)?, &scope_arg(args)),
        None => NarrowingPolicy::default(),
    };

    let query = request.plan(&policy)?;
    let (sql, bindings) = query.to_sql();

    if args.get_flag("json") {
        let out = serde_json::json!({
            "target": query.target(),
            "sql": sql,
            "bindings": bindings,
            "sync": request.sync,
            "dontNarrow": request.dont_narrow,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        println!("{sql}");
        for (name, value) in &bindings {
            println!("  :{name} = {value}");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let matches = cli().get_matches();
    match matches.subcommand() {
        Some(("policy", args)) => policy(args),
        Some(("match", args)) => plan_match(args),
        _ => Ok(()),
    }
}

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod columns;
pub mod csv_codec;
pub mod io_utils;
pub mod mapping;
pub mod session;
pub mod store;
pub mod table;

use std::{env, path::Path, sync::OnceLock};

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use log::{LevelFilter, debug, info, warn};
use serde_json::Value;

use crate::{
    cache::CacheConfig,
    catalog::RuleCatalog,
    cli::{Cli, Commands},
    mapping::FieldEdit,
    session::MappingSession,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("colmap", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Rules(args) => handle_rules(&args),
        Commands::Derive(args) => handle_derive(&args),
        Commands::Show(args) => handle_show(&args),
        Commands::Set(args) => handle_set(&args),
        Commands::ApplyRules(args) => handle_apply_rules(&args),
        Commands::Audit(args) => handle_audit(&args),
        Commands::Export(args) => handle_export(&args),
        Commands::Import(args) => handle_import(&args),
    }
}

fn load_catalog(extra: Option<&Path>) -> Result<RuleCatalog> {
    let builtin = RuleCatalog::builtin();
    match extra {
        Some(path) => {
            let custom = catalog::load_custom_definitions(path)?;
            info!(
                "Merged {} custom transformation(s) from {:?}",
                custom.len(),
                path
            );
            Ok(builtin.with_custom(custom))
        }
        None => Ok(builtin.clone()),
    }
}

fn handle_rules(args: &cli::RulesArgs) -> Result<()> {
    let catalog = load_catalog(args.catalog.as_deref())?;
    let headers = ["category", "id", "label", "parameters"]
        .map(String::from)
        .to_vec();
    let mut rows = Vec::new();
    for group in catalog.list_transformations() {
        if args
            .category
            .as_deref()
            .is_some_and(|wanted| !wanted.eq_ignore_ascii_case(group.category))
        {
            continue;
        }
        for definition in group.definitions {
            let params = definition
                .params
                .iter()
                .map(|field| {
                    if field.required {
                        format!("{}*", field.name)
                    } else {
                        field.name.clone()
                    }
                })
                .collect::<Vec<_>>()
                .join(", ");
            rows.push(vec![
                group.category.to_string(),
                definition.id.clone(),
                definition.label.clone(),
                params,
            ]);
        }
    }
    table::print_table(&headers, &rows);

    if args.category.is_none() {
        println!();
        let headers = ["rule", "pattern", "transformation"]
            .map(String::from)
            .to_vec();
        let rows = catalog
            .list_global_rules()
            .iter()
            .map(|rule| {
                vec![
                    rule.id.clone(),
                    rule.pattern.clone(),
                    rule.transformation.clone(),
                ]
            })
            .collect::<Vec<_>>();
        table::print_table(&headers, &rows);
    }
    Ok(())
}

fn handle_derive(args: &cli::DeriveArgs) -> Result<()> {
    let key = args.target.table.to_string();
    let store = io_utils::load_workspace(&args.target.workspace)?;
    let mut session = MappingSession::with_cache(
        cache::SchemaCache::new(CacheConfig::default()),
        store,
        RuleCatalog::builtin().clone(),
    );
    let derived = session
        .select_tables(std::slice::from_ref(&key), |_| {
            columns::load_columns(&args.columns)
        })
        .with_context(|| format!("Deriving default mapping for '{key}'"))?;
    if derived.is_empty() {
        warn!("Table '{key}' already has a mapping; leaving it unchanged");
    } else {
        info!(
            "Derived {} mapping(s) for '{key}'",
            session.store().mappings(&key).len()
        );
    }
    if args.apply_rules {
        let matched = session.apply_global_rules(&key);
        info!("Global rules matched {matched} column(s) of '{key}'");
    }
    io_utils::save_workspace(&args.target.workspace, session.store())
}

fn handle_show(args: &cli::TableArgs) -> Result<()> {
    let key = args.table.to_string();
    let store = io_utils::load_workspace(&args.workspace)?;
    let mappings = store.mappings(&key);
    if mappings.is_empty() {
        info!("Table '{key}' has no mappings in {:?}", args.workspace);
        return Ok(());
    }
    print!("{}", table::render_mappings(mappings));
    Ok(())
}

fn parse_param(spec: &str) -> Result<(String, Value)> {
    let (name, raw) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("Parameter '{spec}' must have the form name=value"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(anyhow!("Parameter '{spec}' is missing a name"));
    }
    Ok((name.to_string(), Value::String(raw.trim().to_string())))
}

fn handle_set(args: &cli::SetArgs) -> Result<()> {
    let key = args.target.table.to_string();
    let catalog = load_catalog(args.catalog.as_deref())?;
    let params = args
        .params
        .iter()
        .map(|spec| parse_param(spec))
        .collect::<Result<Vec<_>>>()?;
    for (name, value) in &params {
        catalog
            .check_parameter(&args.transformation, name, value)
            .with_context(|| format!("Validating parameter '{name}'"))?;
    }
    if catalog.definition(&args.transformation).is_none() {
        debug!(
            "Transformation '{}' is not in the catalog; recording it as given",
            args.transformation
        );
    }

    let mut store = io_utils::load_workspace(&args.target.workspace)?;
    store.update_field(
        &key,
        &args.source,
        FieldEdit::Transformation(args.transformation.clone()),
    );
    for (name, value) in params {
        store.update_field(
            &key,
            &args.source,
            FieldEdit::Parameter {
                name,
                value: Some(value),
            },
        );
    }
    if let Some(expression) = &args.expression {
        if args.transformation != mapping::CUSTOM_SQL_TRANSFORMATION {
            warn!(
                "Expression is only used by '{}'; '{}' will ignore it",
                mapping::CUSTOM_SQL_TRANSFORMATION,
                args.transformation
            );
        }
        store.update_field(
            &key,
            &args.source,
            FieldEdit::Expression(Some(expression.clone())),
        );
    }
    io_utils::save_workspace(&args.target.workspace, &store)?;
    info!(
        "Set '{}' of '{key}' to '{}'",
        args.source, args.transformation
    );
    Ok(())
}

fn handle_apply_rules(args: &cli::ApplyRulesArgs) -> Result<()> {
    let key = args.target.table.to_string();
    let mut store = io_utils::load_workspace(&args.target.workspace)?;
    let matched = store.apply_global_rules(&key, RuleCatalog::builtin().list_global_rules());
    io_utils::save_workspace(&args.target.workspace, &store)?;
    info!("Global rules matched {matched} column(s) of '{key}'");
    Ok(())
}

fn handle_audit(args: &cli::TableArgs) -> Result<()> {
    let key = args.table.to_string();
    let mut store = io_utils::load_workspace(&args.workspace)?;
    let target = store.add_audit_column(&key);
    io_utils::save_workspace(&args.workspace, &store)?;
    info!("Added audit column '{target}' to '{key}'");
    Ok(())
}

fn handle_export(args: &cli::ExportArgs) -> Result<()> {
    let key = args.target.table.to_string();
    let store = io_utils::load_workspace(&args.target.workspace)?;
    let text = csv_codec::export(store.mappings(&key))
        .with_context(|| format!("Exporting mappings of '{key}'"))?;
    io_utils::write_text(args.output.as_deref(), &text)?;
    if let Some(path) = args.output.as_deref().filter(|path| !io_utils::is_dash(path)) {
        info!("Exported mappings of '{key}' to {path:?}");
    }
    Ok(())
}

fn handle_import(args: &cli::ImportArgs) -> Result<()> {
    let key = args.target.table.to_string();
    let text = io_utils::read_text(&args.input, args.input_encoding.as_deref())?;
    let mappings = csv_codec::import(&text)
        .with_context(|| format!("Importing mappings from {:?}", args.input))?;
    let count = mappings.len();
    let mut store = io_utils::load_workspace(&args.target.workspace)?;
    store.replace_from_import(&key, mappings);
    io_utils::save_workspace(&args.target.workspace, &store)?;
    info!("Imported {count} mapping(s) into '{key}'");
    Ok(())
}

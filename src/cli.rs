use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::mapping::TableKey;

#[derive(Debug, Parser)]
#[command(author, version, about = "Manage source-to-target column mappings", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the available transformations and global naming rules
    Rules(RulesArgs),
    /// Derive the default mapping of a table from its introspected columns
    Derive(DeriveArgs),
    /// Show the current mapping of a table
    Show(TableArgs),
    /// Set the transformation (and its parameters) of one source column
    Set(SetArgs),
    /// Apply the global naming rules to every mapped column of a table
    ApplyRules(ApplyRulesArgs),
    /// Append an audit column to a table's mapping
    Audit(TableArgs),
    /// Export a table's mapping as CSV
    Export(ExportArgs),
    /// Replace a table's mapping with the contents of a CSV file
    Import(ImportArgs),
}

#[derive(Debug, Args)]
pub struct TableArgs {
    /// Workspace JSON file holding the mappings of every table
    #[arg(short, long)]
    pub workspace: PathBuf,
    /// Table key in the form schema.table
    #[arg(short, long)]
    pub table: TableKey,
}

#[derive(Debug, Args)]
pub struct RulesArgs {
    /// Additional transformation definitions (YAML or JSON list)
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,
    /// Only list transformations of this category
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Debug, Args)]
pub struct DeriveArgs {
    #[command(flatten)]
    pub target: TableArgs,
    /// Introspected column list (JSON array or CSV with name,type[,length])
    #[arg(short, long)]
    pub columns: PathBuf,
    /// Apply the global naming rules after deriving
    #[arg(long = "apply-rules")]
    pub apply_rules: bool,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    #[command(flatten)]
    pub target: TableArgs,
    /// Source column whose mapping is edited
    #[arg(short, long)]
    pub source: String,
    /// Transformation identifier to assign
    #[arg(short = 'x', long)]
    pub transformation: String,
    /// Transformation parameter as `name=value` (repeatable)
    #[arg(short, long = "param", action = clap::ArgAction::Append)]
    pub params: Vec<String>,
    /// Free-text expression for custom_sql transformations
    #[arg(long)]
    pub expression: Option<String>,
    /// Additional transformation definitions (YAML or JSON list)
    #[arg(short, long)]
    pub catalog: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ApplyRulesArgs {
    #[command(flatten)]
    pub target: TableArgs,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub target: TableArgs,
    /// Destination CSV file (stdout if omitted or '-')
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct ImportArgs {
    #[command(flatten)]
    pub target: TableArgs,
    /// CSV file to import ('-' for stdin)
    #[arg(short, long)]
    pub input: PathBuf,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

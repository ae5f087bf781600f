use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hive",
    about = "Hive: inspect and edit hierarchical settings files",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print the whole tree (or the subtree at --path)
    Dump(DumpArgs),
    /// Print one value
    Get(GetArgs),
    /// Store one value
    Set(SetArgs),
    /// Remove one value
    Unset(NameArgs),
    /// Remove a sub-settings tree
    RmTree(NameArgs),
    /// Copy values from one settings file into another
    Copy(CopyArgs),
}

#[derive(Args)]
pub struct DumpArgs {
    pub file: PathBuf,
    /// Sub-settings path, segments separated by '/'
    #[arg(long)]
    pub path: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub file: PathBuf,
    pub name: String,
    #[arg(long)]
    pub path: Option<String>,
}

#[derive(Args)]
pub struct SetArgs {
    pub file: PathBuf,
    pub name: String,
    /// Value type: Char, String, Bool, SByte, Byte, Int16, UInt16, Int32,
    /// UInt32, Int64, UInt64, Double, Float, Decimal, DateTime, Rectangle,
    /// Point, Size, SizeF, Strings, ByteArray
    #[arg(value_name = "TYPE")]
    pub kind: String,
    pub value: String,
    #[arg(long)]
    pub path: Option<String>,
}

#[derive(Args)]
pub struct NameArgs {
    pub file: PathBuf,
    pub name: String,
    #[arg(long)]
    pub path: Option<String>,
}

#[derive(Args)]
pub struct CopyArgs {
    pub src: PathBuf,
    pub dst: PathBuf,
    /// Copy sub-settings too
    #[arg(short, long)]
    pub recursive: bool,
    /// Replace values already present in the destination
    #[arg(long)]
    pub overwrite: bool,
}

//! Command-line parsing.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use codepad_core::language::{Flavor, LanguageRef};
use codepad_core::types::LanguageId;

#[derive(Debug, Parser)]
#[command(name = "codepad", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a source file and print its output
    Run(RunArgs),
    /// List the languages offered by both compiler flavors
    Languages,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Source file to run
    #[arg(value_name = "FILE")]
    pub source: PathBuf,

    /// File whose contents are fed to the program's standard input
    #[arg(long, value_name = "FILE")]
    pub stdin: Option<PathBuf>,

    /// Language id, overriding the one picked from the file extension
    #[arg(long, value_name = "ID")]
    pub language: Option<LanguageId>,

    /// Look the language id up in the extra compiler flavor
    #[arg(long, action = ArgAction::SetTrue, requires = "language")]
    pub extra: bool,

    /// Options passed to the compiler
    #[arg(
        long = "compiler-options",
        value_name = "OPTS",
        default_value = "",
        allow_hyphen_values = true
    )]
    pub compiler_options: String,

    /// Arguments passed to the program
    #[arg(
        long = "args",
        value_name = "ARGS",
        default_value = "",
        allow_hyphen_values = true
    )]
    pub arguments: String,
}

impl RunArgs {
    /// The language given on the command line, if any.
    pub fn language(&self) -> Option<LanguageRef> {
        let flavor = if self.extra { Flavor::ExtraCe } else { Flavor::Ce };
        self.language.map(|id| LanguageRef::new(flavor, id))
    }
}

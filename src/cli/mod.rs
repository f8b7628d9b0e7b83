pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "college")]
#[command(about = "College CLI - grading calculators, dev tokens and store maintenance")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in human-readable text format")]
    pub text: bool,

    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Grade, attendance and CGPA calculators")]
    Calc {
        #[command(subcommand)]
        cmd: commands::calc::CalcCommands,
    },

    #[command(about = "Mint a development JWT")]
    Token(commands::token::TokenArgs),

    #[command(about = "Schema setup and aggregate consistency checks")]
    Db {
        #[command(subcommand)]
        cmd: commands::db::DbCommands,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    let result = match cli.command {
        Commands::Calc { cmd } => commands::calc::handle(cmd, output_format.clone()).await,
        Commands::Token(args) => commands::token::handle(args, output_format.clone()).await,
        Commands::Db { cmd } => commands::db::handle(cmd, output_format.clone()).await,
    };

    if let Err(e) = &result {
        utils::output_error(&output_format, &e.to_string())?;
    }
    result
}

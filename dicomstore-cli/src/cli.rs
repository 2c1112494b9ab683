// SPDX-FileCopyrightText: 2025 dicomstore contributors
// SPDX-License-Identifier: MIT

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Dynamic-schema store for DICOM metadata.
///
/// Configuration is read from $DICOMSTORE_CONFIG, else ./dicomstore.toml.
#[derive(Debug, Parser)]
#[command(name = "dicomstore", version, arg_required_else_help = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Add DICOM files to the store
    Import {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// List matching rows as JSON lines
    Query {
        /// Substring instead of exact matching
        #[arg(long)]
        partial: bool,

        /// Column to sort by
        #[arg(long, value_name = "COL")]
        sort: Option<String>,

        /// Filters as KEY=VALUE
        #[arg(value_name = "KEY=VALUE", value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },

    /// Show the typed header of a row
    Header { id: i64 },

    /// Print the SUV scale factor of a series
    Suv { uid: String },

    /// Decode a series and summarize it
    Read { uid: String },

    /// List stored series UIDs
    Series,
}

fn parse_filter(filter: &str) -> Result<(String, String), String> {
    match filter.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got '{filter}'")),
    }
}

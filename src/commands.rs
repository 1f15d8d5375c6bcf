//! Loading shared by the `sniff` and `cast` subcommands.

use std::io::Read;

use anyhow::{Context, Result};
use encoding_rs::Encoding;
use log::{debug, info};

use crate::{
    cli::SourceArgs,
    config::SnifferConfig,
    io_utils::{self, CsvRows},
    schema::{Field, SourceDescriptor, load_type_lookup},
};

/// A resolved input: the descriptor, the selected resource's fields and the
/// settings used to read it.
pub struct Source {
    pub descriptor: SourceDescriptor,
    pub fields: Vec<Field>,
    pub config: SnifferConfig,
    pub delimiter: u8,
    pub encoding: &'static Encoding,
}

pub fn load_source(args: &SourceArgs) -> Result<Source> {
    let mut descriptor = SourceDescriptor::load(&args.schema)
        .with_context(|| format!("Loading source descriptor from {:?}", args.schema))?;
    if let Some(path) = &args.types {
        let lookup = load_type_lookup(path)
            .with_context(|| format!("Loading field types from {path:?}"))?;
        let changed = descriptor.update_field_types(args.resource.as_deref(), &lookup)?;
        info!("Updated the type of {changed} field(s) from {path:?}");
    }
    let fields = descriptor
        .resource(args.resource.as_deref())?
        .schema
        .fields
        .clone();
    debug!("Resource declares {} field(s)", fields.len());

    let config = args.sniffer_config()?;
    let delimiter = io_utils::resolve_input_delimiter(&args.input, args.delimiter);
    let encoding = io_utils::resolve_encoding(args.input_encoding.as_deref())?;
    Ok(Source {
        descriptor,
        fields,
        config,
        delimiter,
        encoding,
    })
}

impl Source {
    pub fn open_rows(&self, args: &SourceArgs) -> Result<CsvRows<Box<dyn Read>>> {
        let reader = io_utils::open_csv_reader_from_path(&args.input, self.delimiter)
            .with_context(|| format!("Opening input file {:?}", args.input))?;
        CsvRows::new(reader, self.encoding)
            .with_context(|| format!("Reading headers from {:?}", args.input))
    }
}

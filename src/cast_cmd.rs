use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::CastArgs,
    commands::load_source,
    io_utils::{self, Output, render_row},
    pipeline::sniff_and_cast,
};

pub fn execute(args: &CastArgs) -> Result<()> {
    let mut source = load_source(&args.source)?;
    if let Some(policy) = args.on_runtime_failure {
        source.config = source.config.with_runtime_failure_policy(policy);
    }
    let output_path = args.output.as_deref();
    let output_delimiter =
        io_utils::resolve_output_delimiter(output_path, args.output_delimiter, source.delimiter);
    let output_encoding = io_utils::resolve_encoding(args.output_encoding.as_deref())?;
    info!(
        "Casting '{}' -> {} (delimiter '{}', output '{}')",
        args.source.input.display(),
        output_path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "stdout".into()),
        crate::printable_delimiter(source.delimiter),
        crate::printable_delimiter(output_delimiter)
    );

    let rows = source.open_rows(&args.source)?;
    let headers = rows.headers().to_vec();
    let cast = sniff_and_cast(&source.fields, rows, &source.config)
        .with_context(|| format!("Calibrating field formats for {:?}", args.source.input))?;

    let output = Output::open(output_path).with_context(|| format!("Opening output {output_path:?}"))?;
    let mut writer = output.csv_writer(output_delimiter, output_encoding)?;
    writer.write_record(&headers)?;
    let mut written = 0usize;
    for row in cast {
        let row = row.with_context(|| format!("Casting rows of {:?}", args.source.input))?;
        writer.write_record(render_row(&headers, &row))?;
        written += 1;
    }
    writer.flush()?;
    drop(writer);
    output
        .commit()
        .with_context(|| format!("Writing output {output_path:?}"))?;
    info!("Cast {written} row(s)");
    Ok(())
}

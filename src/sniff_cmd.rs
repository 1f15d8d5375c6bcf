use anyhow::{Context, Result};
use log::info;

use crate::{
    cli::SniffArgs,
    commands::load_source,
    pipeline::{Casters, extract_data_sample, get_casters},
    schema::Field,
    table::{Align, Table},
};

pub fn execute(args: &SniffArgs) -> Result<()> {
    let source = load_source(&args.source)?;
    info!(
        "Sniffing '{}' with delimiter '{}' ({} sample row(s))",
        args.source.input.display(),
        crate::printable_delimiter(source.delimiter),
        source.config.sample_size
    );

    let mut rows = source.open_rows(&args.source)?;
    let sample = extract_data_sample(&mut rows, source.config.sample_size)
        .with_context(|| format!("Reading sample rows from {:?}", args.source.input))?;
    let casters = get_casters(&source.fields, &sample, &source.config)
        .with_context(|| format!("Calibrating field formats for {:?}", args.source.input))?;

    print!("{}", report(&source.fields, &casters).render());

    if let Some(path) = &args.write_descriptor {
        let mut descriptor = source.descriptor;
        let resource = descriptor.resource_mut(args.source.resource.as_deref())?;
        let mut recorded = 0usize;
        for sniffer in casters.sniffers() {
            if let (Some(best), Some(field)) =
                (sniffer.best(), resource.schema.field_mut(sniffer.field()))
            {
                field.record_format(best);
                recorded += 1;
            }
        }
        descriptor
            .save(path)
            .with_context(|| format!("Writing source descriptor to {path:?}"))?;
        info!("Recorded {recorded} format hint(s) in {path:?}");
    }
    Ok(())
}

fn report(fields: &[Field], casters: &Casters) -> Table {
    let mut table = Table::new(["field", "type", "format", "matches", "sample", "empty", "failures"])
        .align(3, Align::Right)
        .align(4, Align::Right)
        .align(5, Align::Right)
        .align(6, Align::Right);
    for field in fields {
        let Some(sniffer) = casters.sniffer(&field.name) else {
            table.push_row([
                field.name.clone(),
                field.field_type.to_string(),
                "-".to_string(),
            ]);
            continue;
        };
        let calibration = sniffer.calibration();
        let (format, matches) = match calibration.best() {
            Some(best) => (best.candidate.to_string(), best.successes.to_string()),
            None => ("(undetermined)".to_string(), "0".to_string()),
        };
        table.push_row([
            field.name.clone(),
            field.field_type.to_string(),
            format,
            matches,
            calibration.sample_size().to_string(),
            calibration.empty_count().to_string(),
            format!(
                "{}/{}",
                calibration.failures(),
                calibration.max_allowed_failures()
            ),
        ]);
    }
    table
}

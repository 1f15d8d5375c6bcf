//! CSV plumbing between files and the row pipeline.
//!
//! - **Delimiters**: `.tsv` inputs default to tab, everything else to comma;
//!   an explicit flag always wins.
//! - **Encoding**: input bytes are decoded with `encoding_rs`; output is
//!   UTF-8 unless another encoding is requested.
//! - **Rows**: [`CsvRows`] turns a reader into the lazy `Result<Row>` stream
//!   the pipeline consumes. Empty cells become `None`.
//! - **stdin/stdout**: a path of `-` routes through the standard streams.

use std::{
    fs::File,
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
};

use csv::QuoteStyle;
use encoding_rs::{Encoder, EncoderResult, Encoding, UTF_8};
use tempfile::NamedTempFile;

use crate::{
    data::Value,
    error::{Error, Result},
    pipeline::Row,
};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| Error::Config(format!("unknown encoding '{value}'"))),
        None => Ok(UTF_8),
    }
}

fn has_extension(path: &Path, wanted: &str) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(wanted))
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or(if has_extension(path, "tsv") {
        DEFAULT_TSV_DELIMITER
    } else {
        DEFAULT_CSV_DELIMITER
    })
}

/// Output keeps the input delimiter unless the output extension says otherwise.
pub fn resolve_output_delimiter(path: Option<&Path>, provided: Option<u8>, fallback: u8) -> u8 {
    match (provided, path) {
        (Some(delimiter), _) => delimiter,
        (None, Some(path)) if has_extension(path, "tsv") => DEFAULT_TSV_DELIMITER,
        (None, Some(path)) if has_extension(path, "csv") => DEFAULT_CSV_DELIMITER,
        _ => fallback,
    }
}

pub fn open_csv_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(false)
        .from_reader(reader)
}

pub fn open_csv_reader_from_path(path: &Path, delimiter: u8) -> Result<csv::Reader<Box<dyn Read>>> {
    let reader: Box<dyn Read> = if is_dash(path) {
        Box::new(io::stdin().lock())
    } else {
        Box::new(BufReader::new(File::open(path)?))
    };
    Ok(open_csv_reader(reader, delimiter))
}

/// Destination for cast rows.
///
/// Files are written under a temporary name next to the target and renamed
/// into place by [`Output::commit`]. Dropping an uncommitted output removes
/// the staged file, so an aborted run leaves no partial file behind.
#[derive(Debug)]
pub enum Output {
    Stdout,
    Staged { file: NamedTempFile, target: PathBuf },
}

impl Output {
    /// `None` and `-` write to stdout.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let Some(target) = path.filter(|p| !is_dash(p)) else {
            return Ok(Output::Stdout);
        };
        let dir = target
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let file = tempfile::Builder::new()
            .prefix(".sniffcast-")
            .suffix(".partial")
            .tempfile_in(dir)?;
        Ok(Output::Staged {
            file,
            target: target.to_path_buf(),
        })
    }

    pub fn csv_writer(
        &self,
        delimiter: u8,
        encoding: &'static Encoding,
    ) -> Result<csv::Writer<Box<dyn Write>>> {
        let base: Box<dyn Write> = match self {
            Output::Stdout => Box::new(io::stdout()),
            Output::Staged { file, .. } => Box::new(BufWriter::new(file.as_file().try_clone()?)),
        };
        let writer: Box<dyn Write> = if encoding == UTF_8 {
            base
        } else {
            Box::new(TranscodingWriter::new(base, encoding))
        };
        Ok(csv::WriterBuilder::new()
            .delimiter(delimiter)
            .quote_style(QuoteStyle::Always)
            .double_quote(true)
            .from_writer(writer))
    }

    /// Moves a staged file onto its target. Writers must be dropped first.
    pub fn commit(self) -> Result<()> {
        match self {
            Output::Stdout => Ok(()),
            Output::Staged { file, target } => {
                file.persist(&target).map_err(|err| Error::Io(err.error))?;
                Ok(())
            }
        }
    }
}

pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(Error::Decode(encoding.name()));
    }
    Ok(text.into_owned())
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Result<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

/// Data rows of a CSV reader as [`Row`]s keyed by header.
pub struct CsvRows<R: Read> {
    headers: Vec<String>,
    records: csv::ByteRecordsIntoIter<R>,
    encoding: &'static Encoding,
}

impl<R: Read> CsvRows<R> {
    pub fn new(mut reader: csv::Reader<R>, encoding: &'static Encoding) -> Result<Self> {
        let headers = decode_record(reader.byte_headers()?, encoding)?
            .into_iter()
            .map(|header| header.trim().to_string())
            .collect();
        Ok(Self {
            headers,
            records: reader.into_byte_records(),
            encoding,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }
}

impl<R: Read> Iterator for CsvRows<R> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        let record = match self.records.next()? {
            Ok(record) => record,
            Err(err) => return Some(Err(err.into())),
        };
        let row = decode_record(&record, self.encoding).map(|cells| {
            self.headers
                .iter()
                .cloned()
                .zip(cells)
                .map(|(header, cell)| {
                    let value = (!cell.is_empty()).then(|| Value::String(cell));
                    (header, value)
                })
                .collect::<Row>()
        });
        Some(row)
    }
}

/// Cells of `row` in `headers` order; empty and missing cells render as `""`.
pub fn render_row(headers: &[String], row: &Row) -> Vec<String> {
    headers
        .iter()
        .map(|header| {
            row.get(header.as_str())
                .and_then(Option::as_ref)
                .map(Value::as_display)
                .unwrap_or_default()
        })
        .collect()
}

/// Re-encodes the UTF-8 produced by the CSV writer into a legacy encoding.
///
/// Characters the target encoding cannot represent are an error, never
/// replaced.
struct TranscodingWriter<W: Write> {
    inner: W,
    encoder: Encoder,
    pending: Vec<u8>,
    encoded: Vec<u8>,
}

impl<W: Write> TranscodingWriter<W> {
    fn new(inner: W, encoding: &'static Encoding) -> Self {
        Self {
            inner,
            encoder: encoding.new_encoder(),
            pending: Vec::new(),
            encoded: Vec::new(),
        }
    }

    fn drain_pending(&mut self, last: bool) -> io::Result<()> {
        let complete = match std::str::from_utf8(&self.pending) {
            Ok(text) => text.len(),
            Err(err) if err.error_len().is_none() && !last => err.valid_up_to(),
            Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidData, err)),
        };
        let text = std::str::from_utf8(&self.pending[..complete])
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?;
        encode_all(&mut self.encoder, text, &mut self.encoded, last)?;
        self.inner.write_all(&self.encoded)?;
        self.encoded.clear();
        self.pending.drain(..complete);
        Ok(())
    }
}

fn encode_all(encoder: &mut Encoder, mut text: &str, out: &mut Vec<u8>, last: bool) -> io::Result<()> {
    loop {
        out.reserve(text.len().max(16));
        let (result, read) = encoder.encode_from_utf8_to_vec_without_replacement(text, out, last);
        text = &text[read..];
        match result {
            EncoderResult::InputEmpty => return Ok(()),
            EncoderResult::OutputFull => continue,
            EncoderResult::Unmappable(ch) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("'{ch}' cannot be encoded as {}", encoder.encoding().name()),
                ));
            }
        }
    }
}

impl<W: Write> Write for TranscodingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        self.drain_pending(false)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl<W: Write> Drop for TranscodingWriter<W> {
    fn drop(&mut self) {
        let _ = self.drain_pending(true);
        let _ = self.inner.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn staged_output_appears_only_on_commit() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("typed.csv");

        let output = Output::open(Some(&target)).unwrap();
        {
            let mut writer = output.csv_writer(b',', UTF_8).unwrap();
            writer.write_record(["amount"]).unwrap();
            writer.flush().unwrap();
        }
        assert!(!target.exists());
        drop(output);
        assert!(!target.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

        let output = Output::open(Some(&target)).unwrap();
        {
            let mut writer = output.csv_writer(b';', UTF_8).unwrap();
            writer.write_record(["amount", "date"]).unwrap();
            writer.flush().unwrap();
        }
        output.commit().unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "\"amount\";\"date\"\n");
        assert!(matches!(Output::open(Some(Path::new("-"))).unwrap(), Output::Stdout));
    }

    #[test]
    fn delimiters_follow_extensions_unless_overridden() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b';')), b';');
        assert_eq!(resolve_output_delimiter(None, None, b';'), b';');
        assert_eq!(resolve_output_delimiter(Some(Path::new("o.tsv")), None, b','), b'\t');
    }

    #[test]
    fn csv_rows_map_empty_cells_to_none() {
        let input = "amount, date \n\"1.000,50\",\n,2020-01-01\n";
        let reader = open_csv_reader(input.as_bytes(), b',');
        let rows = CsvRows::new(reader, UTF_8).unwrap();
        assert_eq!(rows.headers(), ["amount".to_string(), "date".to_string()]);
        let rows = rows.collect::<Result<Vec<_>>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["amount"], Some(Value::from("1.000,50")));
        assert_eq!(rows[0]["date"], None);
        assert_eq!(rows[1]["amount"], None);
    }

    #[test]
    fn csv_rows_decode_legacy_encodings() {
        let encoding = resolve_encoding(Some("windows-1252")).unwrap();
        let bytes = b"name\nJos\xe9\n".to_vec();
        let reader = open_csv_reader(bytes.as_slice(), b',');
        let rows = CsvRows::new(reader, encoding)
            .unwrap()
            .collect::<Result<Vec<_>>>()
            .unwrap();
        assert_eq!(rows[0]["name"], Some(Value::from("José")));
        assert!(resolve_encoding(Some("no-such-encoding")).is_err());
    }

    #[test]
    fn render_row_follows_header_order() {
        let mut row = Row::new();
        row.insert("b".to_string(), None);
        row.insert("a".to_string(), Some(Value::from("x")));
        let headers = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert_eq!(render_row(&headers, &row), vec!["x", "", ""]);
    }

    #[test]
    fn transcoding_writer_encodes_split_characters() {
        let mut out = Vec::new();
        {
            let mut writer = TranscodingWriter::new(&mut out, encoding_rs::WINDOWS_1252);
            let bytes = "café".as_bytes();
            writer.write_all(&bytes[..4]).unwrap();
            writer.write_all(&bytes[4..]).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(out, b"caf\xe9");
    }
}

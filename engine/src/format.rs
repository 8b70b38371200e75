//! Format detection over a streaming input. [`detect`] classifies a stream as
//! one of the four supported shapes without materializing it.

use std::io::{BufRead, BufReader, Read};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display as StrumDisplay, EnumString};
use tracing::debug;

use crate::{Error, MorphResult};

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

/// The shape of a loaded file. Determined once at load; immutable thereafter.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq, EnumString, StrumDisplay, AsRefStr,
)]
pub enum DataFormat {
    Csv,
    JsonLines,
    JsonArray,
    JsonObject,
}

/// Classify the stream produced by `open`.
///
/// `open` is a factory rather than a stream because CSV validation re-opens
/// the input after the initial peek. The JSON path never re-opens: the
/// streaming deserializer resumes across buffer boundaries, so arbitrarily
/// large single objects classify without being held in memory.
pub fn detect<R, F>(mut open: F) -> MorphResult<DataFormat>
where
    R: Read,
    F: FnMut() -> MorphResult<R>,
{
    let mut reader = BufReader::new(open()?);
    let format = match skip_preamble(&mut reader)? {
        b'[' => DataFormat::JsonArray,
        b'{' => classify_json(reader)?,
        _ => validate_csv(open()?)?,
    };
    debug!(?format, "detected input format");
    Ok(format)
}

/// Skip a UTF-8 BOM and any leading ASCII whitespace, returning the first
/// interesting byte without consuming it.
fn skip_preamble<R: Read>(reader: &mut BufReader<R>) -> MorphResult<u8> {
    let mut seen_any = false;
    let mut bom_checked = false;
    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            return Err(if seen_any {
                Error::WhitespaceOnly
            } else {
                Error::EmptyFile
            });
        }
        if !bom_checked {
            bom_checked = true;
            if buf.len() >= UTF8_BOM.len() && buf[..UTF8_BOM.len()] == UTF8_BOM {
                seen_any = true;
                reader.consume(UTF8_BOM.len());
                continue;
            }
        }
        seen_any = true;
        match buf
            .iter()
            .position(|b| !matches!(b, b' ' | b'\t' | b'\r' | b'\n'))
        {
            Some(i) => {
                let first = buf[i];
                reader.consume(i);
                return Ok(first);
            }
            None => {
                let n = buf.len();
                reader.consume(n);
            }
        }
    }
}

/// The stream starts with `{`. Decide between a single JSON object and JSON
/// Lines by reading whole documents: if the stream holds exactly one, it is an
/// object; anything after a complete first document means the next root-level
/// value tripped the single-document read, which is the JSON Lines signature.
fn classify_json<R: BufRead>(reader: R) -> MorphResult<DataFormat> {
    // IgnoredAny walks nested objects and arrays without building them
    let mut stream = serde_json::Deserializer::from_reader(reader).into_iter::<serde::de::IgnoredAny>();
    match stream.next() {
        None => Err(Error::invalid_json("unexpected end of input")),
        Some(Err(e)) => Err(Error::invalid_json(e)),
        Some(Ok(_)) => match stream.next() {
            None => Ok(DataFormat::JsonObject),
            Some(_) => Ok(DataFormat::JsonLines),
        },
    }
}

/// The stream is a CSV candidate. Re-parse the header with a strict comma
/// reader and require at least two columns.
fn validate_csv<R: Read>(stream: R) -> MorphResult<DataFormat> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(stream);
    match reader.headers() {
        Ok(headers) if headers.len() >= 2 => Ok(DataFormat::Csv),
        _ => Err(Error::CsvTooFewColumns),
    }
}

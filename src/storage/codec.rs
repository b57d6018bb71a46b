//! Line format shared by the activity log and the host registry
//!
//! One record per line, fields joined by [`DELIMITER`], no escaping. Decoding
//! degrades single bad fields instead of rejecting the line: an empty or
//! malformed timestamp becomes `None`, a malformed boolean becomes `false` and a
//! malformed integer becomes `0`. Lines with the wrong field count and header
//! lines decode to `None`.

use std::io::{self, BufRead};

use tracing::trace;

use super::schema::{Observation, TrackedHost, epoch, format_timestamp, parse_timestamp};

pub const DELIMITER: char = ';';

pub const OBSERVATION_HEADER: &str =
    "recordCreationTime;dataRetrievalTime;online;server;playerCount";

pub const TRACKED_HOST_HEADER: &str = "server;lastFetchTime";

const OBSERVATION_FIELDS: usize = 5;
const TRACKED_HOST_FIELDS: usize = 2;

/// A record kind with a line representation
pub trait LineRecord: Sized {
    const HEADER: &'static str;

    fn encode(&self) -> String;

    fn decode(line: &str) -> Option<Self>;
}

/// Lines of `reader` in order, without the `\n` terminator
///
/// Lines that are not valid UTF-8 are skipped like any other malformed line,
/// so one bad byte never fails a whole read.
pub fn read_lines<R: BufRead>(mut reader: R) -> impl Iterator<Item = io::Result<String>> {
    let mut buf = Vec::new();
    std::iter::from_fn(move || {
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => return None,
                Ok(_) => {
                    let bytes = buf.strip_suffix(b"\n").unwrap_or(&buf[..]);
                    match std::str::from_utf8(bytes) {
                        Ok(line) => return Some(Ok(line.to_string())),
                        Err(_) => trace!("skipping line that is not valid UTF-8"),
                    }
                }
                Err(e) => return Some(Err(e)),
            }
        }
    })
}

fn split_fields<'a>(line: &'a str, header: &str, expected: usize) -> Option<Vec<&'a str>> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line == header {
        return None;
    }

    let fields: Vec<&str> = line.split(DELIMITER).collect();
    (fields.len() == expected).then_some(fields)
}

fn encode_timestamp(value: Option<&chrono::NaiveDateTime>) -> String {
    value.map(format_timestamp).unwrap_or_default()
}

fn decode_bool(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("true")
}

impl LineRecord for Observation {
    const HEADER: &'static str = OBSERVATION_HEADER;

    fn encode(&self) -> String {
        [
            encode_timestamp(self.record_creation_time.as_ref()),
            encode_timestamp(self.data_retrieval_time.as_ref()),
            self.online.to_string(),
            self.host.clone(),
            self.player_count.to_string(),
        ]
        .join(&DELIMITER.to_string())
    }

    fn decode(line: &str) -> Option<Self> {
        let fields = split_fields(line, Self::HEADER, OBSERVATION_FIELDS)?;

        let host = fields[3].trim();
        if host.is_empty() {
            return None;
        }

        Some(Observation {
            record_creation_time: parse_timestamp(fields[0]),
            data_retrieval_time: parse_timestamp(fields[1]),
            online: decode_bool(fields[2]),
            host: host.to_string(),
            player_count: fields[4].trim().parse().unwrap_or(0),
        })
    }
}

impl LineRecord for TrackedHost {
    const HEADER: &'static str = TRACKED_HOST_HEADER;

    fn encode(&self) -> String {
        format!(
            "{}{DELIMITER}{}",
            self.host,
            format_timestamp(&self.last_fetch_time)
        )
    }

    fn decode(line: &str) -> Option<Self> {
        let fields = split_fields(line, Self::HEADER, TRACKED_HOST_FIELDS)?;

        let host = fields[0].trim();
        if host.is_empty() {
            return None;
        }

        Some(TrackedHost {
            host: host.to_string(),
            last_fetch_time: parse_timestamp(fields[1]).unwrap_or_else(epoch),
        })
    }
}

use chrono::{DateTime, Duration, TimeZone, Utc};
use thiserror::Error;
use tracing::{debug, warn};

/// Fixed width of a two-line element set line, checksum column included.
pub const TLE_LINE_LEN: usize = 69;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ElementSetError {
    #[error("line {line} is {len} columns wide, expected {TLE_LINE_LEN}")]
    LineLength { line: u8, len: usize },
    #[error("line {line} contains non-ASCII characters")]
    NonAscii { line: u8 },
    #[error("line {line} does not start with \"{line} \"")]
    LineMarker { line: u8 },
    #[error("line {line} checksum mismatch: column 69 says {expected}, computed {computed}")]
    Checksum { line: u8, expected: u8, computed: u8 },
    #[error("catalog numbers differ between lines ({line1:?} vs {line2:?})")]
    CatalogMismatch { line1: String, line2: String },
    #[error("unparseable element fields: {0}")]
    Fields(String),
    #[error("propagation diverged at {minutes:.3} min from epoch: {reason}")]
    Divergence { minutes: f64, reason: String },
}

/// One catalog entry as published by the element-set feed.
///
/// `index` is the record's position in its catalog snapshot and is the
/// identity every downstream result refers to; names are not unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrbitalElementRecord {
    pub index: usize,
    pub name: String,
    pub line1: String,
    pub line2: String,
}

impl OrbitalElementRecord {
    pub fn new(index: usize, name: impl Into<String>, line1: impl Into<String>, line2: impl Into<String>) -> Self {
        Self {
            index,
            name: name.into(),
            line1: line1.into(),
            line2: line2.into(),
        }
    }

    /// Catalog number from columns 3-7 of line 1, without full validation.
    pub fn catalog_number(&self) -> Option<u64> {
        self.line1.get(2..7)?.trim().parse().ok()
    }

    /// Element-set epoch from columns 19-32 of line 1 (two-digit year,
    /// fractional day of year), without full validation.
    pub fn epoch(&self) -> Option<DateTime<Utc>> {
        let yy: i32 = self.line1.get(18..20)?.trim().parse().ok()?;
        let day: f64 = self.line1.get(20..32)?.trim().parse().ok()?;
        if !(1.0..367.0).contains(&day) {
            return None;
        }
        let year = if yy < 57 { 2000 + yy } else { 1900 + yy };
        let jan1 = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
        let offset = Duration::try_milliseconds(((day - 1.0) * 86_400_000.0).round() as i64)?;
        jan1.checked_add_signed(offset)
    }

    /// Validates structure and hands the numeric fields to `sgp4`.
    pub fn parse_elements(&self) -> Result<sgp4::Elements, ElementSetError> {
        validate_lines(&self.line1, &self.line2)?;
        sgp4::Elements::from_tle(
            Some(self.name.clone()),
            self.line1.trim_end().as_bytes(),
            self.line2.trim_end().as_bytes(),
        )
        .map_err(|e| ElementSetError::Fields(e.to_string()))
    }
}

/// Ordered, immutable set of records owned by one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Catalog {
    records: Vec<OrbitalElementRecord>,
}

impl Catalog {
    /// Builds a catalog from `(name, line1, line2)` triples, assigning indices in order.
    pub fn from_entries<I, N, L1, L2>(entries: I) -> Self
    where
        I: IntoIterator<Item = (N, L1, L2)>,
        N: Into<String>,
        L1: Into<String>,
        L2: Into<String>,
    {
        let records = entries
            .into_iter()
            .enumerate()
            .map(|(index, (name, l1, l2))| OrbitalElementRecord::new(index, name, l1, l2))
            .collect();
        Self { records }
    }

    /// Parses a 2-line or 3-line feed into a catalog.
    pub fn from_tle_text(text: &str) -> Self {
        Self::from_entries(parse_tle_text(text))
    }

    pub fn records(&self) -> &[OrbitalElementRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Keeps the first `max` records; indices are unchanged.
    pub fn truncated(mut self, max: Option<usize>) -> Self {
        if let Some(max) = max {
            self.records.truncate(max);
        }
        self
    }
}

/// Modulo-10 checksum over columns 1-68: digits count their value, `-` counts 1.
pub fn checksum(line: &str) -> u8 {
    let sum: u32 = line
        .bytes()
        .take(TLE_LINE_LEN - 1)
        .map(|b| match b {
            b'0'..=b'9' => u32::from(b - b'0'),
            b'-' => 1,
            _ => 0,
        })
        .sum();
    (sum % 10) as u8
}

fn validate_line(raw: &str, line: u8) -> Result<&str, ElementSetError> {
    let text = raw.trim_end();
    if !text.is_ascii() {
        return Err(ElementSetError::NonAscii { line });
    }
    if text.len() != TLE_LINE_LEN {
        return Err(ElementSetError::LineLength { line, len: text.len() });
    }
    let bytes = text.as_bytes();
    if bytes[0] != b'0' + line || bytes[1] != b' ' {
        return Err(ElementSetError::LineMarker { line });
    }
    let last = bytes[TLE_LINE_LEN - 1];
    if !last.is_ascii_digit() {
        return Err(ElementSetError::Fields(format!(
            "line {line} checksum column is {:?}",
            last as char
        )));
    }
    let expected = last - b'0';
    let computed = checksum(text);
    if expected != computed {
        return Err(ElementSetError::Checksum { line, expected, computed });
    }
    Ok(text)
}

/// Structural validation of a two-line element set.
pub fn validate_lines(line1: &str, line2: &str) -> Result<(), ElementSetError> {
    let line1 = validate_line(line1, 1)?;
    let line2 = validate_line(line2, 2)?;
    // both lines are 69 ASCII columns here
    let cat1 = line1[2..7].trim();
    let cat2 = line2[2..7].trim();
    if cat1 != cat2 {
        return Err(ElementSetError::CatalogMismatch {
            line1: cat1.to_string(),
            line2: cat2.to_string(),
        });
    }
    Ok(())
}

/// Splits a TLE feed into `(name, line1, line2)` triples.
/// Supports both 2-line and 3-line (with name) formats; unnamed entries are
/// named after their catalog number. Lines are not validated here.
pub fn parse_tle_text(text: &str) -> Vec<(String, String, String)> {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .collect();

    let mut entries = Vec::new();
    let mut i = 0usize;
    while i < lines.len() {
        let line = lines[i];
        if !line.starts_with("1 ") {
            i += 1;
            continue;
        }
        if i + 1 >= lines.len() || !lines[i + 1].starts_with("2 ") {
            warn!(line = i + 1, "Skipping invalid TLE pair: missing line 2");
            i += 1;
            continue;
        }

        // Optional name on the previous line if it isn't itself an element line
        let name = match i.checked_sub(1).map(|p| lines[p]) {
            Some(prev) if !(prev.starts_with("1 ") || prev.starts_with("2 ")) => prev.trim().to_string(),
            _ => line.get(2..7).unwrap_or("").trim().to_string(),
        };

        debug!("Collected TLE at lines {}, {}", i + 1, i + 2);
        entries.push((name, line.to_string(), lines[i + 1].to_string()));
        i += 2;
    }

    entries
}

#[cfg(test)]
pub(crate) mod fixtures {
    pub const ISS_NAME: &str = "ISS (ZARYA)";
    pub const ISS_L1: &str = "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927";
    pub const ISS_L2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537";
    pub const LEO_NAME: &str = "TEST LEO";
    pub const LEO_L1: &str = "1 20580U 90037B   08264.51782528  .00000500  00000-0  20000-4 0  9993";
    pub const LEO_L2: &str = "2 20580  28.4700 100.0000 0002500  80.0000 280.0000 15.09000000123454";
    /// Structurally valid ISS line 2 with zero mean motion; SGP4 cannot
    /// build a model from it.
    pub const STALLED_L2: &str = "2 25544  51.6416 247.4627 0006703 130.5360 325.0288  0.00000000563531";
    /// ISS line 1 with the checksum digit altered.
    pub const ISS_L1_BAD_CHECKSUM: &str =
        "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2928";
}

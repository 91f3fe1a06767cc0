// Copyright @yucwang 2026

//! Plain-text radiosity cache files.
//!
//! One record per line, selected by the first character:
//!
//! ```text
//! B<brightness>
//! P
//! C<depth> <x> <y> <z> <normal> <r> <g> <b> <harmonic mean> <nearest> <to nearest> [<quality> <brilliance>]
//! ```
//!
//! Depth is 1-based. Unit vectors are packed as three hex bytes, byte `b`
//! standing for `b / 254 * 2 - 1`. Lines with any other leading character are
//! ignored.

use std::fmt;
use std::io::{self, BufRead, Write};

use crate::math::constants::{Float, Vector3f};
use crate::math::spectrum::RGBSpectrum;

use super::block::{SampleBlock, PASS_LOADED};

const PACK_SCALE: Float = 254.0;

#[derive(Debug)]
pub enum CacheFileError {
    Io(io::Error),
    Parse(String),
}

impl From<io::Error> for CacheFileError {
    fn from(err: io::Error) -> Self {
        CacheFileError::Io(err)
    }
}

impl fmt::Display for CacheFileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheFileError::Io(e) => write!(f, "radiosity cache I/O error: {}", e),
            CacheFileError::Parse(msg) => write!(f, "radiosity cache parse error: {}", msg),
        }
    }
}

impl std::error::Error for CacheFileError {}

#[derive(Debug, Clone, PartialEq)]
pub enum CacheRecord {
    Brightness(Float),
    PreviewDone,
    Block(SampleBlock),
}

fn pack_component(v: Float) -> u8 {
    ((v + 1.0) * 0.5 * PACK_SCALE + 0.499999).floor().clamp(0.0, 255.0) as u8
}

fn unpack_component(b: u8) -> Float {
    (b as Float / PACK_SCALE) * 2.0 - 1.0
}

pub fn pack_unit_vector(v: &Vector3f) -> String {
    format!("{:02x}{:02x}{:02x}", pack_component(v.x), pack_component(v.y), pack_component(v.z))
}

/// Inverse of [`pack_unit_vector`]; the result is re-normalized unless it
/// is zero.
pub fn unpack_unit_vector(text: &str) -> Option<Vector3f> {
    if text.len() != 6 || !text.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(&text[2 * i..2 * i + 2], 16).ok();
    let v = Vector3f::new(unpack_component(byte(0)?),
                          unpack_component(byte(1)?),
                          unpack_component(byte(2)?));
    let len = v.norm();
    if len > 0.0 {
        Some(v / len)
    } else {
        Some(v)
    }
}

pub fn write_block<W: Write + ?Sized>(out: &mut W, block: &SampleBlock) -> io::Result<()> {
    writeln!(out, "C{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
             block.bounce_depth as u32 + 1,
             block.point.x, block.point.y, block.point.z,
             pack_unit_vector(&block.normal),
             block.illuminance.r(), block.illuminance.g(), block.illuminance.b(),
             block.harmonic_mean_distance,
             block.nearest_distance,
             pack_unit_vector(&block.to_nearest_surface),
             block.quality,
             block.brilliance)
}

/// Parses one line. Returns `None` for lines that carry no record, including
/// malformed sample records.
pub fn parse_line(line: &str) -> Option<CacheRecord> {
    match line.chars().next()? {
        'B' => line[1..].trim().parse::<Float>().ok().map(CacheRecord::Brightness),
        'P' => Some(CacheRecord::PreviewDone),
        'C' => {
            let block = parse_block(&line[1..]);
            if block.is_none() {
                log::debug!("Skipping malformed radiosity cache record: {}", line);
            }
            block.map(CacheRecord::Block)
        }
        _ => None,
    }
}

fn parse_block(fields: &str) -> Option<SampleBlock> {
    let tokens: Vec<&str> = fields.split_whitespace().collect();
    if tokens.len() < 11 {
        return None;
    }
    let float = |i: usize| tokens[i].parse::<Float>().ok();

    let depth = tokens[0].parse::<u32>().ok()?;
    if depth == 0 || depth > u8::MAX as u32 {
        return None;
    }

    let (quality, brilliance) = if tokens.len() >= 13 {
        (float(11)?, float(12)?)
    } else {
        (1.0, 1.0)
    };

    Some(SampleBlock {
        point: Vector3f::new(float(1)?, float(2)?, float(3)?),
        normal: unpack_unit_vector(tokens[4])?,
        brilliance,
        to_nearest_surface: unpack_unit_vector(tokens[10])?,
        illuminance: RGBSpectrum::new(float(5)?, float(6)?, float(7)?),
        harmonic_mean_distance: float(8)?,
        nearest_distance: float(9)?,
        quality,
        bounce_depth: (depth - 1) as u8,
        pass: PASS_LOADED,
        tile_id: 0,
    })
}

/// Reads every record from `reader`.
/// Lines that are not valid UTF-8 are skipped like any other junk line.
pub fn read_records<R: BufRead>(mut reader: R) -> Result<Vec<CacheRecord>, CacheFileError> {
    let mut records = Vec::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim_end_matches(&['\n', '\r'][..]),
            Err(_) => {
                log::debug!("Skipping radiosity cache line that is not valid UTF-8.");
                continue;
            }
        };
        if let Some(record) = parse_line(line) {
            records.push(record);
        }
    }
    Ok(records)
}

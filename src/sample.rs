//! Line length estimation for sparse index builds
//!
//! The sparse builder never reads the data region sequentially, so it needs
//! an estimate of how many lines the region holds to size its stride. The
//! estimate is obtained by probing [`SAMPLE_COUNT`] evenly spaced offsets and
//! measuring the first full line following each probe.

use std::io::{BufRead, Seek, SeekFrom};

use log::debug;

use crate::{SAMPLE_COUNT, Result, core::utils::read_line};

/// Estimated shape of the data region of a source file
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LineEstimate {
    /// Mean length of a line in bytes (terminator included)
    pub mean_line_length: f64,

    /// Approximate number of lines in the data region
    pub approx_line_count: f64,

    /// Number of probes that measured a full line
    pub samples: usize,
}

/// Estimates mean line length and line count of `remaining` bytes starting at `start`
///
/// `start` must be the offset of a line start. The reader position is
/// unspecified afterwards. An empty region yields a zero estimate, and a
/// region in which no probe lands before a line start is treated as one line.
pub fn estimate_lines<R: BufRead + Seek>(
    reader: &mut R,
    start: u64,
    remaining: u64,
) -> Result<LineEstimate> {
    if remaining == 0 {
        return Ok(LineEstimate::default());
    }

    let mut buf = Vec::new();
    let mut total = 0u64;
    let mut samples = 0;
    for idx in 0..SAMPLE_COUNT {
        let offset = start + (u128::from(remaining) * idx as u128 / SAMPLE_COUNT as u128) as u64;

        // Stepping back one byte means a probe that lands exactly on a line
        // start keeps that line instead of discarding it.
        if offset > start {
            reader.seek(SeekFrom::Start(offset - 1))?;
            read_line(reader, &mut buf)?;
        } else {
            reader.seek(SeekFrom::Start(start))?;
        }

        let len = read_line(reader, &mut buf)?;
        if len > 0 {
            total += len as u64;
            samples += 1;
        }
    }

    let mean_line_length = if samples == 0 {
        remaining as f64
    } else {
        total as f64 / samples as f64
    };
    let estimate = LineEstimate {
        mean_line_length,
        approx_line_count: remaining as f64 / mean_line_length,
        samples,
    };
    debug!(
        "Estimated {:.1} lines of {:.1} bytes from {} samples",
        estimate.approx_line_count, estimate.mean_line_length, estimate.samples
    );
    Ok(estimate)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn test_uniform_lines() -> Result<()> {
        // 200 lines of exactly 10 bytes
        let data: Vec<u8> = (0..200)
            .flat_map(|i| format!("1\t{i:07}\n").into_bytes())
            .collect();
        let mut reader = Cursor::new(data.clone());
        let estimate = estimate_lines(&mut reader, 0, data.len() as u64)?;
        assert_eq!(estimate.samples, SAMPLE_COUNT);
        assert!((estimate.mean_line_length - 10.0).abs() < f64::EPSILON);
        assert!((estimate.approx_line_count - 200.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn test_skips_header_region() -> Result<()> {
        let header = b"#chrom\tpos\n";
        let mut data = header.to_vec();
        for i in 0..50 {
            data.extend_from_slice(format!("2\t{i:03}\n").as_bytes());
        }
        let start = header.len() as u64;
        let mut reader = Cursor::new(data.clone());
        let estimate = estimate_lines(&mut reader, start, data.len() as u64 - start)?;
        assert!((estimate.mean_line_length - 6.0).abs() < f64::EPSILON);
        Ok(())
    }

    #[test]
    fn test_empty_region() -> Result<()> {
        let mut reader = Cursor::new(b"header\n".to_vec());
        let estimate = estimate_lines(&mut reader, 7, 0)?;
        assert_eq!(estimate, LineEstimate::default());
        Ok(())
    }

    #[test]
    fn test_single_line() -> Result<()> {
        let mut reader = Cursor::new(b"1\t1".to_vec());
        let estimate = estimate_lines(&mut reader, 0, 3)?;
        assert!(estimate.samples > 0);
        assert!((estimate.approx_line_count - 1.0).abs() < f64::EPSILON);
        Ok(())
    }
}

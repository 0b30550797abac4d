// SPDX-FileCopyrightText: 2026 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Sample sources selectable from the `[source]` section.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use dab_core::{DynResult, SampleSource, SourceError};
use num_complex::Complex32;

use crate::config::{SampleFormat, SourceConfig, SourceKind};

impl SampleFormat {
    /// Bytes per complex sample.
    pub fn sample_bytes(self) -> usize {
        match self {
            SampleFormat::Cu8 => 2,
            SampleFormat::Cs16 => 4,
            SampleFormat::Cf32 => 8,
        }
    }

    fn bit_depth(self) -> u32 {
        match self {
            SampleFormat::Cu8 => 8,
            SampleFormat::Cs16 => 16,
            SampleFormat::Cf32 => 32,
        }
    }

    /// Decode one complex sample from `bytes.len() == sample_bytes()`.
    fn decode(self, bytes: &[u8]) -> Complex32 {
        match self {
            SampleFormat::Cu8 => Complex32::new(
                (f32::from(bytes[0]) - 127.5) / 127.5,
                (f32::from(bytes[1]) - 127.5) / 127.5,
            ),
            SampleFormat::Cs16 => Complex32::new(
                f32::from(i16::from_le_bytes([bytes[0], bytes[1]])) / 32768.0,
                f32::from(i16::from_le_bytes([bytes[2], bytes[3]])) / 32768.0,
            ),
            SampleFormat::Cf32 => Complex32::new(
                f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
                f32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
            ),
        }
    }
}

/// Plays back a raw IQ capture recorded at 2.048 MS/s.
pub struct IqFileSource {
    reader: BufReader<File>,
    format: SampleFormat,
    repeat: bool,
    bytes: Vec<u8>,
    /// Bytes of an incomplete sample kept from the last read.
    pending: usize,
}

impl IqFileSource {
    pub fn open(path: &Path, format: SampleFormat, repeat: bool) -> std::io::Result<Self> {
        let file = File::open(path)?;
        tracing::info!(
            "playing {} ({:?}{})",
            path.display(),
            format,
            if repeat { ", repeating" } else { "" }
        );
        Ok(Self {
            reader: BufReader::new(file),
            format,
            repeat,
            bytes: Vec::new(),
            pending: 0,
        })
    }
}

impl SampleSource for IqFileSource {
    fn read_into(&mut self, buf: &mut [Complex32]) -> Result<usize, SourceError> {
        let size = self.format.sample_bytes();
        let want = buf.len() * size;
        if want == 0 {
            return Ok(0);
        }
        if self.bytes.len() < want {
            self.bytes.resize(want, 0);
        }

        let mut filled = self.pending.min(want);
        let mut rewound = false;
        while filled < size {
            let n = self
                .reader
                .read(&mut self.bytes[filled..want])
                .map_err(|e| SourceError::Io(e.to_string()))?;
            if n > 0 {
                filled += n;
                continue;
            }
            if !self.repeat || rewound {
                break;
            }
            // A trailing partial sample is dropped at the wrap.
            filled = 0;
            self.reader
                .rewind()
                .map_err(|e| SourceError::Io(e.to_string()))?;
            rewound = true;
        }
        if filled < size {
            return Err(SourceError::Stopped);
        }

        // Top up without blocking on the wrap again.
        if filled < want {
            let n = self
                .reader
                .read(&mut self.bytes[filled..want])
                .map_err(|e| SourceError::Io(e.to_string()))?;
            filled += n;
        }

        let count = filled / size;
        for (out, chunk) in buf.iter_mut().zip(self.bytes[..count * size].chunks_exact(size)) {
            *out = self.format.decode(chunk);
        }
        self.bytes.copy_within(count * size..filled, 0);
        self.pending = filled - count * size;
        Ok(count)
    }

    fn bit_depth(&self) -> u32 {
        self.format.bit_depth()
    }
}

/// Open the source described by `cfg`.
pub fn open(cfg: &SourceConfig) -> DynResult<Box<dyn SampleSource>> {
    match cfg.kind {
        SourceKind::File => {
            let path = cfg
                .path
                .as_deref()
                .ok_or("[source].path must be set for the file source")?;
            let source = IqFileSource::open(path, cfg.format, cfg.repeat)
                .map_err(|e| format!("Failed to open {}: {}", path.display(), e))?;
            Ok(Box::new(source))
        }
        #[cfg(feature = "soapysdr")]
        SourceKind::Soapysdr => Ok(Box::new(crate::soapy::SoapySource::open(cfg)?)),
        #[cfg(not(feature = "soapysdr"))]
        SourceKind::Soapysdr => {
            Err("dab-server was built without the soapysdr feature".into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn capture(bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(bytes).unwrap();
        f.flush().unwrap();
        f
    }

    fn zero() -> Complex32 {
        Complex32::new(0.0, 0.0)
    }

    #[test]
    fn decodes_unsigned_bytes() {
        let f = capture(&[255, 0, 127, 128]);
        let mut src = IqFileSource::open(f.path(), SampleFormat::Cu8, false).unwrap();
        let mut buf = [zero(); 4];
        assert_eq!(src.read_into(&mut buf), Ok(2));
        assert_eq!(buf[0], Complex32::new(1.0, -1.0));
        assert!(buf[1].re < 0.0 && buf[1].re > -0.01);
        assert!(buf[1].im > 0.0 && buf[1].im < 0.01);
        assert_eq!(src.read_into(&mut buf), Err(SourceError::Stopped));
        assert_eq!(src.bit_depth(), 8);
    }

    #[test]
    fn decodes_signed_and_float_pairs() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&16384i16.to_le_bytes());
        bytes.extend_from_slice(&(-32768i16).to_le_bytes());
        let f = capture(&bytes);
        let mut src = IqFileSource::open(f.path(), SampleFormat::Cs16, false).unwrap();
        let mut buf = [zero(); 1];
        assert_eq!(src.read_into(&mut buf), Ok(1));
        assert_eq!(buf[0], Complex32::new(0.5, -1.0));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0.25f32.to_le_bytes());
        bytes.extend_from_slice(&(-0.75f32).to_le_bytes());
        let f = capture(&bytes);
        let mut src = IqFileSource::open(f.path(), SampleFormat::Cf32, false).unwrap();
        assert_eq!(src.read_into(&mut buf), Ok(1));
        assert_eq!(buf[0], Complex32::new(0.25, -0.75));
    }

    #[test]
    fn partial_trailing_sample_is_ignored() {
        let f = capture(&[200, 200, 10, 10, 99]);
        let mut src = IqFileSource::open(f.path(), SampleFormat::Cu8, false).unwrap();
        let mut buf = [zero(); 8];
        assert_eq!(src.read_into(&mut buf), Ok(2));
        assert_eq!(src.read_into(&mut buf), Err(SourceError::Stopped));
    }

    #[test]
    fn repeat_wraps_around() {
        let f = capture(&[255, 255, 0, 0]);
        let mut src = IqFileSource::open(f.path(), SampleFormat::Cu8, true).unwrap();
        let mut buf = [zero(); 1];
        let mut seen = Vec::new();
        for _ in 0..5 {
            assert_eq!(src.read_into(&mut buf), Ok(1));
            seen.push(buf[0].re > 0.0);
        }
        assert_eq!(seen, vec![true, false, true, false, true]);
    }

    #[test]
    fn empty_capture_stops_even_when_repeating() {
        let f = capture(&[]);
        let mut src = IqFileSource::open(f.path(), SampleFormat::Cs16, true).unwrap();
        let mut buf = [zero(); 16];
        assert_eq!(src.read_into(&mut buf), Err(SourceError::Stopped));
    }

    #[test]
    fn open_reports_missing_path() {
        let cfg = SourceConfig::default();
        assert!(open(&cfg).is_err());

        let f = capture(&[1, 2]);
        let cfg = SourceConfig {
            path: Some(f.path().to_path_buf()),
            ..Default::default()
        };
        let mut src = open(&cfg).unwrap();
        let mut buf = [zero(); 2];
        assert_eq!(src.read_into(&mut buf), Ok(1));
    }
}

//! BLKD: packed binary raster format.
//!
//! Layout (all integers little-endian):
//!
//! | offset | size | field                                  |
//! |--------|------|----------------------------------------|
//! | 0      | 4    | magic `"BLKD"`                         |
//! | 4      | 1    | version (1 or 2)                       |
//! | 5      | 2    | width (u16)                            |
//! | 7      | 2    | height (u16)                           |
//! | 9      | 1    | bytes per pixel (u8, version 2 only)   |
//! | 9/10   | ...  | `width * height * bpp` bytes, row-major |
//!
//! Version 1 implies 2 bytes per pixel and omits the bpp byte.

use crate::error::BlkdError;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Magic bytes at the start of every file.
pub const MAGIC: [u8; 4] = *b"BLKD";

/// Version written by default.
pub const LATEST_VERSION: u8 = 2;

/// Raster dimensions and encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlkdHeader {
    /// Format version (1 or 2)
    pub version: u8,
    /// Width in pixels
    pub width: u16,
    /// Height in pixels
    pub height: u16,
    /// Bytes per pixel
    pub bytes_per_pixel: u8,
}

impl BlkdHeader {
    /// Version 2 header.
    #[must_use]
    pub const fn new(width: u16, height: u16, bytes_per_pixel: u8) -> Self {
        Self {
            version: LATEST_VERSION,
            width,
            height,
            bytes_per_pixel,
        }
    }

    /// Payload length declared by the header.
    #[must_use]
    pub fn data_len(&self) -> usize {
        self.width as usize * self.height as usize * self.bytes_per_pixel as usize
    }

    /// Header length on disk.
    #[must_use]
    pub const fn encoded_len(&self) -> usize {
        if self.version == 1 {
            9
        } else {
            10
        }
    }

    fn validate(&self) -> Result<(), BlkdError> {
        match self.version {
            1 if self.bytes_per_pixel != 2 => {
                Err(BlkdError::Version1BytesPerPixel(self.bytes_per_pixel))
            }
            1 | 2 => Ok(()),
            other => Err(BlkdError::UnsupportedVersion(other)),
        }
    }

    /// Write `header + data[..data_len]`.
    ///
    /// `data` may be longer than the header declares (a reused buffer); only
    /// the declared prefix is written. Nothing is written if validation fails.
    pub fn write_with<W: Write + ?Sized>(&self, out: &mut W, data: &[u8]) -> Result<(), BlkdError> {
        self.validate()?;
        let expected = self.data_len();
        if data.len() < expected {
            return Err(BlkdError::DataTooShort {
                expected,
                actual: data.len(),
            });
        }

        out.write_all(&MAGIC)?;
        out.write_all(&[self.version])?;
        out.write_all(&self.width.to_le_bytes())?;
        out.write_all(&self.height.to_le_bytes())?;
        if self.version == 2 {
            out.write_all(&[self.bytes_per_pixel])?;
        }
        out.write_all(&data[..expected])?;
        out.flush()?;
        Ok(())
    }
}

/// A loaded BLKD raster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blkd {
    /// Header
    pub header: BlkdHeader,
    /// Exactly `header.data_len()` bytes
    pub data: Vec<u8>,
}

impl Blkd {
    /// Build a version 2 raster.
    #[must_use]
    pub fn new(width: u16, height: u16, bytes_per_pixel: u8, data: Vec<u8>) -> Self {
        Self {
            header: BlkdHeader::new(width, height, bytes_per_pixel),
            data,
        }
    }

    /// Save under `version` (1 or 2).
    pub fn save<W: Write + ?Sized>(&self, out: &mut W, version: u8) -> Result<(), BlkdError> {
        let header = BlkdHeader {
            version,
            ..self.header
        };
        header.write_with(out, &self.data)
    }

    /// Save to a file under `version`.
    pub fn save_path<P: AsRef<Path>>(&self, path: P, version: u8) -> Result<(), BlkdError> {
        let mut out = BufWriter::new(File::create(path)?);
        self.save(&mut out, version)
    }

    /// Load and verify a raster.
    ///
    /// The trailing payload must be exactly `width * height * bpp` bytes; a
    /// file is never truncated or padded to fit.
    pub fn load<R: Read + ?Sized>(input: &mut R) -> Result<Self, BlkdError> {
        let mut fixed = [0u8; 9];
        input.read_exact(&mut fixed)?;

        let magic = [fixed[0], fixed[1], fixed[2], fixed[3]];
        if magic != MAGIC {
            return Err(BlkdError::BadMagic(magic));
        }

        let version = fixed[4];
        let width = u16::from_le_bytes([fixed[5], fixed[6]]);
        let height = u16::from_le_bytes([fixed[7], fixed[8]]);
        let bytes_per_pixel = match version {
            1 => 2,
            2 => {
                let mut bpp = [0u8; 1];
                input.read_exact(&mut bpp)?;
                bpp[0]
            }
            other => return Err(BlkdError::UnsupportedVersion(other)),
        };

        let header = BlkdHeader {
            version,
            width,
            height,
            bytes_per_pixel,
        };

        // Sized by what the file holds, not by what the header claims
        let expected = header.data_len();
        let mut data = Vec::new();
        input
            .take(expected as u64 + 1)
            .read_to_end(&mut data)?;
        if data.len() != expected {
            return Err(BlkdError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self { header, data })
    }

    /// Load from a file.
    pub fn load_path<P: AsRef<Path>>(path: P) -> Result<Self, BlkdError> {
        let mut input = BufReader::new(File::open(path)?);
        Self::load(&mut input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn sample(width: u16, height: u16, bpp: u8) -> Blkd {
        let len = width as usize * height as usize * bpp as usize;
        Blkd::new(width, height, bpp, (0..len).map(|i| (i * 7) as u8).collect())
    }

    #[test]
    fn test_round_trip_v2() {
        let original = sample(5, 3, 16);
        let mut bytes = Vec::new();
        original.save(&mut bytes, 2).unwrap();
        assert_eq!(bytes.len(), 10 + 5 * 3 * 16);

        let loaded = Blkd::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_round_trip_v1() {
        let original = sample(4, 4, 2);
        let mut bytes = Vec::new();
        original.save(&mut bytes, 1).unwrap();
        assert_eq!(bytes.len(), 9 + 4 * 4 * 2);

        let loaded = Blkd::load(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(loaded.header.version, 1);
        assert_eq!(loaded.header.bytes_per_pixel, 2);
        assert_eq!(loaded.data, original.data);
    }

    #[test]
    fn test_exact_header_bytes() {
        let mut bytes = Vec::new();
        Blkd::new(0x0201, 0x0003, 16, vec![0u8; 0x0201 * 3 * 16])
            .save(&mut bytes, 2)
            .unwrap();
        assert_eq!(&bytes[..10], &[b'B', b'L', b'K', b'D', 2, 0x01, 0x02, 0x03, 0x00, 16]);
    }

    #[test]
    fn test_save_writes_only_declared_prefix() {
        let mut blkd = sample(2, 2, 2);
        blkd.data.extend_from_slice(&[0xFF; 32]);
        let mut bytes = Vec::new();
        blkd.save(&mut bytes, 2).unwrap();
        assert_eq!(bytes.len(), 10 + 8);
    }

    #[test]
    fn test_save_rejects_short_data() {
        let mut blkd = sample(2, 2, 2);
        blkd.data.truncate(3);
        let mut bytes = Vec::new();
        assert!(matches!(
            blkd.save(&mut bytes, 2),
            Err(BlkdError::DataTooShort {
                expected: 8,
                actual: 3
            })
        ));
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_save_v1_requires_two_bytes_per_pixel() {
        let blkd = sample(2, 2, 16);
        assert!(matches!(
            blkd.save(&mut Vec::new(), 1),
            Err(BlkdError::Version1BytesPerPixel(16))
        ));
        assert!(matches!(
            blkd.save(&mut Vec::new(), 3),
            Err(BlkdError::UnsupportedVersion(3))
        ));
    }

    #[test]
    fn test_load_rejects_length_mismatch() {
        let mut bytes = Vec::new();
        sample(3, 3, 2).save(&mut bytes, 2).unwrap();

        let mut long = bytes.clone();
        long.push(0);
        assert!(matches!(
            Blkd::load(&mut Cursor::new(long)),
            Err(BlkdError::LengthMismatch {
                expected: 18,
                actual: 19
            })
        ));

        bytes.pop();
        assert!(matches!(
            Blkd::load(&mut Cursor::new(bytes)),
            Err(BlkdError::LengthMismatch {
                expected: 18,
                actual: 17
            })
        ));
    }

    #[test]
    fn test_load_rejects_unsupported_version_and_magic() {
        let bytes = [b'B', b'L', b'K', b'D', 7, 1, 0, 1, 0, 2, 0, 0];
        assert!(matches!(
            Blkd::load(&mut Cursor::new(bytes)),
            Err(BlkdError::UnsupportedVersion(7))
        ));

        let bytes = [b'P', b'N', b'G', b' ', 2, 1, 0, 1, 0, 2, 0, 0];
        assert!(matches!(
            Blkd::load(&mut Cursor::new(bytes)),
            Err(BlkdError::BadMagic(_))
        ));
    }

    #[test]
    fn test_path_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mapping.blkd");
        let original = sample(8, 2, 16);
        original.save_path(&path, LATEST_VERSION).unwrap();
        assert_eq!(Blkd::load_path(&path).unwrap(), original);
    }

    #[test]
    fn test_oversized_header_is_length_mismatch() {
        let bytes = [b'B', b'L', b'K', b'D', 2, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 1, 2, 3, 4];
        let err = Blkd::load(&mut Cursor::new(bytes)).unwrap_err();
        assert!(matches!(
            err,
            BlkdError::LengthMismatch {
                expected: 1_095_183_237_375,
                actual: 4
            }
        ));
    }
}

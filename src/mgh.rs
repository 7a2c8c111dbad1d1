//
// mgh.rs
// Seg-Relabel-rs
//
// Reads and writes FreeSurfer MGH/MGZ label volumes while keeping every header and trailer byte intact.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use byteordered::ByteOrdered;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::{Array3, ShapeBuilder};

use crate::labels::Label;
use crate::volume::VolumeError;

pub const MGH_VERSION: i32 = 1;

/// Byte offset of the voxel data; the header is zero padded up to here.
pub const MGH_DATA_OFFSET: usize = 284;

/// Bytes of the header actually carrying fields.
const MGH_FIELDS_LEN: usize = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MghDataType {
    UChar,
    Int,
    Float,
    Short,
}

impl MghDataType {
    pub fn code(self) -> i32 {
        match self {
            MghDataType::UChar => 0,
            MghDataType::Int => 1,
            MghDataType::Float => 3,
            MghDataType::Short => 4,
        }
    }

    pub fn from_code(code: i32) -> Result<Self, VolumeError> {
        match code {
            0 => Ok(MghDataType::UChar),
            1 => Ok(MghDataType::Int),
            3 => Ok(MghDataType::Float),
            4 => Ok(MghDataType::Short),
            other => Err(VolumeError::UnsupportedMghType(other)),
        }
    }

    fn byte_len(self) -> usize {
        match self {
            MghDataType::UChar => 1,
            MghDataType::Short => 2,
            MghDataType::Int | MghDataType::Float => 4,
        }
    }
}

/// MGH header, including the bytes around the voxel data that must survive a rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct MghHeader {
    /// Width, height, depth and number of frames.
    pub dims: [i32; 4],
    pub dtype: MghDataType,
    pub dof: i32,
    pub ras_good: i16,
    pub spacing: [f32; 3],
    /// Direction cosines, column by column: x_r x_a x_s y_r y_a y_s z_r z_a z_s.
    pub mdc: [f32; 9],
    pub c_ras: [f32; 3],
    /// Padding between the header fields and the voxel data.
    pub reserved: Vec<u8>,
    /// Optional scan parameters and tags following the voxel data.
    pub trailer: Vec<u8>,
}

impl MghHeader {
    pub fn shape(&self) -> (usize, usize, usize) {
        (
            self.dims[0].max(0) as usize,
            self.dims[1].max(0) as usize,
            self.dims[2].max(0) as usize,
        )
    }

    /// Voxel-to-RAS transform: `Mdc * diag(spacing)` with the volume center pinned at `c_ras`.
    pub fn vox2ras(&self) -> [[f32; 4]; 4] {
        let mut affine = [[0.0; 4]; 4];
        for row in 0..3 {
            for col in 0..3 {
                affine[row][col] = self.mdc[col * 3 + row] * self.spacing[col];
            }
        }
        let center = [
            self.dims[0] as f32 / 2.0,
            self.dims[1] as f32 / 2.0,
            self.dims[2] as f32 / 2.0,
        ];
        for row in 0..3 {
            let offset: f32 = (0..3).map(|col| affine[row][col] * center[col]).sum();
            affine[row][3] = self.c_ras[row] - offset;
        }
        affine[3][3] = 1.0;
        affine
    }

    fn read_fields(bytes: &[u8]) -> Result<Self, VolumeError> {
        let mut input = ByteOrdered::be(Cursor::new(bytes));

        let version = input.read_i32()?;
        if version != MGH_VERSION {
            return Err(VolumeError::InvalidMghVersion(version));
        }

        let mut dims = [0; 4];
        for d in dims.iter_mut() {
            *d = input.read_i32()?;
        }
        let dtype = MghDataType::from_code(input.read_i32()?)?;
        let dof = input.read_i32()?;
        let ras_good = input.read_i16()?;

        // The geometry block is always present on disk, even when flagged unreliable.
        let mut spacing = [0.0; 3];
        for v in spacing.iter_mut() {
            *v = input.read_f32()?;
        }
        let mut mdc = [0.0; 9];
        for v in mdc.iter_mut() {
            *v = input.read_f32()?;
        }
        let mut c_ras = [0.0; 3];
        for v in c_ras.iter_mut() {
            *v = input.read_f32()?;
        }

        Ok(MghHeader {
            dims,
            dtype,
            dof,
            ras_good,
            spacing,
            mdc,
            c_ras,
            reserved: bytes[MGH_FIELDS_LEN..MGH_DATA_OFFSET].to_vec(),
            trailer: Vec::new(),
        })
    }

    fn write_fields<W: Write>(&self, out: W) -> Result<(), VolumeError> {
        let mut out = ByteOrdered::be(out);
        out.write_i32(MGH_VERSION)?;
        for &d in &self.dims {
            out.write_i32(d)?;
        }
        out.write_i32(self.dtype.code())?;
        out.write_i32(self.dof)?;
        out.write_i16(self.ras_good)?;
        for &v in self.spacing.iter().chain(&self.mdc).chain(&self.c_ras) {
            out.write_f32(v)?;
        }
        let mut out = out.into_inner();
        let mut reserved = self.reserved.clone();
        reserved.resize(MGH_DATA_OFFSET - MGH_FIELDS_LEN, 0);
        out.write_all(&reserved)?;
        Ok(())
    }
}

pub fn is_gz_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map_or(false, |ext| ext.eq_ignore_ascii_case("mgz") || ext.eq_ignore_ascii_case("gz"))
}

/// Read an `.mgh` or `.mgz` label volume. Float voxels are truncated toward zero.
pub fn read_mgh(path: &Path) -> Result<(MghHeader, Array3<Label>), VolumeError> {
    let file = BufReader::new(File::open(path)?);
    let mut bytes = Vec::new();
    if is_gz_path(path) {
        GzDecoder::new(file).read_to_end(&mut bytes)?;
    } else {
        let mut file = file;
        file.read_to_end(&mut bytes)?;
    }
    decode_mgh(&bytes)
}

pub fn decode_mgh(bytes: &[u8]) -> Result<(MghHeader, Array3<Label>), VolumeError> {
    if bytes.len() < MGH_DATA_OFFSET {
        return Err(VolumeError::Truncated {
            expected: MGH_DATA_OFFSET,
            found: bytes.len(),
        });
    }
    let mut header = MghHeader::read_fields(&bytes[..MGH_DATA_OFFSET])?;
    if header.dims[3] > 1 {
        return Err(VolumeError::NotAVolume(
            header.dims.iter().map(|&d| d.max(0) as usize).collect(),
        ));
    }

    let (nx, ny, nz) = header.shape();
    let count = nx
        .checked_mul(ny)
        .and_then(|n| n.checked_mul(nz))
        .ok_or_else(|| VolumeError::NotAVolume(vec![nx, ny, nz]))?;
    let data_end = count
        .checked_mul(header.dtype.byte_len())
        .and_then(|n| n.checked_add(MGH_DATA_OFFSET))
        .ok_or_else(|| VolumeError::NotAVolume(vec![nx, ny, nz]))?;
    if bytes.len() < data_end {
        return Err(VolumeError::Truncated {
            expected: data_end,
            found: bytes.len(),
        });
    }

    let mut input = ByteOrdered::be(Cursor::new(&bytes[MGH_DATA_OFFSET..data_end]));
    let mut values: Vec<Label> = Vec::with_capacity(count);
    for _ in 0..count {
        let value = match header.dtype {
            MghDataType::UChar => Label::from(input.read_u8()?),
            MghDataType::Short => Label::from(input.read_i16()?),
            MghDataType::Int => input.read_i32()?,
            MghDataType::Float => input.read_f32()?.trunc() as Label,
        };
        values.push(value);
    }
    header.trailer = bytes[data_end..].to_vec();

    // MGH stores x fastest.
    let labels = Array3::from_shape_vec((nx, ny, nz).f(), values)
        .map_err(|_| VolumeError::NotAVolume(vec![nx, ny, nz]))?;
    Ok((header, labels))
}

/// Write `labels` as a `SHORT` MGH volume, reusing everything else from `header`.
pub fn write_mgh(path: &Path, header: &MghHeader, labels: &Array3<i16>) -> Result<(), VolumeError> {
    let bytes = encode_mgh(header, labels)?;
    let writer = BufWriter::new(File::create(path)?);
    if is_gz_path(path) {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        encoder.write_all(&bytes)?;
        encoder.finish()?.flush()?;
    } else {
        let mut writer = writer;
        writer.write_all(&bytes)?;
        writer.flush()?;
    }
    Ok(())
}

pub fn encode_mgh(header: &MghHeader, labels: &Array3<i16>) -> Result<Vec<u8>, VolumeError> {
    let (nx, ny, nz) = labels.dim();
    let header = MghHeader {
        dims: [nx as i32, ny as i32, nz as i32, 1],
        dtype: MghDataType::Short,
        ..header.clone()
    };

    let mut bytes = Vec::with_capacity(MGH_DATA_OFFSET + labels.len() * 2 + header.trailer.len());
    header.write_fields(&mut bytes)?;
    {
        let mut out = ByteOrdered::be(&mut bytes);
        // Reversed axes walk x fastest.
        for &value in labels.t().iter() {
            out.write_i16(value)?;
        }
    }
    bytes.extend_from_slice(&header.trailer);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> MghHeader {
        MghHeader {
            dims: [3, 2, 2, 1],
            dtype: MghDataType::Int,
            dof: 0,
            ras_good: 1,
            spacing: [1.0, 1.0, 1.5],
            mdc: [-1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0],
            c_ras: [2.5, -17.0, 18.0],
            reserved: vec![0; MGH_DATA_OFFSET - MGH_FIELDS_LEN],
            trailer: vec![0x40, 0x00, 0x00, 0x00, 0x42, 0x8c],
        }
    }

    #[test]
    fn encode_keeps_geometry_and_trailer() {
        let header = sample_header();
        let labels = Array3::from_shape_fn((3, 2, 2), |(x, y, z)| (x + 10 * y + 100 * z) as i16);

        let bytes = encode_mgh(&header, &labels).expect("encode");
        assert_eq!(bytes.len(), MGH_DATA_OFFSET + 12 * 2 + 6);

        let (decoded, values) = decode_mgh(&bytes).expect("decode");
        assert_eq!(decoded.dtype, MghDataType::Short);
        assert_eq!(decoded.spacing, header.spacing);
        assert_eq!(decoded.mdc, header.mdc);
        assert_eq!(decoded.c_ras, header.c_ras);
        assert_eq!(decoded.trailer, header.trailer);
        assert_eq!(values[(2, 1, 0)], 12);
        assert_eq!(values[(1, 0, 1)], 101);
    }

    #[test]
    fn data_is_column_major() {
        let labels = Array3::from_shape_fn((3, 2, 2), |(x, y, z)| (x + 10 * y + 100 * z) as i16);
        let bytes = encode_mgh(&sample_header(), &labels).expect("encode");
        let first: Vec<i16> = bytes[MGH_DATA_OFFSET..MGH_DATA_OFFSET + 8]
            .chunks(2)
            .map(|c| i16::from_be_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(first, vec![0, 1, 2, 10]);
    }

    #[test]
    fn rejects_unknown_version_and_truncation() {
        let mut bytes = encode_mgh(&sample_header(), &Array3::zeros((3, 2, 2))).expect("encode");
        assert!(matches!(
            decode_mgh(&bytes[..100]),
            Err(VolumeError::Truncated { .. })
        ));
        bytes[3] = 2;
        assert!(matches!(
            decode_mgh(&bytes),
            Err(VolumeError::InvalidMghVersion(2))
        ));
    }

    #[test]
    fn oversized_dimensions_are_errors() {
        let header = MghHeader {
            dims: [i32::MAX, i32::MAX, i32::MAX, 1],
            ..sample_header()
        };
        let mut bytes = Vec::new();
        header.write_fields(&mut bytes).expect("fields");
        assert!(matches!(
            decode_mgh(&bytes),
            Err(VolumeError::NotAVolume(shape)) if shape[0] == i32::MAX as usize
        ));

        let header = MghHeader {
            dims: [i32::MAX, i32::MAX, 1, 1],
            ..sample_header()
        };
        let mut bytes = Vec::new();
        header.write_fields(&mut bytes).expect("fields");
        assert!(matches!(
            decode_mgh(&bytes),
            Err(VolumeError::Truncated { found, .. }) if found == MGH_DATA_OFFSET
        ));
    }

    fn encode_typed(dtype: MghDataType, voxels: &[u8]) -> Vec<u8> {
        let header = MghHeader {
            dims: [2, 1, 1, 1],
            dtype,
            ..sample_header()
        };
        let mut bytes = Vec::new();
        header.write_fields(&mut bytes).expect("fields");
        bytes.extend_from_slice(voxels);
        bytes
    }

    #[test]
    fn decodes_every_stored_type() {
        let (header, labels) = decode_mgh(&encode_typed(MghDataType::UChar, &[17, 251]))
            .expect("uchar");
        assert_eq!(header.dtype, MghDataType::UChar);
        assert_eq!(labels.iter().copied().collect::<Vec<_>>(), vec![17, 251]);

        let ints: Vec<u8> = [1042i32, 2101]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let (_, labels) = decode_mgh(&encode_typed(MghDataType::Int, &ints)).expect("int");
        assert_eq!(labels.iter().copied().collect::<Vec<_>>(), vec![1042, 2101]);

        let floats: Vec<u8> = [1042.7f32, 253.0]
            .iter()
            .flat_map(|v| v.to_be_bytes())
            .collect();
        let (_, labels) = decode_mgh(&encode_typed(MghDataType::Float, &floats)).expect("float");
        assert_eq!(labels.iter().copied().collect::<Vec<_>>(), vec![1042, 253]);

        assert!(matches!(
            decode_mgh(&encode_typed(MghDataType::Int, &ints[..6])),
            Err(VolumeError::Truncated { expected, .. }) if expected == MGH_DATA_OFFSET + 8
        ));
    }

    #[test]
    fn vox2ras_centers_the_volume() {
        let header = MghHeader {
            dims: [256, 256, 256, 1],
            spacing: [1.0, 1.0, 1.0],
            mdc: [-1.0, 0.0, 0.0, 0.0, 0.0, -1.0, 0.0, 1.0, 0.0],
            c_ras: [0.0, 0.0, 0.0],
            ..sample_header()
        };
        let affine = header.vox2ras();
        assert_eq!(affine[0], [-1.0, 0.0, 0.0, 128.0]);
        assert_eq!(affine[1], [0.0, 0.0, 1.0, -128.0]);
        assert_eq!(affine[2], [0.0, -1.0, 0.0, 128.0]);
        assert_eq!(affine[3], [0.0, 0.0, 0.0, 1.0]);
    }
}

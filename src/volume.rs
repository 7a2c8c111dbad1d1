//
// volume.rs
// Seg-Relabel-rs
//
// Opens and saves label volumes in NIfTI or MGH form, keeping the source header so geometry survives a rewrite.
//
// Thales Matheus Mendonça Santos - November 2025

use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::{Array3, ArrayD, Axis, Ix3};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};
use thiserror::Error;
use tracing::info;

use crate::labels::Label;
use crate::mgh::{self, MghHeader};

#[derive(Debug, Error)]
pub enum VolumeError {
    #[error("unsupported volume format: {0:?} (expected .nii, .nii.gz, .mgh or .mgz)")]
    UnsupportedFormat(PathBuf),
    #[error("cannot write a {source_format} header to {path:?}")]
    FormatMismatch {
        source_format: &'static str,
        path: PathBuf,
    },
    #[error("expected a 3D label volume, found shape {0:?}")]
    NotAVolume(Vec<usize>),
    #[error("invalid MGH version code {0}")]
    InvalidMghVersion(i32),
    #[error("unsupported MGH data type {0}")]
    UnsupportedMghType(i32),
    #[error("MGH data truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("label {0} does not fit in a 16-bit output volume")]
    LabelOutOfRange(Label),
    #[error(transparent)]
    Nifti(#[from] nifti::NiftiError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Container formats understood by the relabeler, chosen by file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeFormat {
    Nifti,
    NiftiGz,
    Mgh,
    Mgz,
}

impl VolumeFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".nii.gz") {
            Some(VolumeFormat::NiftiGz)
        } else if name.ends_with(".nii") {
            Some(VolumeFormat::Nifti)
        } else if name.ends_with(".mgz") {
            Some(VolumeFormat::Mgz)
        } else if name.ends_with(".mgh") {
            Some(VolumeFormat::Mgh)
        } else {
            None
        }
    }

    /// File name suffix including the leading dot.
    pub fn extension(self) -> &'static str {
        match self {
            VolumeFormat::Nifti => ".nii",
            VolumeFormat::NiftiGz => ".nii.gz",
            VolumeFormat::Mgh => ".mgh",
            VolumeFormat::Mgz => ".mgz",
        }
    }

    pub fn is_nifti(self) -> bool {
        matches!(self, VolumeFormat::Nifti | VolumeFormat::NiftiGz)
    }
}

impl fmt::Display for VolumeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension().trim_start_matches('.'))
    }
}

#[derive(Debug, Clone)]
pub enum VolumeHeader {
    Nifti(Box<NiftiHeader>),
    Mgh(MghHeader),
}

impl VolumeHeader {
    fn family(&self) -> &'static str {
        match self {
            VolumeHeader::Nifti(_) => "NIfTI",
            VolumeHeader::Mgh(_) => "MGH",
        }
    }
}

/// A segmentation label map indexed `[x, y, z]` together with its source header.
#[derive(Debug, Clone)]
pub struct LabelVolume {
    pub header: VolumeHeader,
    pub labels: Array3<Label>,
}

impl LabelVolume {
    pub fn open(path: &Path) -> Result<Self, VolumeError> {
        let format = VolumeFormat::from_path(path)
            .ok_or_else(|| VolumeError::UnsupportedFormat(path.to_path_buf()))?;
        info!("Reading segmentation file: {}", path.display());

        if format.is_nifti() {
            let obj = ReaderOptions::new().read_file(path)?;
            let header = Box::new(obj.header().clone());
            let data = obj.into_volume().into_ndarray::<f32>()?;
            let labels = squeeze_to_3d(data.mapv(|v| v.trunc() as Label))?;
            Ok(Self {
                header: VolumeHeader::Nifti(header),
                labels,
            })
        } else {
            let (header, labels) = mgh::read_mgh(path)?;
            Ok(Self {
                header: VolumeHeader::Mgh(header),
                labels,
            })
        }
    }

    pub fn shape(&self) -> [usize; 3] {
        let (x, y, z) = self.labels.dim();
        [x, y, z]
    }

    /// Save as 16-bit signed labels next to the original geometry.
    pub fn save(&self, path: &Path) -> Result<(), VolumeError> {
        let format = VolumeFormat::from_path(path)
            .ok_or_else(|| VolumeError::UnsupportedFormat(path.to_path_buf()))?;
        let data = self.labels_as_i16()?;
        info!("Saving relabeled segmentation to: {}", path.display());

        match (&self.header, format.is_nifti()) {
            (VolumeHeader::Nifti(reference), true) => {
                let header = NiftiHeader {
                    scl_slope: 1.0,
                    scl_inter: 0.0,
                    ..(**reference).clone()
                };
                WriterOptions::new(path)
                    .reference_header(&header)
                    .write_nifti(&data)?;
            }
            (VolumeHeader::Mgh(reference), false) => mgh::write_mgh(path, reference, &data)?,
            (header, _) => {
                return Err(VolumeError::FormatMismatch {
                    source_format: header.family(),
                    path: path.to_path_buf(),
                })
            }
        }
        Ok(())
    }

    fn labels_as_i16(&self) -> Result<Array3<i16>, VolumeError> {
        if let Some(&bad) = self.labels.iter().find(|&&l| i16::try_from(l).is_err()) {
            return Err(VolumeError::LabelOutOfRange(bad));
        }
        Ok(self.labels.mapv(|l| l as i16))
    }
}

fn squeeze_to_3d(mut data: ArrayD<Label>) -> Result<Array3<Label>, VolumeError> {
    while data.ndim() > 3 && data.shape()[data.ndim() - 1] == 1 {
        let last = data.ndim() - 1;
        data = data.index_axis_move(Axis(last), 0);
    }
    let shape = data.shape().to_vec();
    data.into_dimensionality::<Ix3>()
        .map_err(|_| VolumeError::NotAVolume(shape))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn format_detection_handles_compound_extensions() {
        assert_eq!(
            VolumeFormat::from_path(Path::new("sub-01_aseg.nii.gz")),
            Some(VolumeFormat::NiftiGz)
        );
        assert_eq!(
            VolumeFormat::from_path(Path::new("/data/aseg.MGZ")),
            Some(VolumeFormat::Mgz)
        );
        assert_eq!(VolumeFormat::from_path(Path::new("aseg.mgh")), Some(VolumeFormat::Mgh));
        assert_eq!(VolumeFormat::from_path(Path::new("labels.txt")), None);
        assert_eq!(VolumeFormat::from_path(Path::new("archive.gz")), None);
    }

    #[test]
    fn trailing_singleton_dimension_is_dropped() {
        let data = ArrayD::<Label>::zeros(IxDyn(&[4, 5, 6, 1]));
        let volume = squeeze_to_3d(data).expect("squeeze");
        assert_eq!(volume.dim(), (4, 5, 6));

        let series = ArrayD::<Label>::zeros(IxDyn(&[4, 5, 6, 2]));
        assert!(matches!(
            squeeze_to_3d(series),
            Err(VolumeError::NotAVolume(shape)) if shape == vec![4, 5, 6, 2]
        ));
    }

    #[test]
    fn out_of_range_labels_are_refused() {
        let volume = LabelVolume {
            header: VolumeHeader::Mgh(MghHeader {
                dims: [2, 1, 1, 1],
                dtype: mgh::MghDataType::Int,
                dof: 0,
                ras_good: 0,
                spacing: [1.0; 3],
                mdc: [0.0; 9],
                c_ras: [0.0; 3],
                reserved: Vec::new(),
                trailer: Vec::new(),
            }),
            labels: Array3::from_shape_vec((2, 1, 1), vec![3, 40_000]).expect("shape"),
        };
        assert!(matches!(
            volume.labels_as_i16(),
            Err(VolumeError::LabelOutOfRange(40_000))
        ));
    }
}

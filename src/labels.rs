//
// labels.rs
// Seg-Relabel-rs
//
// Label catalogue for the standardized segmentation vocabulary: valid labels with names and colors, corpus callosum labels, and remap targets.
//
// Thales Matheus Mendonça Santos - November 2025

use std::ops::Range;

/// Voxel label as held in memory while relabeling.
pub type Label = i32;

/// A label of the target vocabulary with its FreeSurfer structure name and display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelEntry {
    pub value: Label,
    pub name: &'static str,
    pub rgb: [u8; 3],
}

const fn entry(value: Label, name: &'static str, r: u8, g: u8, b: u8) -> LabelEntry {
    LabelEntry {
        value,
        name,
        rgb: [r, g, b],
    }
}

/// Valid labels of the standardized vocabulary, sorted by value.
pub const VALID_LABELS: &[LabelEntry] = &[
    entry(0, "Unknown", 0, 0, 0),
    entry(1, "Left-Cerebral-Exterior", 70, 130, 180),
    entry(2, "Left-Cerebral-White-Matter", 245, 245, 245),
    entry(3, "Left-Cerebral-Cortex", 205, 62, 78),
    entry(4, "Left-Lateral-Ventricle", 120, 18, 134),
    entry(5, "Left-Inf-Lat-Vent", 196, 58, 250),
    entry(6, "Left-Cerebellum-Exterior", 0, 148, 0),
    entry(7, "Left-Cerebellum-White-Matter", 220, 248, 164),
    entry(8, "Left-Cerebellum-Cortex", 230, 148, 34),
    entry(10, "Left-Thalamus-Proper", 0, 118, 14),
    entry(11, "Left-Caudate", 122, 186, 220),
    entry(12, "Left-Putamen", 236, 13, 176),
    entry(13, "Left-Pallidum", 12, 48, 255),
    entry(14, "3rd-Ventricle", 204, 182, 142),
    entry(15, "4th-Ventricle", 42, 204, 164),
    entry(16, "Brain-Stem", 119, 159, 176),
    entry(17, "Left-Hippocampus", 220, 216, 20),
    entry(18, "Left-Amygdala", 103, 255, 255),
    entry(24, "CSF", 60, 60, 60),
    entry(26, "Left-Accumbens-area", 255, 165, 0),
    entry(28, "Left-VentralDC", 165, 42, 42),
    entry(30, "Left-vessel", 160, 32, 240),
    entry(31, "Left-choroid-plexus", 0, 200, 200),
    entry(40, "Right-Cerebral-Exterior", 70, 130, 180),
    entry(41, "Right-Cerebral-White-Matter", 0, 225, 0),
    entry(42, "Right-Cerebral-Cortex", 205, 62, 78),
    entry(43, "Right-Lateral-Ventricle", 120, 18, 134),
    entry(44, "Right-Inf-Lat-Vent", 196, 58, 250),
    entry(46, "Right-Cerebellum-White-Matter", 220, 248, 164),
    entry(47, "Right-Cerebellum-Cortex", 230, 148, 34),
    entry(49, "Right-Thalamus-Proper", 0, 118, 14),
    entry(50, "Right-Caudate", 122, 186, 220),
    entry(51, "Right-Putamen", 236, 13, 176),
    entry(52, "Right-Pallidum", 13, 48, 255),
    entry(53, "Right-Hippocampus", 220, 216, 20),
    entry(54, "Right-Amygdala", 103, 255, 255),
    entry(58, "Right-Accumbens-area", 255, 165, 0),
    entry(60, "Right-VentralDC", 165, 42, 42),
    entry(62, "Right-vessel", 160, 32, 240),
    entry(63, "Right-choroid-plexus", 0, 200, 221),
    entry(77, "WM-hypointensities", 200, 70, 255),
    entry(80, "non-WM-hypointensities", 164, 108, 226),
    entry(85, "Optic-Chiasm", 234, 169, 30),
    entry(172, "Vermis", 119, 100, 176),
];

/// CC_Posterior, CC_Mid_Posterior, CC_Central, CC_Mid_Anterior, CC_Anterior.
pub const CORPUS_CALLOSUM_LABELS: &[Label] = &[251, 252, 253, 254, 255];

/// Source labels with no counterpart in the target vocabulary (Left-Interior, 5th-Ventricle).
pub const UNUSED_LABELS: &[Label] = &[29, 72];

/// Everything the relabeler needs to know about one atlas.
///
/// Swapping atlases means providing another value of this type; the
/// resolver and remapper never hard-code label numbers.
#[derive(Debug, Clone)]
pub struct LabelCatalogue {
    pub name: &'static str,
    /// Valid labels, sorted by value.
    pub valid: &'static [LabelEntry],
    pub corpus_callosum: &'static [Label],
    pub unused: &'static [Label],
    pub background: Label,
    pub left_white_matter: Label,
    pub right_white_matter: Label,
    pub left_cortex: Label,
    pub right_cortex: Label,
    /// Cortical parcellation labels of the left hemisphere.
    pub left_cortex_range: Range<Label>,
    /// First cortical parcellation label of the right hemisphere; everything above maps right.
    pub right_cortex_start: Label,
}

/// FreeSurfer `aseg`/`aparc+aseg` collapsed to the standardized vocabulary.
pub const FREESURFER_ASEG: LabelCatalogue = LabelCatalogue {
    name: "freesurfer-aseg",
    valid: VALID_LABELS,
    corpus_callosum: CORPUS_CALLOSUM_LABELS,
    unused: UNUSED_LABELS,
    background: 0,
    left_white_matter: 2,
    right_white_matter: 41,
    left_cortex: 3,
    right_cortex: 42,
    left_cortex_range: 1000..2000,
    right_cortex_start: 2000,
};

impl LabelCatalogue {
    pub fn entry(&self, label: Label) -> Option<&'static LabelEntry> {
        let valid = self.valid;
        valid
            .binary_search_by_key(&label, |e| e.value)
            .ok()
            .map(|idx| &valid[idx])
    }

    pub fn is_valid(&self, label: Label) -> bool {
        self.entry(label).is_some()
    }

    pub fn is_corpus_callosum(&self, label: Label) -> bool {
        self.corpus_callosum.contains(&label)
    }

    pub fn is_unused(&self, label: Label) -> bool {
        self.unused.contains(&label)
    }

    pub fn name_of(&self, label: Label) -> Option<&'static str> {
        self.entry(label).map(|e| e.name)
    }

    /// Largest label of the vocabulary; the output integer type must hold it.
    pub fn max_label(&self) -> Label {
        self.valid.last().map_or(self.background, |e| e.value)
    }
}

impl Default for LabelCatalogue {
    fn default() -> Self {
        FREESURFER_ASEG
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_table_is_sorted_and_unique() {
        assert!(VALID_LABELS.windows(2).all(|w| w[0].value < w[1].value));
        assert_eq!(VALID_LABELS.len(), 44);
    }

    #[test]
    fn rule_targets_are_valid_and_sources_are_not() {
        let cat = FREESURFER_ASEG;
        for target in [
            cat.background,
            cat.left_white_matter,
            cat.right_white_matter,
            cat.left_cortex,
            cat.right_cortex,
        ] {
            assert!(cat.is_valid(target), "{target} should be valid");
        }
        for &cc in cat.corpus_callosum {
            assert!(!cat.is_valid(cc));
        }
        for &unused in cat.unused {
            assert!(!cat.is_valid(unused));
        }
        assert_eq!(cat.max_label(), 172);
    }

    #[test]
    fn names_resolve_for_known_labels() {
        assert_eq!(FREESURFER_ASEG.name_of(41), Some("Right-Cerebral-White-Matter"));
        assert_eq!(FREESURFER_ASEG.name_of(9999), None);
    }
}

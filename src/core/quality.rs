use crate::core::SourceKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    pub label: &'static str,
    /// Tallest progressive stream to prefer. `None` means take the best.
    pub max_height: Option<u32>,
}

pub const YOUTUBE_QUALITIES: [QualityPreset; 5] = [
    QualityPreset { label: "Best Quality (1080p)", max_height: Some(1080) },
    QualityPreset { label: "High Quality (720p)", max_height: Some(720) },
    QualityPreset { label: "Medium Quality (480p)", max_height: Some(480) },
    QualityPreset { label: "Low Quality (360p)", max_height: Some(360) },
    QualityPreset { label: "Mobile Quality (240p)", max_height: Some(240) },
];

// Rutube only hands out adaptive manifests, so the choice is remembered but
// the player picks the rendition.
pub const RUTUBE_QUALITIES: [QualityPreset; 5] = [
    QualityPreset { label: "Automatic (Best Available)", max_height: None },
    QualityPreset { label: "1080p (Full HD)", max_height: Some(1080) },
    QualityPreset { label: "720p (HD)", max_height: Some(720) },
    QualityPreset { label: "480p (SD)", max_height: Some(480) },
    QualityPreset { label: "360p (Mobile)", max_height: Some(360) },
];

pub fn presets(kind: SourceKind) -> &'static [QualityPreset] {
    match kind {
        SourceKind::Youtube => &YOUTUBE_QUALITIES,
        SourceKind::Rutube => &RUTUBE_QUALITIES,
        SourceKind::Direct | SourceKind::M3u8 => &[],
    }
}

/// Out-of-range indices fall back to the first preset.
pub fn clamp_index(kind: SourceKind, index: usize) -> usize {
    if index < presets(kind).len() {
        index
    } else {
        0
    }
}

pub fn preset(kind: SourceKind, index: usize) -> Option<QualityPreset> {
    presets(kind).get(clamp_index(kind, index)).copied()
}

/// Knobs handed to an extractor for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractOptions {
    pub max_height: Option<u32>,
}

impl ExtractOptions {
    pub fn for_quality(kind: SourceKind, index: usize) -> Self {
        Self {
            max_height: preset(kind, index).and_then(|p| p.max_height),
        }
    }
}

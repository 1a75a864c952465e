use std::collections::HashMap;

/// A KOL video promoted on the campaign landing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoEntry {
    /// Stable identifier reported by the player beacon
    pub id: &'static str,
    /// Display title shown on the video wall
    pub title: &'static str,
    /// Creator handle
    pub creator: &'static str,
}

/// Videos promoted for the current campaign.
///
/// Declaration order doubles as the rotation tie-break order when exposure
/// counts are equal, so new videos should be appended in the order they
/// should surface.
pub const VIDEO_CATALOG: &[VideoEntry] = &[
    VideoEntry {
        id: "kol-mia-unboxing",
        title: "Lumen Unboxing & First Light",
        creator: "@mia.makes",
    },
    VideoEntry {
        id: "kol-dex-teardown",
        title: "What's Inside the Lumen",
        creator: "@dexterbuilds",
    },
    VideoEntry {
        id: "kol-suki-giftguide",
        title: "Holiday Gift Guide: Lumen Edition",
        creator: "@sukistyle",
    },
    VideoEntry {
        id: "kol-ray-review",
        title: "30 Days with the Lumen",
        creator: "@raytechreview",
    },
    VideoEntry {
        id: "kol-ana-setup",
        title: "Desk Setup Glow-Up",
        creator: "@ana.desk",
    },
    VideoEntry {
        id: "kol-leo-compare",
        title: "Lumen vs. Everything Else",
        creator: "@leo.compares",
    },
];

/// Iterate over the catalog video ids in declaration order.
pub fn catalog_ids() -> impl Iterator<Item = &'static str> {
    VIDEO_CATALOG.iter().map(|entry| entry.id)
}

/// Position of a video id in catalog declaration order.
pub fn catalog_rank(id: &str) -> Option<usize> {
    VIDEO_CATALOG.iter().position(|entry| entry.id == id)
}

/// Every catalog video mapped to zero exposures.
pub fn zeroed_counts() -> HashMap<String, u64> {
    catalog_ids().map(|id| (id.to_string(), 0)).collect()
}

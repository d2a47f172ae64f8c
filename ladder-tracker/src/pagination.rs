//! Pagination utilities for ladder traversal
//!
//! Offsets are entry offsets into the ladder, always a multiple of the page
//! size for full scans. The public endpoint refuses offsets past a fixed
//! depth, so public traversal stops at the configured ceiling.

use ladder_common::config::ScanSettings;
use ladder_common::LadderMode;

/// Page geometry and depth limit of one traversal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Entries per page request
    pub page_size: u32,
    /// Offset at which traversal stops (`None` = unbounded)
    pub depth_ceiling: Option<u32>,
}

impl Pagination {
    /// Pagination for a traversal mode
    ///
    /// Public mode is always capped; authenticated mode only when a deep
    /// ceiling is configured.
    pub fn for_mode(settings: &ScanSettings, mode: LadderMode) -> Self {
        let depth_ceiling = match mode {
            LadderMode::Public => Some(settings.public_depth_ceiling),
            LadderMode::Authenticated => settings.deep_depth_ceiling,
        };

        Self {
            page_size: settings.page_size.max(1),
            depth_ceiling,
        }
    }

    /// True once `offset` has reached the depth ceiling
    pub fn ceiling_reached(&self, offset: u32) -> bool {
        self.depth_ceiling.is_some_and(|ceiling| offset >= ceiling)
    }

    /// Offset of the page after the one at `offset`
    pub fn next_offset(&self, offset: u32) -> u32 {
        offset.saturating_add(self.page_size)
    }
}

/// Offset of a window of `window_size` entries centred on a 1-based rank
///
/// # Examples
/// ```
/// use ladder_tracker::pagination::window_offset;
///
/// assert_eq!(window_offset(1000, 200), 900);
/// assert_eq!(window_offset(40, 200), 0);  // Clamped at the top of the ladder
/// ```
pub fn window_offset(rank: u32, window_size: u32) -> u32 {
    rank.saturating_sub(window_size / 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_mode_is_capped() {
        let p = Pagination::for_mode(&ScanSettings::default(), LadderMode::Public);
        assert_eq!(p.page_size, 200);
        assert_eq!(p.depth_ceiling, Some(15_000));
        assert!(!p.ceiling_reached(14_800));
        assert!(p.ceiling_reached(15_000));
        assert!(p.ceiling_reached(15_200));
    }

    #[test]
    fn test_authenticated_mode_unbounded_by_default() {
        let p = Pagination::for_mode(&ScanSettings::default(), LadderMode::Authenticated);
        assert_eq!(p.depth_ceiling, None);
        assert!(!p.ceiling_reached(u32::MAX));
    }

    #[test]
    fn test_authenticated_mode_with_deep_ceiling() {
        let settings = ScanSettings {
            deep_depth_ceiling: Some(50_000),
            ..ScanSettings::default()
        };
        let p = Pagination::for_mode(&settings, LadderMode::Authenticated);
        assert!(p.ceiling_reached(50_000));
    }

    #[test]
    fn test_next_offset() {
        let p = Pagination {
            page_size: 200,
            depth_ceiling: None,
        };
        assert_eq!(p.next_offset(0), 200);
        assert_eq!(p.next_offset(u32::MAX - 10), u32::MAX);
    }

    #[test]
    fn test_window_offset() {
        assert_eq!(window_offset(1000, 200), 900);
        assert_eq!(window_offset(100, 200), 0);
        assert_eq!(window_offset(101, 200), 1);
        assert_eq!(window_offset(1, 5), 0);
        assert_eq!(window_offset(10, 5), 8);
    }
}

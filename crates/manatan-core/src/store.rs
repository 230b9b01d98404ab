//! Single owner of the OCR cache, fetch statuses, the merge anchor and the
//! dictionary popup.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use manatan_types::{DictPopupState, MergeAnchor, OcrBlock, OcrStatus};

use crate::blocks::{self, BlockError};

/// Outcome of a merge-modifier tap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeTap {
    /// The tapped block became the anchor.
    AnchorSet,
    /// Anchor and tapped block were merged into the block at `index`.
    Merged { index: usize },
    /// The pending anchor was dropped without merging.
    AnchorCleared,
}

#[derive(Debug, Default)]
pub struct OcrStore {
    cache: HashMap<String, Vec<OcrBlock>>,
    statuses: HashMap<String, OcrStatus>,
    merge_anchor: Option<MergeAnchor>,
    popup: DictPopupState,
    revision: u64,
}

impl OcrStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped on every write, so renderers can tell when to repaint.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub fn blocks(&self, url: &str) -> Option<&[OcrBlock]> {
        self.cache.get(url).map(Vec::as_slice)
    }

    pub fn is_cached(&self, url: &str) -> bool {
        self.cache.contains_key(url)
    }

    /// Cached data always reads as `Success`, whatever was recorded.
    pub fn status(&self, url: &str) -> OcrStatus {
        if self.cache.contains_key(url) {
            return OcrStatus::Success;
        }
        self.statuses.get(url).copied().unwrap_or_default()
    }

    pub fn set_status(&mut self, url: &str, status: OcrStatus) {
        self.statuses.insert(url.to_string(), status);
        self.touch();
    }

    /// Claim the fetch for `url`. Returns `false` when the URL is empty,
    /// already cached, already loading, or failed (failures wait for a retry).
    pub fn begin_fetch(&mut self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }

        match self.status(url) {
            OcrStatus::Idle => {
                self.set_status(url, OcrStatus::Loading);
                true
            }
            OcrStatus::Loading | OcrStatus::Success | OcrStatus::Error => false,
        }
    }

    /// Like [`OcrStore::begin_fetch`] but also claims a failed URL.
    pub fn begin_retry(&mut self, url: &str) -> bool {
        if url.is_empty() {
            return false;
        }

        match self.status(url) {
            OcrStatus::Idle | OcrStatus::Error => {
                self.set_status(url, OcrStatus::Loading);
                true
            }
            OcrStatus::Loading | OcrStatus::Success => false,
        }
    }

    pub fn complete_fetch(&mut self, url: &str, blocks: Vec<OcrBlock>) {
        self.cache.insert(url.to_string(), blocks);
        self.statuses.insert(url.to_string(), OcrStatus::Success);
        self.touch();
    }

    pub fn fail_fetch(&mut self, url: &str) {
        self.set_status(url, OcrStatus::Error);
    }

    /// Swap in a new block list for an already cached image.
    pub fn replace_blocks(&mut self, url: &str, blocks: Vec<OcrBlock>) -> Result<(), BlockError> {
        let slot = self
            .cache
            .get_mut(url)
            .ok_or_else(|| BlockError::NotCached(url.to_string()))?;
        *slot = blocks;
        self.touch();
        Ok(())
    }

    fn cached(&self, url: &str) -> Result<&[OcrBlock], BlockError> {
        self.blocks(url)
            .ok_or_else(|| BlockError::NotCached(url.to_string()))
    }

    pub fn delete_block(&mut self, url: &str, index: usize) -> Result<(), BlockError> {
        let next = blocks::delete_block(self.cached(url)?, index)?;
        self.replace_blocks(url, next)?;

        // Indices on this image shifted
        if self.merge_anchor.as_ref().is_some_and(|a| a.img_src == url) {
            self.merge_anchor = None;
        }
        Ok(())
    }

    pub fn edit_block(&mut self, url: &str, index: usize, display_text: &str) -> Result<(), BlockError> {
        let next = blocks::edit_block(self.cached(url)?, index, display_text)?;
        self.replace_blocks(url, next)
    }

    pub fn merge_anchor(&self) -> Option<&MergeAnchor> {
        self.merge_anchor.as_ref()
    }

    pub fn clear_merge_anchor(&mut self) {
        if self.merge_anchor.take().is_some() {
            self.touch();
        }
    }

    /// Apply a merge-modifier tap on block `index` of `url`.
    ///
    /// No anchor: the block becomes the anchor. Anchor on another block of the
    /// same image: the two merge (anchor text first). Anchor on the same block
    /// or on another image: the anchor is dropped.
    pub fn merge_tap(&mut self, url: &str, index: usize, separator: &str) -> Result<MergeTap, BlockError> {
        let blocks = self.cached(url)?;
        if index >= blocks.len() {
            return Err(BlockError::OutOfRange {
                index,
                len: blocks.len(),
            });
        }

        let Some(anchor) = self.merge_anchor.take() else {
            self.merge_anchor = Some(MergeAnchor {
                img_src: url.to_string(),
                index,
            });
            self.touch();
            return Ok(MergeTap::AnchorSet);
        };

        if anchor.img_src != url || anchor.index == index {
            self.touch();
            return Ok(MergeTap::AnchorCleared);
        }

        let next = blocks::merge_blocks(self.cached(url)?, anchor.index, index, separator)?;
        self.replace_blocks(url, next)?;

        Ok(MergeTap::Merged {
            index: anchor.index.min(index),
        })
    }

    pub fn popup(&self) -> &DictPopupState {
        &self.popup
    }

    pub fn set_popup(&mut self, popup: DictPopupState) {
        self.popup = popup;
        self.touch();
    }

    /// Forget every cached page, e.g. after the server cache was purged.
    pub fn clear(&mut self) {
        self.cache.clear();
        self.statuses.clear();
        self.merge_anchor = None;
        self.touch();
    }
}

/// Shared handle to the one [`OcrStore`].
///
/// Lock sections are short and never span an `.await`.
#[derive(Debug, Clone, Default)]
pub struct StoreHandle(Arc<RwLock<OcrStore>>);

impl StoreHandle {
    pub fn new(store: OcrStore) -> Self {
        Self(Arc::new(RwLock::new(store)))
    }

    pub fn read(&self) -> RwLockReadGuard<'_, OcrStore> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, OcrStore> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use manatan_types::BoundingBox;

    use super::*;

    const PAGE: &str = "https://x/page1.png";

    fn blocks() -> Vec<OcrBlock> {
        vec![
            OcrBlock::new("Hello", BoundingBox::new(0.0, 0.0, 0.5, 0.2)),
            OcrBlock::new("World", BoundingBox::new(0.5, 0.0, 0.5, 0.2)),
            OcrBlock::new("!", BoundingBox::new(0.0, 0.5, 0.1, 0.1)),
        ]
    }

    #[test]
    fn cache_presence_wins_over_recorded_status() {
        let mut store = OcrStore::new();
        assert_eq!(store.status(PAGE), OcrStatus::Idle);

        for recorded in [OcrStatus::Idle, OcrStatus::Loading, OcrStatus::Error] {
            store.complete_fetch(PAGE, blocks());
            store.set_status(PAGE, recorded);
            assert_eq!(store.status(PAGE), OcrStatus::Success);
        }
    }

    #[test]
    fn fetch_is_claimed_once() {
        let mut store = OcrStore::new();
        assert!(!store.begin_fetch(""));
        assert!(store.begin_fetch(PAGE));
        assert!(!store.begin_fetch(PAGE));
        assert_eq!(store.status(PAGE), OcrStatus::Loading);

        store.fail_fetch(PAGE);
        assert!(!store.begin_fetch(PAGE));
        assert!(store.begin_retry(PAGE));
        assert!(!store.begin_retry(PAGE));

        store.complete_fetch(PAGE, blocks());
        assert!(!store.begin_fetch(PAGE));
        assert!(!store.begin_retry(PAGE));
    }

    #[test]
    fn merge_tap_sequence() {
        let mut store = OcrStore::new();
        store.complete_fetch(PAGE, blocks());

        assert_eq!(store.merge_tap(PAGE, 0, " ").unwrap(), MergeTap::AnchorSet);
        assert_eq!(store.merge_anchor().unwrap().index, 0);

        assert_eq!(store.merge_tap(PAGE, 1, " ").unwrap(), MergeTap::Merged { index: 0 });
        assert!(store.merge_anchor().is_none());

        let page = store.blocks(PAGE).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].text, "Hello World");
        assert_eq!(page[0].tight_bounding_box, BoundingBox::new(0.0, 0.0, 1.0, 0.2));
        assert_eq!(page[0].is_merged, Some(true));
    }

    #[test]
    fn cross_image_anchor_is_discarded() {
        let other = "https://x/page2.png";
        let mut store = OcrStore::new();
        store.complete_fetch(PAGE, blocks());
        store.complete_fetch(other, blocks());

        store.merge_tap(other, 1, " ").unwrap();
        assert_eq!(store.merge_tap(PAGE, 0, " ").unwrap(), MergeTap::AnchorCleared);
        assert!(store.merge_anchor().is_none());
        assert_eq!(store.blocks(PAGE).unwrap().len(), 3);
        assert_eq!(store.blocks(other).unwrap().len(), 3);

        // Tapping the anchor itself deselects it
        store.merge_tap(PAGE, 2, " ").unwrap();
        assert_eq!(store.merge_tap(PAGE, 2, " ").unwrap(), MergeTap::AnchorCleared);
    }

    #[test]
    fn delete_clears_anchor_on_same_image() {
        let mut store = OcrStore::new();
        store.complete_fetch(PAGE, blocks());
        store.merge_tap(PAGE, 2, " ").unwrap();

        store.delete_block(PAGE, 0).unwrap();
        assert!(store.merge_anchor().is_none());
        assert_eq!(store.blocks(PAGE).unwrap()[0].text, "World");
    }

    #[test]
    fn writes_bump_revision_and_require_cache() {
        let mut store = OcrStore::new();
        let before = store.revision();
        assert_eq!(
            store.edit_block(PAGE, 0, "x"),
            Err(BlockError::NotCached(PAGE.to_string()))
        );

        store.complete_fetch(PAGE, blocks());
        store.edit_block(PAGE, 0, "Hi\nthere").unwrap();
        assert!(store.revision() > before);
        assert_eq!(store.blocks(PAGE).unwrap()[0].text, "Hi\u{200B}there");

        store.clear();
        assert_eq!(store.status(PAGE), OcrStatus::Idle);
    }
}

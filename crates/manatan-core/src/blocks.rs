//! Whole-array edits of one image's block list. Every operation returns a new
//! list; callers swap it into the store in one write.

use manatan_types::OcrBlock;

use crate::geometry::union_box;
use crate::preprocess::{DefaultPreprocessor, Preprocessor};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BlockError {
    #[error("Block {index} out of range for {len} blocks")]
    OutOfRange { index: usize, len: usize },

    #[error("Cannot merge block {0} with itself")]
    SameBlock(usize),

    #[error("No blocks cached for {0}")]
    NotCached(String),
}

fn check(blocks: &[OcrBlock], index: usize) -> Result<(), BlockError> {
    if index >= blocks.len() {
        return Err(BlockError::OutOfRange {
            index,
            len: blocks.len(),
        });
    }
    Ok(())
}

/// `blocks` without `index`, order of the rest preserved.
pub fn delete_block(blocks: &[OcrBlock], index: usize) -> Result<Vec<OcrBlock>, BlockError> {
    check(blocks, index)?;

    let mut next = blocks.to_vec();
    next.remove(index);
    Ok(next)
}

/// Merge `anchor` and `other` into one block placed at the lower index.
///
/// Text is `anchor + separator + other`, the box is the union of both.
pub fn merge_blocks(
    blocks: &[OcrBlock],
    anchor: usize,
    other: usize,
    separator: &str,
) -> Result<Vec<OcrBlock>, BlockError> {
    check(blocks, anchor)?;
    check(blocks, other)?;
    if anchor == other {
        return Err(BlockError::SameBlock(anchor));
    }

    let first = &blocks[anchor];
    let second = &blocks[other];

    let merged = OcrBlock {
        text: format!("{}{}{}", first.text, separator, second.text),
        tight_bounding_box: union_box(&first.tight_bounding_box, &second.tight_bounding_box),
        forced_orientation: first.forced_orientation.or(second.forced_orientation),
        is_merged: Some(true),
    };

    let keep = anchor.min(other);
    let drop = anchor.max(other);

    let mut next = Vec::with_capacity(blocks.len() - 1);
    for (i, block) in blocks.iter().enumerate() {
        if i == keep {
            next.push(merged.clone());
        } else if i != drop {
            next.push(block.clone());
        }
    }

    Ok(next)
}

/// Replace a block's text with edited display text.
pub fn edit_block(
    blocks: &[OcrBlock],
    index: usize,
    display_text: &str,
) -> Result<Vec<OcrBlock>, BlockError> {
    check(blocks, index)?;

    let mut next = blocks.to_vec();
    next[index].text = DefaultPreprocessor.storage(display_text);
    Ok(next)
}

#[cfg(test)]
mod tests {
    use manatan_types::{BoundingBox, Orientation};

    use super::*;

    fn block(text: &str, x: f64) -> OcrBlock {
        OcrBlock::new(text, BoundingBox::new(x, 0.0, 0.1, 0.1))
    }

    fn page() -> Vec<OcrBlock> {
        vec![
            block("a", 0.0),
            block("b", 0.2),
            block("c", 0.4),
            block("d", 0.6),
        ]
    }

    #[test]
    fn delete_preserves_order() {
        let blocks = page();
        for i in 0..blocks.len() {
            let next = delete_block(&blocks, i).unwrap();
            assert_eq!(next.len(), blocks.len() - 1);

            let mut expected = blocks.clone();
            expected.remove(i);
            assert_eq!(next, expected);
        }

        assert_eq!(
            delete_block(&blocks, 4),
            Err(BlockError::OutOfRange { index: 4, len: 4 })
        );
    }

    #[test]
    fn merge_replaces_both_operands() {
        let blocks = page();
        let next = merge_blocks(&blocks, 3, 1, " ").unwrap();

        assert_eq!(next.len(), 3);
        assert_eq!(next[0], blocks[0]);
        assert_eq!(next[2], blocks[2]);
        assert!(!next.contains(&blocks[1]));
        assert!(!next.contains(&blocks[3]));

        let merged = &next[1];
        assert_eq!(merged.text, "d b");
        assert_eq!(merged.is_merged, Some(true));
        assert!((merged.tight_bounding_box.x - 0.2).abs() < 1e-9);
        assert!((merged.tight_bounding_box.right() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn merge_rejects_bad_indices() {
        let blocks = page();
        assert_eq!(merge_blocks(&blocks, 1, 1, " "), Err(BlockError::SameBlock(1)));
        assert!(merge_blocks(&blocks, 0, 9, " ").is_err());
    }

    #[test]
    fn merge_keeps_forced_orientation() {
        let mut blocks = page();
        blocks[2].forced_orientation = Some(Orientation::Vertical);

        let next = merge_blocks(&blocks, 0, 2, "\u{200B}").unwrap();
        assert_eq!(next[0].forced_orientation, Some(Orientation::Vertical));
        assert_eq!(next[0].text, "a\u{200B}c");
    }

    #[test]
    fn merged_hello_world() {
        let blocks = vec![
            OcrBlock::new("Hello", BoundingBox::new(0.0, 0.0, 0.5, 0.2)),
            OcrBlock::new("World", BoundingBox::new(0.5, 0.0, 0.5, 0.2)),
        ];

        let next = merge_blocks(&blocks, 0, 1, " ").unwrap();
        assert_eq!(
            next,
            vec![OcrBlock {
                text: "Hello World".to_string(),
                tight_bounding_box: BoundingBox::new(0.0, 0.0, 1.0, 0.2),
                forced_orientation: None,
                is_merged: Some(true),
            }]
        );
    }

    #[test]
    fn edit_escapes_newlines() {
        let next = edit_block(&page(), 2, "x\ny").unwrap();
        assert_eq!(next[2].text, "x\u{200B}y");
        assert_eq!(next[1].text, "b");
    }
}

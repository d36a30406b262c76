//! Synthesizer for minimal structurally-valid UDF images
//!
//! The produced buffer carries just enough structure to be recognized as a
//! UDF volume: the recognition sequence, an anchor at the conventional
//! probe block, a closing anchor near the end of the media and the start of
//! the referenced descriptor sequence. It is meant to seed fuzzing corpora,
//! not to mount

use super::ecma167::{AnchorVolumeDescriptorPointer, DescriptorTag, ExtentAD, TagKind};
use super::ANCHOR_PROBE_LBA;
use std::io::{self, Cursor, Seek, SeekFrom, Write};
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, warn};

/// Logical sector size of the volume recognition area
pub const UDF_LOGICAL_SECTOR_SIZE: u64 = 0x800;

/// Byte offset of the volume recognition sequence
pub const UDF_VRS_START_OFFSET: u64 = 0x8000;

/// Beginning Extended Area identifier
pub const UDF_BEA_IDENTIFIER: &[u8; 5] = b"BEA01";

/// NSR02 identifier
pub const UDF_NSR2_IDENTIFIER: &[u8; 5] = b"NSR02";

/// Terminating Extended Area identifier
pub const UDF_TEA_IDENTIFIER: &[u8; 5] = b"TEA01";

/// Blocks held back from the end of the media for the closing anchor
pub const MAX_CORRECTION_BLOCKS_NUM: u32 = 512;

/// First block of the main volume descriptor sequence
const SEQ_START_BLOCK: u32 = 16;

/// Length of the main volume descriptor sequence, in blocks
const SEQ_BLOCKS_NUM: u32 = 16;

#[derive(Debug, Clone)]
/// The shape of a synthesized image
pub struct SeedGeometry {
    /// Image size in bytes
    pub total_size: u64,
    /// Logical block size
    pub block_size: u32,
    /// Blocks held back from the end of the media for the closing anchor
    pub correction_blocks: u32,
}

impl Default for SeedGeometry {
    fn default() -> Self {
        Self {
            total_size: 1024 * 1024,
            block_size: 2048,
            correction_blocks: MAX_CORRECTION_BLOCKS_NUM,
        }
    }
}

/// Builds a minimal valid-shaped UDF image
///
/// The buffer is assembled fully in memory and returned as one unit;
/// flushing it to storage is the caller's concern
#[instrument(skip_all)]
pub fn build(geometry: &SeedGeometry) -> Result<Vec<u8>, io::Error> {
    if geometry.block_size == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "Block size must be non zero",
        ));
    }
    let bs = u64::from(geometry.block_size);
    let primary_anchor_offset = u64::from(ANCHOR_PROBE_LBA) * bs;
    let needed = (primary_anchor_offset + 512)
        .max(UDF_VRS_START_OFFSET + 3 * UDF_LOGICAL_SECTOR_SIZE)
        .max(u64::from(SEQ_START_BLOCK) * bs + 512);
    if geometry.total_size < needed {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!(
                "Total size {} is too small for a seed image (minimum {needed})",
                geometry.total_size
            ),
        ));
    }
    let total = usize::try_from(geometry.total_size).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "Total size exceeds memory")
    })?;
    let mut image = vec![0u8; total];
    let mut cur = Cursor::new(image.as_mut_slice());

    // Terminate the referenced descriptor sequence right away
    let term_body = [0u8; 512 - DescriptorTag::LEN];
    let term = DescriptorTag::stamped(TagKind::TerminatingDescriptor, SEQ_START_BLOCK, &term_body);
    cur.seek(SeekFrom::Start(u64::from(SEQ_START_BLOCK) * bs))?;
    term.write_to(&mut cur)?;

    // Anchor at the conventional probe block
    let primary = AnchorVolumeDescriptorPointer::build(
        ANCHOR_PROBE_LBA,
        ExtentAD { length: 0, lba: 0 },
        ExtentAD { length: 0, lba: 0 },
    );
    cur.seek(SeekFrom::Start(primary_anchor_offset))?;
    primary.write_to(&mut cur)?;

    // Closing anchor, held back from the end of the media by the correction
    // window when the image is large enough, at the last block otherwise
    let last_block = (geometry.total_size + bs - 1) / bs - 1;
    let closing_lba = match last_block.checked_sub(u64::from(geometry.correction_blocks)) {
        Some(lba) if lba > 0 => lba,
        _ => {
            debug!(
                "Image too small for a {} block correction window, closing anchor at the last block",
                geometry.correction_blocks
            );
            last_block
        }
    };
    let closing_lba = u32::try_from(closing_lba).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "Image exceeds the block range")
    })?;
    let closing = AnchorVolumeDescriptorPointer::build(
        closing_lba,
        ExtentAD {
            length: SEQ_BLOCKS_NUM * geometry.block_size,
            lba: SEQ_START_BLOCK,
        },
        ExtentAD { length: 0, lba: 0 },
    );
    cur.seek(SeekFrom::Start(u64::from(closing_lba) * bs))?;
    closing.write_to(&mut cur)?;

    // Recognition sequence last: at a 2048 byte block size the sequence
    // start block coincides with the recognition area, and the identifiers
    // must prevail there
    for (i, id) in [UDF_BEA_IDENTIFIER, UDF_NSR2_IDENTIFIER, UDF_TEA_IDENTIFIER]
        .iter()
        .enumerate()
    {
        cur.seek(SeekFrom::Start(
            UDF_VRS_START_OFFSET + i as u64 * UDF_LOGICAL_SECTOR_SIZE,
        ))?;
        cur.write_all(*id)?;
    }

    Ok(image)
}

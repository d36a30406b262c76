//! Decoder for UDF images
//!
//! This module supports block size detection, whole-image descriptor scans
//! and targeted decoding of single blocks from raw UDF images
//!
//! Inputs are routinely fuzzer-mutated: unassigned tags and corrupt
//! directory chains are expected outcomes, not errors

pub mod ecma167;
pub mod report;
pub mod seed;

use crate::reader::slice_at;
use ecma167::*;
use std::io;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, warn};

/// The block sizes the detector probes, smallest first
pub const CANDIDATE_BLOCK_SIZES: [u32; 4] = [512, 1024, 2048, 4096];

/// The logical block an Anchor Volume Descriptor Pointer is recorded at
pub const ANCHOR_PROBE_LBA: u32 = 256;

/// Highest logical block visited by a full scan
const SCAN_LBA_LIMIT: u64 = 256;

/// Sector stride of the volume recognition sequence
const VRS_SECTOR_SIZE: u64 = 2048;

/// Determines the logical block size of a raw image
///
/// Each candidate size is probed by decoding a descriptor tag at the
/// conventional anchor block: the Anchor Volume Descriptor Pointer sits at
/// logical block 256 regardless of the physical sector size, so the first
/// candidate which produces an anchor tag there wins. `None` when no
/// candidate matches
#[instrument(skip_all)]
pub fn detect_block_size(data: &[u8]) -> Option<u32> {
    CANDIDATE_BLOCK_SIZES.into_iter().find(|bs| {
        let offset = u64::from(*bs) * u64::from(ANCHOR_PROBE_LBA);
        let found = slice_at(data, offset)
            .and_then(DescriptorTag::read)
            .map(|tag| tag.identifier == TagKind::AnchorVolumeDescriptorPointer as u16)
            .unwrap_or(false);
        if found {
            debug!("Anchor tag found probing block size {bs}");
        }
        found
    })
}

#[derive(Debug, Clone)]
/// A descriptor decoded from a block of the image
pub enum Descriptor {
    /// Anchor Volume Descriptor Pointer
    Anchor(AnchorVolumeDescriptorPointer),
    /// Primary Volume Descriptor
    PrimaryVolume(Box<PrimaryVolumeDescriptor>),
    /// Logical Volume Descriptor
    LogicalVolume(Box<LogicalVolumeDescriptor>),
    /// Partition Descriptor
    Partition(Box<PartitionDescriptor>),
    /// File Set Descriptor
    FileSet(Box<FileSetDescriptor>),
    /// File Entry or Extended File Entry, with the directory entries found
    /// in its allocation descriptor area
    File {
        /// The entry itself
        entry: Box<FileEntry>,
        /// Its File Identifier Descriptor children, in on-disk order
        children: Vec<FileIdentifierDescriptor>,
    },
    /// Any other tagged record, assigned or not
    Other(DescriptorTag),
}

impl Descriptor {
    /// The raw descriptor tag
    pub fn tag(&self) -> &DescriptorTag {
        match self {
            Self::Anchor(d) => &d.tag,
            Self::PrimaryVolume(d) => &d.tag,
            Self::LogicalVolume(d) => &d.tag,
            Self::Partition(d) => &d.tag,
            Self::FileSet(d) => &d.tag,
            Self::File { entry, .. } => &entry.tag,
            Self::Other(tag) => tag,
        }
    }
}

#[derive(Debug, Clone)]
/// A descriptor and the logical block it was found at
pub struct Located {
    /// Logical block address
    pub lba: u32,
    /// The decoded descriptor
    pub descriptor: Descriptor,
}

#[derive(Debug, Clone)]
/// A volume recognition sequence identifier spotted during a full scan
pub struct VrsIdentifier {
    /// Byte offset of the recognition sector
    pub offset: u64,
    /// The five identifier bytes
    pub id: [u8; 5],
}

#[derive(Debug, Clone, Default)]
/// Everything a full scan turned up
pub struct ScanReport {
    /// Volume recognition identifiers, in image order
    pub vrs: Vec<VrsIdentifier>,
    /// Decoded descriptors, in LBA order
    pub descriptors: Vec<Located>,
}

/// An immutable view of a raw image under a chosen block size
///
/// All decoding entry points hang off this context; nothing else carries
/// state between calls
#[derive(Debug, Clone, Copy)]
pub struct UdfImage<'a> {
    data: &'a [u8],
    block_size: u32,
}

impl<'a> UdfImage<'a> {
    /// Creates a decode context over `data`
    pub fn new(data: &'a [u8], block_size: u32) -> Result<Self, io::Error> {
        if block_size == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Block size must be non zero",
            ));
        }
        Ok(Self { data, block_size })
    }

    /// The block size this context decodes under
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Scans the whole image for recognizable structures
    ///
    /// Volume recognition sectors are probed first, then every logical
    /// block up to and including block 256 is tried for an assigned
    /// descriptor tag. Blocks holding anything else are skipped silently;
    /// a descriptor which fails to decode is logged and skipped
    #[instrument(skip_all)]
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        for sector in 0..SCAN_LBA_LIMIT {
            let Ok(buf) = slice_at(self.data, sector * VRS_SECTOR_SIZE) else {
                break;
            };
            let Some(id) = buf.get(0..5) else { break };
            if id.iter().all(|b| *b != 0) {
                report.vrs.push(VrsIdentifier {
                    offset: sector * VRS_SECTOR_SIZE,
                    id: id.try_into().unwrap(), // safe bc get(0..5)
                });
            }
        }
        let last_lba = (self.data.len() as u64 / u64::from(self.block_size)).min(SCAN_LBA_LIMIT);
        for lba in 0..=last_lba {
            let lba = lba as u32; // safe bc SCAN_LBA_LIMIT
            let Ok(buf) = slice_at(self.data, self.block_offset(lba)) else {
                break;
            };
            let Ok(tag) = DescriptorTag::read(buf) else {
                continue;
            };
            if TagKind::from_identifier(tag.identifier).is_none() {
                continue;
            }
            match self.decode_block(lba) {
                Ok(descriptor) => report.descriptors.push(Located { lba, descriptor }),
                Err(e) => warn!("Skipping undecodable descriptor at block {lba}: {e}"),
            }
        }
        report
    }

    /// Decodes the single descriptor recorded at `lba`
    ///
    /// Unassigned tag identifiers yield a tag-only [`Descriptor::Other`];
    /// a read past the end of the image is an error
    #[instrument(skip(self))]
    pub fn decode_block(&self, lba: u32) -> Result<Descriptor, io::Error> {
        let buf = slice_at(self.data, self.block_offset(lba))?;
        let tag = DescriptorTag::read(buf)?;
        Ok(match TagKind::from_identifier(tag.identifier) {
            Some(TagKind::AnchorVolumeDescriptorPointer) => {
                Descriptor::Anchor(AnchorVolumeDescriptorPointer::read(buf)?)
            }
            Some(TagKind::PrimaryVolumeDescriptor) => {
                Descriptor::PrimaryVolume(Box::new(PrimaryVolumeDescriptor::read(buf)?))
            }
            Some(TagKind::LogicalVolumeDescriptor) => {
                Descriptor::LogicalVolume(Box::new(LogicalVolumeDescriptor::read(buf)?))
            }
            Some(TagKind::PartitionDescriptor) => {
                Descriptor::Partition(Box::new(PartitionDescriptor::read(buf)?))
            }
            Some(TagKind::FileSetDescriptor) => {
                Descriptor::FileSet(Box::new(FileSetDescriptor::read(buf)?))
            }
            Some(TagKind::FileEntry) | Some(TagKind::ExtendedFileEntry) => {
                let entry = FileEntry::read(buf)?;
                let children = walk_directory(buf, &entry);
                Descriptor::File {
                    entry: Box::new(entry),
                    children,
                }
            }
            _ => Descriptor::Other(tag),
        })
    }

    fn block_offset(&self, lba: u32) -> u64 {
        u64::from(lba) * u64::from(self.block_size)
    }
}

/// Collects the File Identifier Descriptors recorded in the allocation
/// descriptor area of a file entry
///
/// `buf` starts at the entry itself. The walk is bounded by the recorded
/// allocation descriptor length and never reads past the end of the input:
/// an unexpected tag or a truncated record ends the walk with the children
/// gathered so far
#[instrument(skip_all)]
fn walk_directory(buf: &[u8], entry: &FileEntry) -> Vec<FileIdentifierDescriptor> {
    let mut children = Vec::new();
    let total = u64::from(entry.ad_length);
    // the allocation data sits past the extended-entry footprint for both
    // entry flavors
    let base = FileEntry::EXTENDED_LEN as u64 + u64::from(entry.ea_length);
    let mut consumed = 0u64;
    while consumed < total {
        let fid = match slice_at(buf, base + consumed).and_then(FileIdentifierDescriptor::read) {
            Ok(fid) => fid,
            Err(e) => {
                debug!("Directory walk ended after {} entries: {e}", children.len());
                break;
            }
        };
        consumed += fid.on_disk_len();
        children.push(fid);
    }
    children
}

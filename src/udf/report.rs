//! Field-labeled text dumps of decoded structures
//!
//! The output is the stable contract of the dump command: fixed field order
//! per structure, hex values, and a printable rendering next to byte-array
//! identifiers, so runs over the same image diff clean

use super::ecma167::*;
use super::{Descriptor, Located, VrsIdentifier};
use std::io::{self, Write};

/// Renders bytes as printable ASCII, zero bytes skipped and anything else
/// non-printable replaced
pub fn lossy_ascii(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|b| **b != 0)
        .map(|b| {
            if (0x20..=0x7e).contains(b) {
                *b as char
            } else {
                '.'
            }
        })
        .collect()
}

fn hexlify(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// One "label : value" line; labels are padded so the colons line up at the
/// same column at either nesting depth
fn field<W: Write>(
    w: &mut W,
    indent: usize,
    label: &str,
    value: std::fmt::Arguments,
) -> Result<(), io::Error> {
    let pad = 33usize.saturating_sub(indent);
    writeln!(w, "{:indent$}{label:<pad$}: {value}", "")
}

fn bytes_field<W: Write>(
    w: &mut W,
    indent: usize,
    label: &str,
    bytes: &[u8],
) -> Result<(), io::Error> {
    field(
        w,
        indent,
        label,
        format_args!("{} ({})", hexlify(bytes), lossy_ascii(bytes)),
    )
}

fn write_tag<W: Write>(w: &mut W, tag: &DescriptorTag) -> Result<(), io::Error> {
    field(
        w,
        4,
        "TagIdentifier",
        format_args!("0x{:04x} ({})", tag.identifier, tag_name(tag.identifier)),
    )?;
    field(
        w,
        4,
        "DescriptorVersion",
        format_args!("0x{:04x}", tag.version),
    )?;
    let verdict = if tag.checksum_ok { "" } else { " (mismatch)" };
    field(
        w,
        4,
        "TagChecksum",
        format_args!("0x{:02x}{verdict}", tag.checksum),
    )?;
    field(
        w,
        4,
        "TagSerialNumber",
        format_args!("0x{:04x}", tag.serial_number),
    )?;
    let verdict = match tag.crc_ok {
        Some(false) => " (mismatch)",
        _ => "",
    };
    field(
        w,
        4,
        "DescriptorCRC",
        format_args!("0x{:04x}{verdict}", tag.crc),
    )?;
    field(
        w,
        4,
        "DescriptorCRCLength",
        format_args!("0x{:04x}", tag.crclen),
    )?;
    field(w, 4, "TagLocation", format_args!("0x{:08x}", tag.lba))
}

fn write_extent_ad<W: Write>(w: &mut W, ad: &ExtentAD) -> Result<(), io::Error> {
    field(w, 4, "ExtentLength", format_args!("0x{:08x}", ad.length))?;
    field(w, 4, "ExtentLocation", format_args!("0x{:08x}", ad.lba))
}

fn write_long_ad<W: Write>(w: &mut W, ad: &LongAD) -> Result<(), io::Error> {
    field(w, 4, "ExtentLength", format_args!("0x{:08x}", ad.length))?;
    field(
        w,
        4,
        "ExtLocLogicalBlockNumber",
        format_args!("0x{:08x}", ad.lba),
    )?;
    field(
        w,
        4,
        "ExtLocPartitionReferenceNumb",
        format_args!("0x{:04x}", ad.part_num),
    )?;
    bytes_field(w, 4, "ImplementationUse", &ad.impl_use)
}

fn write_charspec<W: Write>(w: &mut W, cs: &CharSpec) -> Result<(), io::Error> {
    field(
        w,
        4,
        "CharacterSetType",
        format_args!("0x{:02x}", cs.cset_type),
    )?;
    bytes_field(w, 4, "CharacterSetInfo", &cs.cset_info)
}

fn write_domain_entity<W: Write>(w: &mut W, e: &DomainEntityId) -> Result<(), io::Error> {
    field(w, 4, "Flags", format_args!("0x{:02x}", e.flags))?;
    bytes_field(w, 4, "Identifier", &e.identifier)?;
    field(w, 4, "UdfRevision", format_args!("0x{:04x}", e.udf_revision))?;
    field(w, 4, "DomainFlags", format_args!("0x{:02x}", e.domain_flags))
}

fn write_impl_entity<W: Write>(w: &mut W, e: &ImplEntityId) -> Result<(), io::Error> {
    field(w, 4, "Flags", format_args!("0x{:02x}", e.flags))?;
    bytes_field(w, 4, "Identifier", &e.identifier)?;
    field(w, 4, "OSClass", format_args!("0x{:02x}", e.os_class))?;
    field(
        w,
        4,
        "OSIdentifier",
        format_args!("0x{:02x}", e.os_identifier),
    )?;
    bytes_field(w, 4, "ImplementationUseArea", &e.impl_use)
}

fn write_app_entity<W: Write>(w: &mut W, e: &AppEntityId) -> Result<(), io::Error> {
    field(w, 4, "Flags", format_args!("0x{:02x}", e.flags))?;
    bytes_field(w, 4, "Identifier", &e.identifier)?;
    bytes_field(w, 4, "ApplicationUseArea", &e.app_use)
}

fn write_entity<W: Write>(w: &mut W, e: &EntityId) -> Result<(), io::Error> {
    field(w, 4, "Flags", format_args!("0x{:02x}", e.flags))?;
    bytes_field(w, 4, "Identifier", &e.identifier)?;
    bytes_field(w, 4, "Data", &e.data)
}

fn write_timestamp<W: Write>(w: &mut W, ts: &Timestamp) -> Result<(), io::Error> {
    field(
        w,
        4,
        "TypeAndTimezone",
        format_args!("0x{:04x} ({})", ts.type_and_timezone, ts.type_and_timezone),
    )?;
    field(
        w,
        4,
        "Year",
        format_args!("0x{:04x} ({})", ts.year as u16, ts.year),
    )?;
    field(w, 4, "Month", format_args!("0x{:02x} ({})", ts.month, ts.month))?;
    field(w, 4, "Day", format_args!("0x{:02x} ({})", ts.day, ts.day))?;
    field(w, 4, "Hour", format_args!("0x{:02x} ({})", ts.hour, ts.hour))?;
    field(
        w,
        4,
        "Minute",
        format_args!("0x{:02x} ({})", ts.minute, ts.minute),
    )?;
    field(
        w,
        4,
        "Second",
        format_args!("0x{:02x} ({})", ts.second, ts.second),
    )?;
    field(
        w,
        4,
        "Centiseconds",
        format_args!("0x{:02x} ({})", ts.centiseconds, ts.centiseconds),
    )?;
    field(
        w,
        4,
        "HundredsOfMicroseconds",
        format_args!(
            "0x{:02x} ({})",
            ts.hundreds_of_microseconds, ts.hundreds_of_microseconds
        ),
    )?;
    field(
        w,
        4,
        "Microseconds",
        format_args!("0x{:02x} ({})", ts.microseconds, ts.microseconds),
    )
}

fn write_icb_tag<W: Write>(w: &mut W, icb: &ICBTag) -> Result<(), io::Error> {
    field(
        w,
        4,
        "PriorRecordNumberOfDirectEnt",
        format_args!("0x{:08x}", icb.prior_entries),
    )?;
    field(
        w,
        4,
        "StrategyType",
        format_args!("0x{:04x}", icb.strategy_type),
    )?;
    field(
        w,
        4,
        "StrategyParameter",
        format_args!("0x{:04x}", icb.strategy_parameter),
    )?;
    field(
        w,
        4,
        "MaximumNumberOfEntries",
        format_args!("0x{:04x}", icb.max_entries),
    )?;
    field(
        w,
        4,
        "FileType",
        format_args!("0x{:02x} ({})", icb.file_type, icb.kind().name()),
    )?;
    field(
        w,
        4,
        "ParentIcbLocationLogicalBlock",
        format_args!("0x{:08x}", icb.parent_icb_lba),
    )?;
    field(
        w,
        4,
        "ParentIcbLocationPartitionRef",
        format_args!("0x{:04x}", icb.parent_icb_part),
    )?;
    field(
        w,
        4,
        "Flags",
        format_args!("0x{:04x} ({})", icb.flags, icb.ad_type().name()),
    )
}

fn write_anchor<W: Write>(w: &mut W, d: &AnchorVolumeDescriptorPointer) -> Result<(), io::Error> {
    writeln!(w, "AnchorVolumeDesc:")?;
    writeln!(w, "  DescriptorTag:")?;
    write_tag(w, &d.tag)?;
    writeln!(w, "  MainVolumeDescriptorSequenceExtent:")?;
    write_extent_ad(w, &d.main)?;
    writeln!(w, "  ReserveVolumeDescriptorSequenceExtent:")?;
    write_extent_ad(w, &d.reserve)
}

fn write_primary_volume<W: Write>(
    w: &mut W,
    d: &PrimaryVolumeDescriptor,
) -> Result<(), io::Error> {
    writeln!(w, "PrimaryVolumeDesc:")?;
    writeln!(w, "  DescriptorTag:")?;
    write_tag(w, &d.tag)?;
    field(
        w,
        2,
        "VolumeDescriptorSequenceNumber",
        format_args!("0x{:08x}", d.desc_sequence_number),
    )?;
    field(
        w,
        2,
        "PrimaryVolumeDescriptorNumber",
        format_args!("0x{:08x}", d.number),
    )?;
    bytes_field(w, 2, "VolumeIdentifier", &d.identifier)?;
    field(
        w,
        2,
        "VolumeSequenceNumber",
        format_args!("0x{:04x}", d.sequence_number),
    )?;
    field(
        w,
        2,
        "MaximumVolumeSequenceNumber",
        format_args!("0x{:04x}", d.max_sequence_number),
    )?;
    field(
        w,
        2,
        "InterchangeLevel",
        format_args!("0x{:04x}", d.interchange_level),
    )?;
    field(
        w,
        2,
        "MaximumInterchangeLevel",
        format_args!("0x{:04x}", d.max_interchange_level),
    )?;
    field(
        w,
        2,
        "CharacterSetList",
        format_args!("0x{:08x}", d.charset_list),
    )?;
    field(
        w,
        2,
        "MaximumCharacterSetList",
        format_args!("0x{:08x}", d.max_charset_list),
    )?;
    bytes_field(w, 2, "VolumeSetIdentifier", &d.set_identifier)?;
    writeln!(w, "  DescriptorCharacterSet:")?;
    write_charspec(w, &d.desc_charset)?;
    writeln!(w, "  ExplanatoryCharacterSet:")?;
    write_charspec(w, &d.expl_charset)?;
    writeln!(w, "  VolumeAbstract:")?;
    write_extent_ad(w, &d.vol_abstract)?;
    writeln!(w, "  VolumeCopyrightNotice:")?;
    write_extent_ad(w, &d.copyright_notice)?;
    writeln!(w, "  ApplicationIdentifier:")?;
    write_app_entity(w, &d.app_identifier)?;
    writeln!(w, "  RecordingDateAndTime:")?;
    write_timestamp(w, &d.datetime)?;
    writeln!(w, "  ImplementationIdentifier:")?;
    write_impl_entity(w, &d.impl_identifier)?;
    bytes_field(w, 2, "ImplementationUse", &d.impl_use)?;
    field(
        w,
        2,
        "PredecessorVolumeDescriptorSeq",
        format_args!("0x{:08x}", d.predecessor_seq_location),
    )?;
    field(w, 2, "Flags", format_args!("0x{:04x}", d.flags))
}

fn write_logical_volume<W: Write>(
    w: &mut W,
    d: &LogicalVolumeDescriptor,
) -> Result<(), io::Error> {
    writeln!(w, "LogicalVolumeDesc:")?;
    writeln!(w, "  DescriptorTag:")?;
    write_tag(w, &d.tag)?;
    field(
        w,
        2,
        "VolumeDescriptorSequenceNumber",
        format_args!("0x{:08x}", d.desc_sequence_number),
    )?;
    writeln!(w, "  DescriptorCharacterSet:")?;
    write_charspec(w, &d.desc_charset)?;
    bytes_field(w, 2, "LogicalVolumeIdentifier", &d.identifier)?;
    field(
        w,
        2,
        "LogicalBlockSize",
        format_args!("0x{:08x}", d.block_size),
    )?;
    writeln!(w, "  DomainIdentifier:")?;
    write_domain_entity(w, &d.domain_identifier)?;
    writeln!(w, "  LogicalVolumeContentsUse:")?;
    write_long_ad(w, &d.contents_use)?;
    field(
        w,
        2,
        "MapTableLength",
        format_args!("0x{:08x}", d.map_table_length),
    )?;
    field(
        w,
        2,
        "NumberOfPartitionMaps",
        format_args!("0x{:08x}", d.n_partition_maps),
    )?;
    writeln!(w, "  ImplementationIdentifier:")?;
    write_impl_entity(w, &d.impl_identifier)?;
    bytes_field(w, 2, "ImplementationUse", &d.impl_use)?;
    writeln!(w, "  IntegritySequenceExtent:")?;
    write_extent_ad(w, &d.integrity_seq_extent)?;
    field(
        w,
        2,
        "PartitionMaps",
        format_args!("{}", hexlify(&d.partition_maps)),
    )
}

fn write_partition<W: Write>(w: &mut W, d: &PartitionDescriptor) -> Result<(), io::Error> {
    writeln!(w, "PartitionDesc:")?;
    writeln!(w, "  DescriptorTag:")?;
    write_tag(w, &d.tag)?;
    field(
        w,
        2,
        "VolumeDescriptorSequenceNumber",
        format_args!("0x{:08x}", d.desc_sequence_number),
    )?;
    field(w, 2, "PartitionFlags", format_args!("0x{:04x}", d.flags))?;
    field(
        w,
        2,
        "PartitionNumber",
        format_args!("0x{:04x}", d.partition_number),
    )?;
    writeln!(w, "  PartitionContents:")?;
    write_entity(w, &d.contents)?;
    bytes_field(w, 2, "PartitionContentsUse", &d.contents_use)?;
    field(w, 2, "AccessType", format_args!("0x{:08x}", d.access_type))?;
    field(
        w,
        2,
        "PartitionStartingLocation",
        format_args!("0x{:08x}", d.starting_location),
    )?;
    field(w, 2, "PartitionLength", format_args!("0x{:08x}", d.length))?;
    writeln!(w, "  ImplementationIdentifier:")?;
    write_impl_entity(w, &d.impl_identifier)?;
    bytes_field(w, 2, "ImplementationUse", &d.impl_use)
}

fn write_fileset<W: Write>(w: &mut W, d: &FileSetDescriptor) -> Result<(), io::Error> {
    writeln!(w, "FileSetDesc:")?;
    writeln!(w, "  DescriptorTag:")?;
    write_tag(w, &d.tag)?;
    writeln!(w, "  RecordingDateAndTime:")?;
    write_timestamp(w, &d.datetime)?;
    field(
        w,
        2,
        "InterchangeLevel",
        format_args!("0x{:04x}", d.interchange_level),
    )?;
    field(
        w,
        2,
        "MaximumInterchangeLevel",
        format_args!("0x{:04x}", d.max_interchange_level),
    )?;
    field(
        w,
        2,
        "CharacterSetList",
        format_args!("0x{:08x}", d.charset_list),
    )?;
    field(
        w,
        2,
        "MaximumCharacterSetList",
        format_args!("0x{:08x}", d.max_charset_list),
    )?;
    field(
        w,
        2,
        "FileSetNumber",
        format_args!("0x{:08x}", d.fileset_number),
    )?;
    field(
        w,
        2,
        "FileSetDescriptorNumber",
        format_args!("0x{:08x}", d.fileset_desc_number),
    )?;
    writeln!(w, "  LogicalVolumeIdentifierCharacterSet:")?;
    write_charspec(w, &d.lv_id_charset)?;
    bytes_field(w, 2, "LogicalVolumeIdentifier", &d.lv_id)?;
    writeln!(w, "  FileSetCharacterSet:")?;
    write_charspec(w, &d.fileset_charset)?;
    bytes_field(w, 2, "FileSetIdentifier", &d.fileset_id)?;
    bytes_field(w, 2, "CopyrightFileIdentifier", &d.copyright_file_id)?;
    bytes_field(w, 2, "AbstractFileIdentifier", &d.abstract_file_id)?;
    writeln!(w, "  RootDirectoryIcb:")?;
    write_long_ad(w, &d.root_dir_icb)?;
    writeln!(w, "  DomainIdentifier:")?;
    write_domain_entity(w, &d.domain_identifier)?;
    writeln!(w, "  NextExtent:")?;
    write_long_ad(w, &d.next_extent)?;
    writeln!(w, "  SystemStreamDirectoryIcb:")?;
    write_long_ad(w, &d.system_stream_dir_icb)
}

fn write_file_entry<W: Write>(
    w: &mut W,
    entry: &FileEntry,
    children: &[FileIdentifierDescriptor],
) -> Result<(), io::Error> {
    if entry.is_extended() {
        writeln!(w, "ExtFileEntry:")?;
    } else {
        writeln!(w, "FileEntry:")?;
    }
    writeln!(w, "  DescriptorTag:")?;
    write_tag(w, &entry.tag)?;
    writeln!(w, "  IcbTag:")?;
    write_icb_tag(w, &entry.icb_tag)?;
    field(w, 2, "Uid", format_args!("0x{:08x}", entry.uid))?;
    field(w, 2, "Gid", format_args!("0x{:08x}", entry.gid))?;
    field(
        w,
        2,
        "Permissions",
        format_args!("0x{:08x}", entry.permissions),
    )?;
    field(
        w,
        2,
        "FileLinkCount",
        format_args!("0x{:04x}", entry.file_link_count),
    )?;
    field(
        w,
        2,
        "RecordFormat",
        format_args!("0x{:02x}", entry.record_format),
    )?;
    field(
        w,
        2,
        "RecordDisplayAttributes",
        format_args!("0x{:02x}", entry.record_display_attributes),
    )?;
    field(
        w,
        2,
        "RecordLength",
        format_args!("0x{:08x}", entry.record_length),
    )?;
    field(
        w,
        2,
        "InformationLength",
        format_args!("0x{:016x}", entry.information_length),
    )?;
    if let Some(object_size) = entry.object_size {
        field(w, 2, "ObjectSize", format_args!("0x{object_size:016x}"))?;
    }
    field(
        w,
        2,
        "LogicalBlocksRecorded",
        format_args!("0x{:016x}", entry.logical_blocks_recorded),
    )?;
    writeln!(w, "  AccessTime:")?;
    write_timestamp(w, &entry.access_time)?;
    writeln!(w, "  ModificationTime:")?;
    write_timestamp(w, &entry.modification_time)?;
    if let Some(creation_time) = &entry.creation_time {
        writeln!(w, "  CreationTime:")?;
        write_timestamp(w, creation_time)?;
    }
    writeln!(w, "  AttributeTime:")?;
    write_timestamp(w, &entry.attribute_time)?;
    field(
        w,
        2,
        "CheckPoint",
        format_args!("0x{:08x}", entry.checkpoint),
    )?;
    writeln!(w, "  ExtendedAttributeIcb:")?;
    write_long_ad(w, &entry.extended_attribute_icb)?;
    if let Some(stream_directory_icb) = &entry.stream_directory_icb {
        writeln!(w, "  StreamDirectoryIcb:")?;
        write_long_ad(w, stream_directory_icb)?;
    }
    writeln!(w, "  ImplementationIdentifier:")?;
    write_impl_entity(w, &entry.impl_identifier)?;
    field(
        w,
        2,
        "UniqueId",
        format_args!("0x{:016x}", entry.unique_id),
    )?;
    field(
        w,
        2,
        "LengthOfExtendedAttributes",
        format_args!("0x{:08x}", entry.ea_length),
    )?;
    field(
        w,
        2,
        "LengthOfAllocationDescriptors",
        format_args!("0x{:08x}", entry.ad_length),
    )?;
    for fid in children {
        write_fid(w, fid)?;
    }
    Ok(())
}

fn write_fid<W: Write>(w: &mut W, fid: &FileIdentifierDescriptor) -> Result<(), io::Error> {
    writeln!(w, "FileIdentifierDesc:")?;
    writeln!(w, "  DescriptorTag:")?;
    write_tag(w, &fid.tag)?;
    field(
        w,
        2,
        "FileVersionNumber",
        format_args!("0x{:04x}", fid.version_number),
    )?;
    field(
        w,
        2,
        "FileCharacteristics",
        format_args!("0x{:02x}", fid.characteristics),
    )?;
    field(
        w,
        2,
        "LengthOfFileIdentifier",
        format_args!("0x{:02x}", fid.id_len),
    )?;
    writeln!(w, "  Icb:")?;
    write_long_ad(w, &fid.icb)?;
    field(
        w,
        2,
        "LengthOfImplementationUse",
        format_args!("0x{:04x}", fid.iu_len),
    )?;
    field(
        w,
        2,
        "FileIdentifier",
        format_args!("{}", fid.display_name()),
    )
}

fn write_tag_only<W: Write>(w: &mut W, tag: &DescriptorTag) -> Result<(), io::Error> {
    writeln!(w, "  DescriptorTag:")?;
    write_tag(w, tag)
}

/// Dumps a single decoded descriptor
pub fn write_descriptor<W: Write>(w: &mut W, descriptor: &Descriptor) -> Result<(), io::Error> {
    match descriptor {
        Descriptor::Anchor(d) => write_anchor(w, d),
        Descriptor::PrimaryVolume(d) => write_primary_volume(w, d),
        Descriptor::LogicalVolume(d) => write_logical_volume(w, d),
        Descriptor::Partition(d) => write_partition(w, d),
        Descriptor::FileSet(d) => write_fileset(w, d),
        Descriptor::File { entry, children } => write_file_entry(w, entry, children),
        Descriptor::Other(tag) => write_tag_only(w, tag),
    }
}

/// Dumps one volume recognition identifier spotted during a scan
pub fn write_vrs_line<W: Write>(w: &mut W, vrs: &VrsIdentifier) -> Result<(), io::Error> {
    writeln!(
        w,
        "  VolDesc(0x{:x}, {}) : {}",
        vrs.offset,
        vrs.offset,
        lossy_ascii(&vrs.id)
    )
}

/// Dumps a scan hit under its location header
pub fn write_located<W: Write>(
    w: &mut W,
    block_size: u32,
    item: &Located,
) -> Result<(), io::Error> {
    let offset = u64::from(item.lba) * u64::from(block_size);
    writeln!(
        w,
        "(LBA: 0x{:x}, {}) (BlockSize * LBA: 0x{:x}, {}):",
        item.lba, item.lba, offset, offset
    )?;
    write_descriptor(w, &item.descriptor)
}

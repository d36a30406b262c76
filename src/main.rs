mod config;

use std::io::{self, Write};
use std::path::Path;
#[allow(unused_imports)]
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::prelude::*;
use udfseed::udf::{
    self, Descriptor, Located, UdfImage,
    ecma167::*,
    report,
    seed::{self, SeedGeometry},
};

fn usage(me: &str) -> ! {
    eprintln!("Usage:");
    eprintln!(
        "{} dump <input_file> [--Lba <dec|0xhex>] [--BlockSize <dec|0xhex>] [--json]",
        me
    );
    eprintln!("  Dumps the UDF structures found in <input_file>");
    eprintln!("  With no --Lba (or 0) the whole image is scanned;");
    eprintln!("  otherwise only the descriptor at that block is decoded");
    eprintln!("  With no --BlockSize the block size is auto detected");
    eprintln!("{} gen -o <output_file>", me);
    eprintln!("  Writes a minimal valid-shaped UDF seed image to <output_file>");
    std::process::exit(1);
}

/// Parses a decimal or `0x`-prefixed hexadecimal number
fn parse_num(s: &str) -> Result<u64, std::num::ParseIntError> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse()
    }
}

fn main() -> Result<(), io::Error> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let me = args.first().map(String::as_str).unwrap_or("udfseed");
    match args.get(1).map(String::as_str) {
        Some("dump") => run_dump(me, &args[2..]),
        Some("gen") => run_gen(me, &args[2..]),
        _ => usage(me),
    }
}

fn run_dump(me: &str, args: &[String]) -> Result<(), io::Error> {
    let mut input: Option<&str> = None;
    let mut lba = 0u32;
    let mut block_size: Option<u32> = None;
    let mut json = false;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--Lba" => {
                let Some(v) = it.next().and_then(|v| parse_num(v).ok()) else {
                    usage(me);
                };
                let Ok(v) = u32::try_from(v) else { usage(me) };
                lba = v;
            }
            "--BlockSize" => {
                let Some(v) = it.next().and_then(|v| parse_num(v).ok()) else {
                    usage(me);
                };
                match u32::try_from(v) {
                    Ok(v) if v > 0 => block_size = Some(v),
                    _ => usage(me),
                }
            }
            "--json" => json = true,
            v if input.is_none() && !v.starts_with("--") => input = Some(v),
            _ => usage(me),
        }
    }
    let Some(input) = input else { usage(me) };

    let data = std::fs::read(input).map_err(|e| {
        eprintln!("Failed to open {}: {}", input, e);
        e
    })?;
    let block_size = match block_size {
        Some(bs) => bs,
        None => match udf::detect_block_size(&data) {
            Some(bs) => {
                if !json {
                    println!("detect BlockSize - {bs}");
                }
                bs
            }
            None => {
                eprintln!("detect BlockSize - not detected");
                std::process::exit(1);
            }
        },
    };
    let image = UdfImage::new(&data, block_size)?;
    let stdout = io::stdout();
    let mut w = stdout.lock();
    if lba == 0 {
        let scan = image.scan();
        if json {
            let out = ScanJson {
                block_size,
                vrs: scan.vrs.iter().map(Into::into).collect(),
                descriptors: scan
                    .descriptors
                    .iter()
                    .map(|item| descriptor_json(block_size, item))
                    .collect(),
            };
            writeln!(w, "{}", serde_json::to_string_pretty(&out)?)?;
        } else {
            for vrs in &scan.vrs {
                report::write_vrs_line(&mut w, vrs)?;
            }
            writeln!(w, "\n")?;
            writeln!(w, "UDF binary:")?;
            for item in &scan.descriptors {
                report::write_located(&mut w, block_size, item)?;
                writeln!(w)?;
            }
        }
    } else {
        let descriptor = image.decode_block(lba).map_err(|e| {
            eprintln!("Failed to decode block 0x{lba:x}: {e}");
            e
        })?;
        if json {
            let item = Located { lba, descriptor };
            let out = descriptor_json(block_size, &item);
            writeln!(w, "{}", serde_json::to_string_pretty(&out)?)?;
        } else {
            writeln!(w, "UDF binary (LBA: 0x{lba:x}, BlockSize: 0x{block_size:x})")?;
            report::write_descriptor(&mut w, &descriptor)?;
        }
    }
    Ok(())
}

fn run_gen(me: &str, args: &[String]) -> Result<(), io::Error> {
    let mut output: Option<&str> = None;
    let mut it = args.iter();
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "-o" | "--output" => output = it.next().map(String::as_str),
            _ => usage(me),
        }
    }
    let Some(output) = output else { usage(me) };

    let config = config::Config::new().map_err(|e| {
        eprintln!("Invalid configuration: {e}");
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;
    let geometry = SeedGeometry {
        total_size: config.total_size,
        block_size: config.block_size,
        correction_blocks: config.correction_blocks,
    };
    let image = seed::build(&geometry)?;

    // The image lands at its final path in one move, partial files are
    // never observable
    let output = Path::new(output);
    let dir = match output.parent() {
        Some(d) if d != Path::new("") => d,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(&image)?;
    tmp.flush()?;
    tmp.persist(output).map_err(|e| {
        eprintln!("Failed to write {}: {}", output.display(), e);
        e.error
    })?;
    info!("Wrote {} bytes to {}", image.len(), output.display());
    Ok(())
}

#[derive(serde::Serialize)]
struct ScanJson {
    /// The block size the scan ran under
    block_size: u32,
    /// Volume recognition identifiers
    vrs: Vec<VrsJson>,
    /// Decoded descriptors
    descriptors: Vec<DescriptorJson>,
}

#[derive(serde::Serialize)]
struct VrsJson {
    /// Byte offset of the recognition sector
    offset: u64,
    /// The identifier rendered as text
    id: String,
}

impl From<&udf::VrsIdentifier> for VrsJson {
    fn from(vrs: &udf::VrsIdentifier) -> Self {
        Self {
            offset: vrs.offset,
            id: report::lossy_ascii(&vrs.id),
        }
    }
}

#[derive(serde::Serialize)]
struct DescriptorJson {
    /// Logical block address
    lba: u32,
    /// Byte offset of the block
    offset: u64,
    /// Descriptor kind display name
    kind: &'static str,
    /// The descriptor tag
    tag: TagSummary,
    /// Kind-specific fields
    detail: serde_json::Value,
}

fn descriptor_json(block_size: u32, item: &Located) -> DescriptorJson {
    let detail = match &item.descriptor {
        Descriptor::Anchor(d) => serde_json::to_value(AnchorSummary::from(d)).unwrap(),
        Descriptor::PrimaryVolume(d) => {
            serde_json::to_value(PrimaryVolumeSummary::from(d.as_ref())).unwrap()
        }
        Descriptor::LogicalVolume(d) => {
            serde_json::to_value(LogicalVolumeSummary::from(d.as_ref())).unwrap()
        }
        Descriptor::Partition(d) => {
            serde_json::to_value(PartitionSummary::from(d.as_ref())).unwrap()
        }
        Descriptor::FileSet(d) => serde_json::to_value(FileSetSummary::from(d.as_ref())).unwrap(),
        Descriptor::File { entry, children } => {
            serde_json::to_value(FileEntrySummary::new(entry, children)).unwrap()
        }
        Descriptor::Other(_) => serde_json::Value::Null,
    };
    let tag = item.descriptor.tag();
    DescriptorJson {
        lba: item.lba,
        offset: u64::from(item.lba) * u64::from(block_size),
        kind: tag_name(tag.identifier),
        tag: tag.into(),
        detail,
    }
}

#[derive(serde::Serialize)]
struct TagSummary {
    /// Tag Identifier
    identifier: u16,
    /// Descriptor Version
    version: u16,
    /// Tag Serial Number
    serial_number: u16,
    /// Descriptor CRC
    crc: u16,
    /// Descriptor CRC Length
    crc_length: usize,
    /// Tag Location
    location: u32,
    /// Whether the recorded checksum matches the header bytes
    checksum_ok: bool,
    /// Whether the recorded CRC matches the descriptor body
    crc_ok: Option<bool>,
}

impl From<&DescriptorTag> for TagSummary {
    fn from(tag: &DescriptorTag) -> Self {
        Self {
            identifier: tag.identifier,
            version: tag.version,
            serial_number: tag.serial_number,
            crc: tag.crc,
            crc_length: tag.crclen,
            location: tag.lba,
            checksum_ok: tag.checksum_ok,
            crc_ok: tag.crc_ok,
        }
    }
}

#[derive(serde::Serialize)]
struct ExtentSummary {
    /// Extent Length
    length: u32,
    /// Extent Location
    location: u32,
}

impl From<&ExtentAD> for ExtentSummary {
    fn from(ad: &ExtentAD) -> Self {
        Self {
            length: ad.length,
            location: ad.lba,
        }
    }
}

#[derive(serde::Serialize)]
struct LongAdSummary {
    /// Extent Length
    length: u32,
    /// Extent Location, Logical Block Number
    block: u32,
    /// Extent Location, Partition Reference Number
    partition: u16,
}

impl From<&LongAD> for LongAdSummary {
    fn from(ad: &LongAD) -> Self {
        Self {
            length: ad.length,
            block: ad.lba,
            partition: ad.part_num,
        }
    }
}

#[derive(serde::Serialize)]
struct AnchorSummary {
    /// Main Volume Descriptor Sequence Extent
    main: ExtentSummary,
    /// Reserve Volume Descriptor Sequence Extent
    reserve: ExtentSummary,
}

impl From<&AnchorVolumeDescriptorPointer> for AnchorSummary {
    fn from(d: &AnchorVolumeDescriptorPointer) -> Self {
        Self {
            main: (&d.main).into(),
            reserve: (&d.reserve).into(),
        }
    }
}

#[derive(serde::Serialize)]
struct PrimaryVolumeSummary {
    /// Volume Descriptor Sequence Number
    seq: u32,
    /// Primary Volume Descriptor Number
    number: u32,
    /// Volume Identifier
    identifier: String,
    /// Volume Sequence Number
    sequence_number: u16,
    /// Maximum Volume Sequence Number
    max_sequence_number: u16,
    /// Interchange Level
    interchange_level: u16,
    /// Maximum Interchange Level
    max_interchange_level: u16,
    /// Volume Set Identifier
    set_identifier: String,
    /// Volume Abstract
    has_abstract: bool,
    /// Volume Copyright Notice
    has_copyright: bool,
    /// Application Identifier
    app_identifier: String,
    /// Recording Date and Time
    datetime: Option<String>,
    /// Recording Date and Time
    timestamp: Option<i64>,
    /// Predecessor Volume Descriptor Sequence Location
    predecessor_seq_location: u32,
}

impl From<&PrimaryVolumeDescriptor> for PrimaryVolumeSummary {
    fn from(pvd: &PrimaryVolumeDescriptor) -> Self {
        let datetime = pvd.datetime.resolve();
        Self {
            seq: pvd.desc_sequence_number,
            number: pvd.number,
            identifier: report::lossy_ascii(&pvd.identifier),
            sequence_number: pvd.sequence_number,
            max_sequence_number: pvd.max_sequence_number,
            interchange_level: pvd.interchange_level,
            max_interchange_level: pvd.max_interchange_level,
            set_identifier: report::lossy_ascii(&pvd.set_identifier),
            has_abstract: pvd.vol_abstract.length != 0,
            has_copyright: pvd.copyright_notice.length != 0,
            app_identifier: pvd.app_identifier.lossy_identifier(),
            datetime: datetime.to_string_maybe(),
            timestamp: datetime.to_ts_maybe(),
            predecessor_seq_location: pvd.predecessor_seq_location,
        }
    }
}

#[derive(serde::Serialize)]
struct LogicalVolumeSummary {
    /// Volume Descriptor Sequence Number
    seq: u32,
    /// Logical Volume Identifier
    identifier: String,
    /// Logical Block Size
    block_size: u32,
    /// Domain Identifier
    domain_identifier: String,
    /// Logical Volume Contents Use
    contents_use: LongAdSummary,
    /// Map Table Length
    map_table_length: u32,
    /// Number of Partition Maps
    num_partition_maps: u32,
    /// Implementation Identifier
    impl_identifier: String,
}

impl From<&LogicalVolumeDescriptor> for LogicalVolumeSummary {
    fn from(lvd: &LogicalVolumeDescriptor) -> Self {
        Self {
            seq: lvd.desc_sequence_number,
            identifier: report::lossy_ascii(&lvd.identifier),
            block_size: lvd.block_size,
            domain_identifier: lvd.domain_identifier.lossy_identifier(),
            contents_use: (&lvd.contents_use).into(),
            map_table_length: lvd.map_table_length,
            num_partition_maps: lvd.n_partition_maps,
            impl_identifier: lvd.impl_identifier.lossy_identifier(),
        }
    }
}

#[derive(serde::Serialize)]
struct PartitionSummary {
    /// Volume Descriptor Sequence Number
    seq: u32,
    /// Whether the area is allocated
    alloc: bool,
    /// Partition Number
    number: u16,
    /// Partition Contents
    contents: String,
    /// Access Type
    access: String,
    /// Partition Starting Location
    starting_location: u32,
    /// Partition Length
    length: u32,
    /// Implementation Identifier
    impl_identifier: String,
}

impl From<&PartitionDescriptor> for PartitionSummary {
    fn from(pd: &PartitionDescriptor) -> Self {
        Self {
            seq: pd.desc_sequence_number,
            alloc: pd.flags & 1 != 0,
            number: pd.partition_number,
            contents: pd.contents.lossy_identifier(),
            access: match pd.access_type {
                0 => "PseudoOverwriteable".to_string(),
                1 => "ReadOnly".to_string(),
                2 => "WriteOnce".to_string(),
                3 => "Rewriteable".to_string(),
                4 => "Overwriteable".to_string(),
                v => format!("Invalid({v})"),
            },
            starting_location: pd.starting_location,
            length: pd.length,
            impl_identifier: pd.impl_identifier.lossy_identifier(),
        }
    }
}

#[derive(serde::Serialize)]
struct FileSetSummary {
    /// Recording Date and Time
    datetime: Option<String>,
    /// Recording Date and Time
    timestamp: Option<i64>,
    /// File Set Number
    fileset_number: u32,
    /// File Set Descriptor Number
    fileset_desc_number: u32,
    /// Logical Volume Identifier
    lv_identifier: String,
    /// File Set Identifier
    fileset_identifier: String,
    /// Root Directory ICB
    root_dir_icb: LongAdSummary,
    /// Domain Identifier
    domain_identifier: String,
}

impl From<&FileSetDescriptor> for FileSetSummary {
    fn from(fsd: &FileSetDescriptor) -> Self {
        let datetime = fsd.datetime.resolve();
        Self {
            datetime: datetime.to_string_maybe(),
            timestamp: datetime.to_ts_maybe(),
            fileset_number: fsd.fileset_number,
            fileset_desc_number: fsd.fileset_desc_number,
            lv_identifier: report::lossy_ascii(&fsd.lv_id),
            fileset_identifier: report::lossy_ascii(&fsd.fileset_id),
            root_dir_icb: (&fsd.root_dir_icb).into(),
            domain_identifier: fsd.domain_identifier.lossy_identifier(),
        }
    }
}

#[derive(serde::Serialize)]
struct FileEntrySummary {
    /// Whether this is an Extended File Entry
    extended: bool,
    /// The kind of object the ICB describes
    file_type: &'static str,
    /// The allocation descriptor shape
    ad_type: &'static str,
    /// Uid
    uid: u32,
    /// Gid
    gid: u32,
    /// Permissions
    permissions: u32,
    /// Permissions rendered as a string
    perms_str: String,
    /// File Link Count
    links: u16,
    /// Information Length
    information_length: u64,
    /// Object Size
    object_size: Option<u64>,
    /// Unique Id
    unique_id: u64,
    /// Length of Extended Attributes
    ea_length: u32,
    /// Length of Allocation Descriptors
    ad_length: u32,
    /// Directory entries found in the allocation descriptor area
    children: Vec<ChildSummary>,
}

impl FileEntrySummary {
    fn new(entry: &FileEntry, children: &[FileIdentifierDescriptor]) -> Self {
        Self {
            extended: entry.is_extended(),
            file_type: entry.icb_tag.kind().name(),
            ad_type: entry.icb_tag.ad_type().name(),
            uid: entry.uid,
            gid: entry.gid,
            permissions: entry.permissions,
            perms_str: entry.perms_str(),
            links: entry.file_link_count,
            information_length: entry.information_length,
            object_size: entry.object_size,
            unique_id: entry.unique_id,
            ea_length: entry.ea_length,
            ad_length: entry.ad_length,
            children: children.iter().map(Into::into).collect(),
        }
    }
}

#[derive(serde::Serialize)]
struct ChildSummary {
    /// The identifier rendered as text
    name: String,
    /// File Version Number
    version: u16,
    /// Whether the characteristics mark a directory
    directory: bool,
    /// Whether the characteristics mark a deleted entry
    deleted: bool,
    /// Whether the characteristics mark the parent entry
    parent: bool,
    /// ICB
    icb: LongAdSummary,
}

impl From<&FileIdentifierDescriptor> for ChildSummary {
    fn from(fid: &FileIdentifierDescriptor) -> Self {
        Self {
            name: fid.display_name(),
            version: fid.version_number,
            directory: fid.is_directory(),
            deleted: fid.is_deleted(),
            parent: fid.is_parent(),
            icb: (&fid.icb).into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::parse_num;

    #[test]
    fn mixed_radix_numbers() {
        assert_eq!(parse_num("256").unwrap(), 256);
        assert_eq!(parse_num("0x100").unwrap(), 256);
        assert_eq!(parse_num("0X800").unwrap(), 2048);
        assert_eq!(parse_num("0").unwrap(), 0);
        assert!(parse_num("garbage").is_err());
        assert!(parse_num("0x").is_err());
        assert!(parse_num("12g").is_err());
        assert!(parse_num("-1").is_err());
    }
}

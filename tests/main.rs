use udfseed::udf::{
    Descriptor, UdfImage, detect_block_size,
    ecma167::{DescriptorTag, TagKind},
    report,
    seed::{self, SeedGeometry},
};

/// Stamps a minimal Extended File Entry at `offset`, all fields zero apart
/// from the tag and the two trailing length fields
fn put_extended_entry(buf: &mut [u8], offset: usize, lba: u32, ea_length: u32, ad_length: u32) {
    let mut body = vec![0u8; 200];
    body[192..196].copy_from_slice(&ea_length.to_le_bytes());
    body[196..200].copy_from_slice(&ad_length.to_le_bytes());
    let tag = DescriptorTag::stamped(TagKind::ExtendedFileEntry, lba, &body);
    let mut out = Vec::new();
    tag.write_to(&mut out).expect("tag must serialize");
    out.extend_from_slice(&body);
    buf[offset..offset + out.len()].copy_from_slice(&out);
}

/// Serializes a File Identifier Descriptor; `name` excludes the compression
/// code byte, which is prepended
fn fid_bytes(name: &[u8], impl_use: &[u8]) -> Vec<u8> {
    let id_len = name.len() + 1;
    let unpadded = 38 + impl_use.len() + id_len;
    let padded = (unpadded + 3) & !3;
    let mut body = vec![0u8; padded - 16];
    body[0..2].copy_from_slice(&1u16.to_le_bytes());
    body[3] = id_len as u8;
    body[20..22].copy_from_slice(&(impl_use.len() as u16).to_le_bytes());
    body[22..22 + impl_use.len()].copy_from_slice(impl_use);
    body[22 + impl_use.len()] = 8; // OSTA compression code
    body[23 + impl_use.len()..23 + impl_use.len() + name.len()].copy_from_slice(name);
    let tag = DescriptorTag::stamped(TagKind::FileIdentifierDescriptor, 0, &body);
    let mut out = Vec::new();
    tag.write_to(&mut out).expect("tag must serialize");
    out.extend_from_slice(&body);
    out
}

#[test]
fn seed_block_size_roundtrip() {
    let image = seed::build(&SeedGeometry::default()).expect("seed generation failed");
    assert_eq!(image.len(), 1024 * 1024, "Unexpected seed size");
    assert_eq!(detect_block_size(&image), Some(2048), "Round trip failed");
}

#[test]
fn seed_block_size_roundtrip_512() {
    let image = seed::build(&SeedGeometry {
        block_size: 512,
        ..SeedGeometry::default()
    })
    .expect("seed generation failed");
    assert_eq!(detect_block_size(&image), Some(512), "Round trip failed");
}

#[test]
fn seed_too_small_for_anchor_is_rejected() {
    // at a 4096 byte block size the anchor block lies past a 1 MiB image
    let res = seed::build(&SeedGeometry {
        block_size: 4096,
        ..SeedGeometry::default()
    });
    assert!(res.is_err(), "Undersized geometry must be rejected");
}

#[test]
fn seed_recognition_sequence() {
    let image = seed::build(&SeedGeometry::default()).expect("seed generation failed");
    assert_eq!(&image[0x8000..0x8005], b"BEA01");
    assert_eq!(&image[0x8800..0x8805], b"NSR02");
    assert_eq!(&image[0x9000..0x9005], b"TEA01");
}

#[test]
fn zero_buffer_is_not_detected() {
    let image = vec![0u8; 1024 * 1024];
    assert_eq!(detect_block_size(&image), None);
    // probes past the end of a short buffer are misses, not errors
    assert_eq!(detect_block_size(&[0u8; 4096]), None);
    assert_eq!(detect_block_size(&[]), None);
}

#[test]
fn seed_anchor_fidelity() {
    let image = seed::build(&SeedGeometry::default()).expect("seed generation failed");
    let image = UdfImage::new(&image, 2048).expect("context creation failed");

    let probe = image.decode_block(256).expect("anchor block must decode");
    let Descriptor::Anchor(anchor) = probe else {
        panic!("Expected an anchor at block 256");
    };
    assert_eq!(anchor.tag.identifier, 2);
    assert_eq!(anchor.tag.lba, 256);
    assert!(anchor.tag.checksum_ok, "Written checksum must verify");
    assert_eq!(anchor.tag.crc_ok, Some(true), "Written crc must verify");
    assert_eq!(anchor.main.length, 0);
    assert_eq!(anchor.main.lba, 0);
    assert_eq!(anchor.reserve.length, 0);

    // 1 MiB is smaller than the correction window, so the closing anchor
    // sits at the last block
    let probe = image.decode_block(511).expect("closing anchor must decode");
    let Descriptor::Anchor(anchor) = probe else {
        panic!("Expected an anchor at the last block");
    };
    assert_eq!(anchor.tag.lba, 511);
    assert_eq!(anchor.main.length, 16 * 2048);
    assert_eq!(anchor.main.lba, 16);
}

#[test]
fn seed_closing_anchor_honors_correction_window() {
    let image = seed::build(&SeedGeometry {
        total_size: 4 * 1024 * 1024,
        ..SeedGeometry::default()
    })
    .expect("seed generation failed");
    let image = UdfImage::new(&image, 2048).expect("context creation failed");
    // last block 2047, held back by 512
    let probe = image
        .decode_block(2047 - 512)
        .expect("closing anchor must decode");
    let Descriptor::Anchor(anchor) = probe else {
        panic!("Expected an anchor at block 1535");
    };
    assert_eq!(anchor.main.length, 16 * 2048);
    assert_eq!(anchor.main.lba, 16);
}

#[test]
fn scan_window_reports_one_anchor() {
    let image = seed::build(&SeedGeometry::default()).expect("seed generation failed");
    let image = UdfImage::new(&image, 2048).expect("context creation failed");
    let scan = image.scan();

    let ids: Vec<String> = scan
        .vrs
        .iter()
        .map(|v| report::lossy_ascii(&v.id))
        .collect();
    assert_eq!(ids, ["BEA01", "NSR02", "TEA01"], "Unexpected VRS listing");
    assert_eq!(scan.vrs[0].offset, 0x8000);

    // the closing anchor sits past the scan window and is reachable only
    // through a targeted lookup
    let anchors: Vec<u32> = scan
        .descriptors
        .iter()
        .filter(|item| matches!(item.descriptor, Descriptor::Anchor(_)))
        .map(|item| item.lba)
        .collect();
    assert_eq!(anchors, [256], "Expected exactly one anchor in scan range");
}

#[test]
fn scan_is_idempotent() {
    let image = seed::build(&SeedGeometry::default()).expect("seed generation failed");
    let image = UdfImage::new(&image, 2048).expect("context creation failed");
    let mut first = Vec::new();
    let mut second = Vec::new();
    for out in [&mut first, &mut second] {
        let scan = image.scan();
        for vrs in &scan.vrs {
            report::write_vrs_line(out, vrs).expect("report must render");
        }
        for item in &scan.descriptors {
            report::write_located(out, image.block_size(), item).expect("report must render");
        }
    }
    assert!(!first.is_empty());
    assert_eq!(
        first, second,
        "Two runs over one buffer must dump identically"
    );
    let text = String::from_utf8(first).expect("report must be valid text");
    assert!(text.contains("AnchorVolumeDesc:"));
    assert!(text.contains("0x0002 (UdfAnchorVolumeDescriptorPointer)"));
    assert!(text.contains("(LBA: 0x100, 256) (BlockSize * LBA: 0x80000, 524288):"));
}

#[test]
fn entry_with_no_allocation_descriptors_has_no_children() {
    let mut buf = vec![0u8; 8192];
    put_extended_entry(&mut buf, 0, 0, 0, 0);
    let image = UdfImage::new(&buf, 2048).expect("context creation failed");
    let Descriptor::File { entry, children } = image.decode_block(0).expect("entry must decode")
    else {
        panic!("Expected a file entry at block 0");
    };
    assert!(entry.is_extended());
    assert_eq!(entry.ad_length, 0);
    assert!(children.is_empty(), "Zero length walk must yield no children");
}

#[test]
fn directory_walk_decodes_children_in_order() {
    let mut buf = vec![0u8; 8192];
    let fid1 = fid_bytes(b"a", &[]);
    let fid2 = fid_bytes(b"file.txt", &[0xde, 0xad]);
    assert_eq!(fid1.len(), 40);
    let total = (fid1.len() + fid2.len()) as u32;
    put_extended_entry(&mut buf, 0, 0, 0, total);
    buf[216..216 + fid1.len()].copy_from_slice(&fid1);
    buf[216 + fid1.len()..216 + fid1.len() + fid2.len()].copy_from_slice(&fid2);

    let image = UdfImage::new(&buf, 2048).expect("context creation failed");
    let Descriptor::File { children, .. } = image.decode_block(0).expect("entry must decode")
    else {
        panic!("Expected a file entry at block 0");
    };
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].display_name(), "a");
    assert_eq!(children[1].display_name(), "file.txt");
    assert_eq!(children[1].iu_len, 2);
}

#[test]
fn directory_walk_advances_by_padded_footprints() {
    let mut buf = vec![0u8; 8192];
    // identifier holds the compression code byte alone: 38 + 1 = 39 bytes
    // on disk, so the next sibling must sit at a 40 byte stride
    let fid1 = fid_bytes(b"", &[]);
    assert_eq!(fid1.len(), 40);
    let fid2 = fid_bytes(b"b", &[]);
    put_extended_entry(&mut buf, 0, 0, 0, (fid1.len() + fid2.len()) as u32);
    buf[216..216 + fid1.len()].copy_from_slice(&fid1);
    buf[216 + fid1.len()..216 + fid1.len() + fid2.len()].copy_from_slice(&fid2);

    let image = UdfImage::new(&buf, 2048).expect("context creation failed");
    let Descriptor::File { children, .. } = image.decode_block(0).expect("entry must decode")
    else {
        panic!("Expected a file entry at block 0");
    };
    assert_eq!(children.len(), 2);
    assert_eq!(children[0].display_name(), "");
    assert_eq!(children[1].display_name(), "b");
}

#[test]
fn malformed_chain_stops_without_failing_the_decode() {
    let mut buf = vec![0u8; 8192];
    let fid1 = fid_bytes(b"kept", &[]);
    let fid2 = fid_bytes(b"also.kept", &[]);
    // claim far more allocation data than the two real entries cover; the
    // zeroed bytes past them do not carry a File Identifier tag
    put_extended_entry(&mut buf, 0, 0, 0, 4096);
    buf[216..216 + fid1.len()].copy_from_slice(&fid1);
    buf[216 + fid1.len()..216 + fid1.len() + fid2.len()].copy_from_slice(&fid2);

    let image = UdfImage::new(&buf, 2048).expect("context creation failed");
    let Descriptor::File { children, .. } = image.decode_block(0).expect("entry must decode")
    else {
        panic!("Expected a file entry at block 0");
    };
    assert_eq!(children.len(), 2, "Walk must stop at the first foreign tag");
}

#[test]
fn truncated_chain_stops_without_failing_the_decode() {
    // the second chained record claims an identifier which runs past the
    // end of the input
    let mut buf = vec![0u8; 400];
    let fid1 = fid_bytes(b"only", &[]);
    put_extended_entry(&mut buf, 0, 0, 0, 0xffff);
    let fid_end = 216 + fid1.len();
    buf[216..fid_end].copy_from_slice(&fid1);
    let mut fid2 = fid_bytes(b"x", &[]);
    fid2[19] = 0xff; // LengthOfFileIdentifier far past the buffer
    buf[fid_end..fid_end + fid2.len()].copy_from_slice(&fid2);

    let image = UdfImage::new(&buf, 2048).expect("context creation failed");
    let Descriptor::File { children, .. } = image.decode_block(0).expect("entry must decode")
    else {
        panic!("Expected a file entry at block 0");
    };
    assert_eq!(children.len(), 1, "Walk must stop at the end of the input");
    assert_eq!(children[0].display_name(), "only");
}

#[test]
fn unassigned_tags_dump_tag_only() {
    let mut buf = vec![0u8; 4096];
    let mut tag_bytes = Vec::new();
    DescriptorTag::stamped(TagKind::TerminatingDescriptor, 1, &[])
        .write_to(&mut tag_bytes)
        .expect("tag must serialize");
    tag_bytes[0..2].copy_from_slice(&259u16.to_le_bytes()); // not in the registry
    buf[2048..2048 + 16].copy_from_slice(&tag_bytes);

    let image = UdfImage::new(&buf, 2048).expect("context creation failed");
    let descriptor = image.decode_block(1).expect("block must decode");
    let Descriptor::Other(tag) = &descriptor else {
        panic!("Expected a tag-only result");
    };
    assert_eq!(tag.identifier, 259);
    let mut out = Vec::new();
    report::write_descriptor(&mut out, &descriptor).expect("report must render");
    let text = String::from_utf8(out).expect("report must be valid text");
    assert!(text.contains("DescriptorTag:"));
    assert!(text.contains("(<Unknown>)"));

    // in a full scan the same block is skipped silently
    let scan = image.scan();
    assert!(scan.descriptors.is_empty());
}

#[test]
fn targeted_decode_past_the_end_fails() {
    let buf = vec![0u8; 4096];
    let image = UdfImage::new(&buf, 2048).expect("context creation failed");
    assert!(image.decode_block(1000).is_err());
}

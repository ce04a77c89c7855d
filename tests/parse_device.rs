// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! End-to-end tests over synthetic PV images built in memory.

use std::io;

use byteorder::{ByteOrder, LittleEndian};

use lvm2scan::util::crc32_calc;
use lvm2scan::{parse_device, BlockDevice, Error};

const SECTOR: usize = 512;
const IMAGE_LEN: usize = 64 * 1024;

// Where the synthetic image puts things.
const LABEL_SECTOR: usize = 1;
const MDA_OFFSET: u64 = 4096;
const MDA_SIZE: u64 = 8192;
const TEXT_OFFSET: u64 = 512; // within the metadata area

const PV_UUID: &[u8; 32] = b"0123456789ABCDEF0123456789ABCDEF";

// 512 * (pe_start + pe_count * extent_size) for the metadata below:
// every extent of pv0 fits.
const DEVICE_SIZE: u64 = 512 * (384 + 100 * 8192);

const SINGLE_LV_TEXT: &str = r#"
foo {
  id = "BrLHHa-lKOF-rc82-vVxf-kpe1-3qsu-NeTiRS"
  seqno = 1
  format = "lvm2"
  status = ["RESIZEABLE","READ","WRITE"]
  extent_size = 8192
  max_lv = 0
  max_pv = 0
  physical_volumes { pv0 { id="0123456789-ABCD-EF01-2345-6789AB-CDEF" device="/dev/x" status=["ALLOCATABLE"] pe_start=384 pe_count=100 } }
  logical_volumes  { lv0 { id="zzzzzz-zzzz-zzzz-zzzz-zzzz-zzzz-zzzzzz" status=["READ","WRITE","VISIBLE"] segment_count=1 segment1 { start_extent=0 extent_count=10 type="striped" stripe_count=1 stripes=["pv0",0] } } }
}
"#;

struct MemDevice {
    data: Vec<u8>,
    reads: usize,
}

impl MemDevice {
    fn new(data: Vec<u8>) -> MemDevice {
        MemDevice { data, reads: 0 }
    }
}

impl BlockDevice for MemDevice {
    fn block_size(&self) -> u32 {
        512
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        assert_eq!(offset % 512, 0, "unaligned read offset {offset}");
        assert_eq!(buf.len() % 512, 0, "unaligned read length {}", buf.len());
        self.reads += 1;

        let offset = offset as usize;
        if offset + buf.len() > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "read past end of image",
            ));
        }
        buf.copy_from_slice(&self.data[offset..offset + buf.len()]);
        Ok(())
    }
}

// Recompute the label-sector CRC after editing it.
fn seal_label(image: &mut [u8]) {
    let sec = LABEL_SECTOR * SECTOR;
    let crc = crc32_calc(&image[sec + 20..sec + SECTOR]);
    LittleEndian::write_u32(&mut image[sec + 16..sec + 20], crc);
}

// Recompute the mda_header CRC after editing it.
fn seal_mda(image: &mut [u8]) {
    let mda = MDA_OFFSET as usize;
    let crc = crc32_calc(&image[mda + 4..mda + SECTOR]);
    LittleEndian::write_u32(&mut image[mda..mda + 4], crc);
}

/// A valid PV image: label in sector 1, one data area, one metadata
/// area holding `text` as the live metadata.
fn build_image(text: &str) -> Vec<u8> {
    let mut image = vec![0u8; IMAGE_LEN];

    // label header
    let sec = LABEL_SECTOR * SECTOR;
    image[sec..sec + 8].copy_from_slice(b"LABELONE");
    LittleEndian::write_u64(&mut image[sec + 8..sec + 16], LABEL_SECTOR as u64);
    LittleEndian::write_u32(&mut image[sec + 20..sec + 24], 32);
    image[sec + 24..sec + 32].copy_from_slice(b"LVM2 001");

    // pv header at offset 32: uuid, device size, then the two
    // zero-terminated disk_locn lists.
    let pvh = sec + 32;
    image[pvh..pvh + 32].copy_from_slice(PV_UUID);
    LittleEndian::write_u64(&mut image[pvh + 32..pvh + 40], DEVICE_SIZE);
    let mut locn = pvh + 40;
    // one data area: the extents themselves, size 0 = "rest of device"
    LittleEndian::write_u64(&mut image[locn..locn + 8], 384 * 512);
    locn += 16; // terminator
    locn += 16;
    // one metadata area
    LittleEndian::write_u64(&mut image[locn..locn + 8], MDA_OFFSET);
    LittleEndian::write_u64(&mut image[locn + 8..locn + 16], MDA_SIZE);

    seal_label(&mut image);

    // mda header
    let mda = MDA_OFFSET as usize;
    image[mda + 4..mda + 20].copy_from_slice(b" LVM2 x[5A%r0N*>");
    LittleEndian::write_u32(&mut image[mda + 20..mda + 24], 1);
    LittleEndian::write_u64(&mut image[mda + 24..mda + 32], MDA_OFFSET);
    LittleEndian::write_u64(&mut image[mda + 32..mda + 40], MDA_SIZE);
    // raw_locn slot 0; slot 1 stays all-zero
    LittleEndian::write_u64(&mut image[mda + 40..mda + 48], TEXT_OFFSET);
    LittleEndian::write_u64(&mut image[mda + 48..mda + 56], text.len() as u64);
    LittleEndian::write_u32(&mut image[mda + 56..mda + 60], crc32_calc(text.as_bytes()));

    seal_mda(&mut image);

    // the text itself
    let at = (MDA_OFFSET + TEXT_OFFSET) as usize;
    image[at..at + text.len()].copy_from_slice(text.as_bytes());

    image
}

/// Run `parse_device`, collecting every callback invocation.
fn collect(
    dev: &mut MemDevice,
) -> Result<Vec<(String, u64, u64, bool)>, Error> {
    let mut volumes = Vec::new();
    parse_device(dev, |vol| {
        assert_eq!(vol.device_size, DEVICE_SIZE);
        assert!(vol.start + vol.length <= vol.device_size);
        volumes.push((vol.name.to_string(), vol.start, vol.length, vol.is_incomplete));
        true
    })?;
    Ok(volumes)
}

#[test]
fn blank_device_has_no_label() {
    let mut dev = MemDevice::new(vec![0u8; 4096]);
    let err = parse_device(&mut dev, |_| panic!("no volumes expected")).unwrap_err();
    assert!(matches!(err, Error::NoLabel));
    assert_eq!(dev.reads, 4);
}

#[test]
fn single_lv_is_reported_with_exact_byte_range() {
    let mut dev = MemDevice::new(build_image(SINGLE_LV_TEXT));
    let volumes = collect(&mut dev).unwrap();
    assert_eq!(
        volumes,
        vec![("lv0".to_string(), (384 + 0 * 8192) * 512, 10 * 8192 * 512, false)]
    );
}

#[test]
fn each_segment_is_reported_separately() {
    let text = SINGLE_LV_TEXT.replace(
        "segment_count=1 segment1 { start_extent=0 extent_count=10 type=\"striped\" stripe_count=1 stripes=[\"pv0\",0] }",
        "segment_count=2 \
         segment1 { start_extent=0 extent_count=10 type=\"striped\" stripe_count=1 stripes=[\"pv0\",0] } \
         segment2 { start_extent=10 extent_count=5 type=\"striped\" stripe_count=1 stripes=[\"pv0\",10] }",
    );
    let mut dev = MemDevice::new(build_image(&text));
    let volumes = collect(&mut dev).unwrap();
    assert_eq!(
        volumes,
        vec![
            ("lv0".to_string(), 196_608, 41_943_040, false),
            ("lv0".to_string(), 196_608 + 10 * 8192 * 512, 5 * 8192 * 512, false),
        ]
    );
}

#[test]
fn a_corrupted_label_sector_is_rejected() {
    let mut image = build_image(SINGLE_LV_TEXT);
    // flip one byte inside the CRC-protected region
    image[LABEL_SECTOR * SECTOR + 100] ^= 1;
    let mut dev = MemDevice::new(image);
    let err = parse_device(&mut dev, |_| true).unwrap_err();
    assert!(matches!(err, Error::NoLabel));
}

#[test]
fn an_unsupported_mda_version_skips_the_area() {
    let mut image = build_image(SINGLE_LV_TEXT);
    let mda = MDA_OFFSET as usize;
    LittleEndian::write_u32(&mut image[mda + 20..mda + 24], 2);
    seal_mda(&mut image);

    let mut dev = MemDevice::new(image);
    let err = parse_device(&mut dev, |_| true).unwrap_err();
    assert!(matches!(err, Error::UnsupportedMdaVersion(2)));
}

#[test]
fn callback_returning_false_stops_cleanly() {
    let text = SINGLE_LV_TEXT.replace(
        "logical_volumes  { lv0 { id=\"zzzzzz-zzzz-zzzz-zzzz-zzzz-zzzz-zzzzzz\" status=[\"READ\",\"WRITE\",\"VISIBLE\"] segment_count=1 segment1 { start_extent=0 extent_count=10 type=\"striped\" stripe_count=1 stripes=[\"pv0\",0] } } }",
        "logical_volumes {
           lv0 { id=\"aa\" status=[\"READ\"] segment_count=1 segment1 { start_extent=0 extent_count=10 type=\"striped\" stripe_count=1 stripes=[\"pv0\",0] } }
           lv1 { id=\"bb\" status=[\"READ\"] segment_count=1 segment1 { start_extent=0 extent_count=10 type=\"striped\" stripe_count=1 stripes=[\"pv0\",10] } }
           lv2 { id=\"cc\" status=[\"READ\"] segment_count=1 segment1 { start_extent=0 extent_count=10 type=\"striped\" stripe_count=1 stripes=[\"pv0\",20] } }
         }",
    );
    let mut dev = MemDevice::new(build_image(&text));

    let mut seen = Vec::new();
    parse_device(&mut dev, |vol| {
        seen.push(vol.name.to_string());
        seen.len() < 2
    })
    .unwrap();
    assert_eq!(seen, vec!["lv0".to_string(), "lv1".to_string()]);
}

#[test]
fn a_volume_past_the_end_of_the_device_is_clipped() {
    // 200 extents starting at extent 0 overshoot pe_count = 100.
    let text = SINGLE_LV_TEXT.replace("extent_count=10", "extent_count=200");
    let mut dev = MemDevice::new(build_image(&text));
    let volumes = collect(&mut dev).unwrap();

    let start = 384 * 512;
    assert_eq!(
        volumes,
        vec![("lv0".to_string(), start, DEVICE_SIZE - start, false)]
    );
}

#[test]
fn multi_stripe_segments_are_reported_incomplete() {
    let text = SINGLE_LV_TEXT.replace(
        "stripe_count=1 stripes=[\"pv0\",0]",
        "stripe_count=2 stripes=[\"pv0\",0,\"pv1\",0]",
    );
    let mut dev = MemDevice::new(build_image(&text));
    let volumes = collect(&mut dev).unwrap();
    assert_eq!(volumes.len(), 1);
    assert!(volumes[0].3, "expected the volume to be flagged incomplete");
}

#[test]
fn segments_on_other_pvs_are_skipped() {
    let text = SINGLE_LV_TEXT.replace("stripes=[\"pv0\",0]", "stripes=[\"pv1\",0]");
    let mut dev = MemDevice::new(build_image(&text));
    let volumes = collect(&mut dev).unwrap();
    assert!(volumes.is_empty());
}

#[test]
fn mirror_segments_resolve_on_the_mirror_list() {
    let text = SINGLE_LV_TEXT.replace(
        "type=\"striped\" stripe_count=1 stripes=[\"pv0\",0]",
        "type=\"mirror\" mirror_count=1 mirrors=[\"pv0\",0]",
    );
    let mut dev = MemDevice::new(build_image(&text));
    let volumes = collect(&mut dev).unwrap();
    assert_eq!(
        volumes,
        vec![("lv0".to_string(), 196_608, 41_943_040, false)]
    );
}

#[test]
fn metadata_describing_other_pvs_only_is_no_match() {
    let text = SINGLE_LV_TEXT.replace(
        "id=\"0123456789-ABCD-EF01-2345-6789AB-CDEF\"",
        "id=\"FFFFFF-FFFF-FFFF-FFFF-FFFF-FFFF-FFFFFF\"",
    );
    let mut dev = MemDevice::new(build_image(&text));
    let err = parse_device(&mut dev, |_| true).unwrap_err();
    assert!(matches!(err, Error::NoPvMatch));
}

#[test]
fn a_corrupted_text_checksum_is_fatal() {
    let mut image = build_image(SINGLE_LV_TEXT);
    let at = (MDA_OFFSET + TEXT_OFFSET) as usize;
    image[at + 10] ^= 1; // inside the text, after both header CRCs
    let mut dev = MemDevice::new(image);
    let err = parse_device(&mut dev, |_| true).unwrap_err();
    assert!(matches!(
        err,
        Error::BadCrc {
            region: "metadata text",
            ..
        }
    ));
}

#[test]
fn labels_are_found_in_any_of_the_first_four_sectors() {
    // Move the whole label sector from sector 1 to sector 3; the
    // sector_xl field must follow for the CRC to validate.
    let mut image = build_image(SINGLE_LV_TEXT);
    let from = LABEL_SECTOR * SECTOR;
    let sector: Vec<u8> = image[from..from + SECTOR].to_vec();
    image[from..from + SECTOR].fill(0);
    let to = 3 * SECTOR;
    image[to..to + SECTOR].copy_from_slice(&sector);
    LittleEndian::write_u64(&mut image[to + 8..to + 16], 3);
    let crc = crc32_calc(&image[to + 20..to + SECTOR]);
    LittleEndian::write_u32(&mut image[to + 16..to + 20], crc);

    let mut dev = MemDevice::new(image);
    let volumes = collect(&mut dev).unwrap();
    assert_eq!(volumes.len(), 1);
}

#[test]
fn a_label_claiming_the_wrong_sector_is_rejected() {
    // Copy the valid label into sector 2 without fixing sector_xl:
    // its self-reported sector no longer matches where it sits.
    let mut image = build_image(SINGLE_LV_TEXT);
    let from = LABEL_SECTOR * SECTOR;
    let sector: Vec<u8> = image[from..from + SECTOR].to_vec();
    image[from..from + SECTOR].fill(0);
    let to = 2 * SECTOR;
    image[to..to + SECTOR].copy_from_slice(&sector);

    let mut dev = MemDevice::new(image);
    let err = parse_device(&mut dev, |_| true).unwrap_err();
    assert!(matches!(err, Error::NoLabel));
}

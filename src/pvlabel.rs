// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The binary side of an LVM2 physical volume: label scan, PV header,
//! and metadata-area header.
//!
//! All multi-byte fields are little-endian regardless of host. The
//! layout constants mirror LVM2's lib/format_text/layout.h.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, warn};

use crate::device::{read_range, BlockDevice};
use crate::error::{Error, Result};
use crate::util::crc32_calc;

pub const SECTOR_SIZE: usize = 512;
pub const LABEL_SCAN_SECTORS: usize = 4;
pub const ID_LEN: usize = 32;
pub const MDA_HEADER_SIZE: usize = 512;

pub const LABEL_MAGIC: &[u8; 8] = b"LABELONE";
pub const LABEL_TYPE: &[u8; 8] = b"LVM2 001";
pub const MDA_MAGIC: &[u8; 16] = b" LVM2 x[5A%r0N*>";

// Offset of the CRC-protected region within a label sector: everything
// from offset_xl to the end of the sector.
const LABEL_CRC_REGION: usize = 20;

/// The label announcing an LVM2 physical volume, plus the sector it
/// was found in.
#[derive(Debug)]
pub struct Label {
    /// Index of the sector holding the label.
    pub sector: u64,
    /// Offset of the PV header within that sector.
    pub content_offset: u32,
    /// The full 512 bytes of the label sector.
    pub sector_buf: Vec<u8>,
}

impl Label {
    /// Size of the fixed label_header: id, sector_xl, crc_xl,
    /// offset_xl, type.
    pub const SIZE: usize = 8 + 8 + 4 + 4 + 8;
}

fn check_label_sector(sec: &[u8], index: u64) -> Result<u32> {
    let sector_xl = LittleEndian::read_u64(&sec[8..16]);
    if sector_xl != index {
        return Err(Error::BadSectorSelf {
            found: index,
            reported: sector_xl,
        });
    }

    let crc_xl = LittleEndian::read_u32(&sec[16..20]);
    let computed = crc32_calc(&sec[LABEL_CRC_REGION..SECTOR_SIZE]);
    if crc_xl != computed {
        return Err(Error::BadCrc {
            region: "label",
            stored: crc_xl,
            computed,
        });
    }

    if &sec[24..32] != LABEL_TYPE {
        return Err(Error::BadMagic("label type"));
    }

    let offset_xl = LittleEndian::read_u32(&sec[20..24]);
    if (offset_xl as usize) < Label::SIZE || (offset_xl as usize) >= SECTOR_SIZE {
        return Err(Error::HeaderOverflow);
    }

    Ok(offset_xl)
}

/// Scan the first four sectors for a label. The first sector that
/// validates wins; later candidates are logged and ignored.
pub fn find_label<D: BlockDevice + ?Sized>(dev: &mut D) -> Result<Label> {
    let bs = dev.block_size() as usize;
    let scan_len = LABEL_SCAN_SECTORS * SECTOR_SIZE;

    let window: Vec<u8> = if bs <= SECTOR_SIZE {
        // One read per sector; block sizes below 512 divide it evenly.
        let mut window = vec![0u8; scan_len];
        for chunk in 0..LABEL_SCAN_SECTORS {
            let at = chunk * SECTOR_SIZE;
            dev.read(at as u64, &mut window[at..at + SECTOR_SIZE])?;
        }
        window
    } else {
        read_range(dev, 0, scan_len)?.bytes().to_vec()
    };

    let mut found: Option<Label> = None;
    for x in 0..LABEL_SCAN_SECTORS {
        let sec = &window[x * SECTOR_SIZE..(x + 1) * SECTOR_SIZE];
        if &sec[..8] != LABEL_MAGIC {
            continue;
        }
        if let Some(label) = &found {
            warn!(
                "ignoring extra label candidate at sector {} (label already found at sector {})",
                x, label.sector
            );
            continue;
        }
        match check_label_sector(sec, x as u64) {
            Ok(content_offset) => {
                debug!("found LVM2 label at sector {}", x);
                found = Some(Label {
                    sector: x as u64,
                    content_offset,
                    sector_buf: sec.to_vec(),
                });
            }
            Err(e) => warn!("rejecting label candidate at sector {}: {}", x, e),
        }
    }

    found.ok_or(Error::NoLabel)
}

/// One data or metadata area on the PV: (offset, size) in bytes.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PvArea {
    pub offset: u64,
    pub size: u64,
}

impl PvArea {
    /// Size of one on-disk disk_locn entry.
    pub const SIZE: usize = 8 + 8;
}

// Walk one zero-terminated disk_locn list, advancing *pos past the
// terminator. Entries must stay inside the label sector.
fn walk_areas(sec: &[u8], pos: &mut usize) -> Result<Vec<PvArea>> {
    let mut areas = Vec::new();
    loop {
        if *pos + PvArea::SIZE > sec.len() {
            return Err(Error::HeaderOverflow);
        }
        let offset = LittleEndian::read_u64(&sec[*pos..*pos + 8]);
        let size = LittleEndian::read_u64(&sec[*pos + 8..*pos + 16]);
        *pos += PvArea::SIZE;

        if offset == 0 {
            return Ok(areas);
        }
        areas.push(PvArea { offset, size });
    }
}

//
// PV HEADER LAYOUT:
// - uuid and device size
// - 0+ data areas, blank terminating entry
// - 0+ metadata areas, blank terminating entry
//
#[derive(Debug)]
pub struct PvHeader {
    /// Compact (dash-free) PV UUID, 32 characters.
    pub uuid: String,
    /// Self-reported device size in bytes.
    pub device_size: u64,
    pub data_areas: Vec<PvArea>,
    pub metadata_areas: Vec<PvArea>,
}

impl PvHeader {
    /// Size of the fixed pv_header prefix (uuid + device size).
    pub const SIZE: usize = ID_LEN + 8;

    pub fn parse(label: &Label) -> Result<PvHeader> {
        let sec = &label.sector_buf;
        let mut pos = label.content_offset as usize;

        if pos + Self::SIZE > sec.len() {
            return Err(Error::HeaderOverflow);
        }

        let uuid = String::from_utf8_lossy(&sec[pos..pos + ID_LEN]).into_owned();
        let device_size = LittleEndian::read_u64(&sec[pos + ID_LEN..pos + Self::SIZE]);
        pos += Self::SIZE;

        let data_areas = walk_areas(sec, &mut pos)?;
        let metadata_areas = walk_areas(sec, &mut pos)?;

        if data_areas.len() != metadata_areas.len() {
            return Err(Error::AreaMismatch {
                data: data_areas.len(),
                meta: metadata_areas.len(),
            });
        }

        Ok(PvHeader {
            uuid,
            device_size,
            data_areas,
            metadata_areas,
        })
    }
}

/// Locates the live copy of the text metadata inside a metadata area:
/// (offset, size) relative to the area start, plus the text's CRC.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RawLocn {
    pub offset: u64,
    pub size: u64,
    pub checksum: u32,
    pub flags: u32,
}

impl RawLocn {
    /// Size of one on-disk raw_locn entry.
    pub const SIZE: usize = 8 + 8 + 4 + 4;

    fn parse(buf: &[u8]) -> RawLocn {
        RawLocn {
            offset: LittleEndian::read_u64(&buf[..8]),
            size: LittleEndian::read_u64(&buf[8..16]),
            checksum: LittleEndian::read_u32(&buf[16..20]),
            flags: LittleEndian::read_u32(&buf[20..24]),
        }
    }
}

/// The validated header of one metadata area.
#[derive(Debug)]
pub struct MdaHeader {
    pub version: u32,
    /// Absolute start byte of the area, echoed from the PV header.
    pub start: u64,
    /// Size of the area in bytes.
    pub size: u64,
    /// The single active raw location.
    pub raw_locn: RawLocn,
}

impl MdaHeader {
    /// Size of the fixed mda_header prefix: checksum, magic, version,
    /// start, size.
    pub const SIZE: usize = 4 + 16 + 4 + 8 + 8;
}

/// Read and validate the mda_header of the metadata area at `area`.
///
/// Failures here are local to this area; the caller is expected to try
/// the next one.
pub fn read_mda_header<D: BlockDevice + ?Sized>(dev: &mut D, area: &PvArea) -> Result<MdaHeader> {
    let buf = read_range(dev, area.offset, MDA_HEADER_SIZE)?;
    let hdr = buf.bytes();

    let stored = LittleEndian::read_u32(&hdr[..4]);
    let computed = crc32_calc(&hdr[4..]);
    if stored != computed {
        return Err(Error::BadCrc {
            region: "mda header",
            stored,
            computed,
        });
    }

    if &hdr[4..20] != MDA_MAGIC {
        return Err(Error::BadMagic("mda header"));
    }

    let version = LittleEndian::read_u32(&hdr[20..24]);
    if version != 1 {
        return Err(Error::UnsupportedMdaVersion(version));
    }

    let start = LittleEndian::read_u64(&hdr[24..32]);
    let size = LittleEndian::read_u64(&hdr[32..40]);
    if start != area.offset || size != area.size {
        return Err(Error::MdaMismatch);
    }

    let raw_locn = RawLocn::parse(&hdr[MdaHeader::SIZE..MdaHeader::SIZE + RawLocn::SIZE]);
    if raw_locn.offset == 0 {
        return Err(Error::NoRawLocn);
    }

    let second = &hdr[MdaHeader::SIZE + RawLocn::SIZE..MdaHeader::SIZE + 2 * RawLocn::SIZE];
    if second.iter().any(|&b| b != 0) {
        return Err(Error::MultipleRawLocns);
    }

    if raw_locn.offset >= size || raw_locn.size > size - raw_locn.offset {
        return Err(Error::RawLocnOutOfRange);
    }

    Ok(MdaHeader {
        version,
        start,
        size,
        raw_locn,
    })
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The full device pipeline: label -> PV header -> metadata area ->
//! text -> typed model -> per-segment byte extents.

use log::{debug, warn};

use crate::device::{read_range, BlockDevice};
use crate::error::{Error, LayoutError, Result};
use crate::lv::{PvLocation, Segment};
use crate::parser::parse_text;
use crate::pv::PV;
use crate::pvlabel::{self, PvHeader, RawLocn};
use crate::util::crc32_calc;
use crate::vg::{layout_from_dom, Layout, VG};

/// One logical-volume extent reported to the volume callback.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VolumeInfo<'a> {
    /// The PV's self-reported device size in bytes.
    pub device_size: u64,
    /// The logical volume's name.
    pub name: &'a str,
    /// Absolute start byte of this extent range on the device.
    pub start: u64,
    /// Length in bytes, clipped to the device size.
    pub length: u64,
    /// True when the LV also spans other devices (striping, mirror
    /// legs, or an unrecognized multi-location segment type), so this
    /// range alone does not hold the whole volume.
    pub is_incomplete: bool,
}

/// Read, checksum, parse, and build the text metadata pointed to by
/// `locn` inside the metadata area at `mda_offset`.
pub fn read_text<D: BlockDevice + ?Sized>(
    dev: &mut D,
    mda_offset: u64,
    mda_size: u64,
    locn: &RawLocn,
) -> Result<Layout> {
    if locn.offset >= mda_size || locn.size > mda_size - locn.offset {
        return Err(Error::RawLocnOutOfRange);
    }
    let len = usize::try_from(locn.size).map_err(|_| Error::RawLocnOutOfRange)?;

    let buf = read_range(dev, mda_offset + locn.offset, len)?;
    let text = buf.bytes();

    let computed = crc32_calc(text);
    if computed != locn.checksum {
        return Err(Error::BadCrc {
            region: "metadata text",
            stored: locn.checksum,
            computed,
        });
    }

    let dom = parse_text(text)?;
    Ok(layout_from_dom(&dom)?)
}

// A dashed textual PV UUID matches the compact on-disk UUID when
// removing the separators yields the same 32 bytes. Canonically the
// text form is 38 characters with dashes at 6, 11, 16, 21, 26, and
// 31, but the dashes carry no information, so matching just skips
// them wherever they sit.
fn uuid_matches(dashed: &str, compact: &str) -> bool {
    if compact.len() != pvlabel::ID_LEN {
        return false;
    }

    let mut rest = compact.bytes();
    for b in dashed.bytes() {
        if b == b'-' {
            continue;
        }
        if rest.next() != Some(b) {
            return false;
        }
    }
    rest.next().is_none()
}

fn match_pv<'a>(vg: &'a VG, compact_uuid: &str) -> Result<&'a PV> {
    let mut found = None;
    for pv in &vg.physical_volumes {
        if uuid_matches(&pv.id, compact_uuid) {
            if found.is_some() {
                // Two PV entries with the same UUID cannot be told
                // apart.
                return Err(Error::NoPvMatch);
            }
            found = Some(pv);
        }
    }
    found.ok_or(Error::NoPvMatch)
}

// The one place this segment's data sits on the given PV, if any.
// Stripes are searched before mirror legs.
fn location_on<'a>(seg: &'a Segment, pv_name: &str) -> Option<&'a PvLocation> {
    seg.stripes
        .iter()
        .find(|s| s.pv_name == pv_name)
        .or_else(|| seg.mirrors.iter().find(|m| m.pv_name == pv_name))
}

fn segment_is_incomplete(seg: &Segment) -> bool {
    (!seg.stripes.is_empty() && !seg.mirrors.is_empty())
        || seg.stripes.len() > 1
        || seg.mirrors.len() > 1
}

fn extent_math_overflow(lv: &str) -> Error {
    Error::Layout(LayoutError::Overflow(format!("extents of \"{lv}\"")))
}

/// Walk the parsed layout and report every segment of every LV that
/// has data on the matched PV. Returns `Ok` when the callback asks to
/// stop early.
fn report_volumes<F>(
    block_size: u32,
    device_size: u64,
    layout: &Layout,
    compact_uuid: &str,
    volume_callback: &mut F,
) -> Result<()>
where
    F: FnMut(&VolumeInfo<'_>) -> bool,
{
    let vg = &layout.vg;
    let pv = match_pv(vg, compact_uuid)?;
    debug!(
        "on-disk PV is \"{}\" in VG \"{}\" ({} LVs)",
        pv.name,
        layout.vg_name,
        vg.logical_volumes.len()
    );

    let block = u64::from(block_size);
    if block != 512 {
        // pe_start and extent_size are in 512-byte sectors; other
        // block sizes are faithfully multiplied through but have not
        // been observed in the wild.
        warn!("device block size is {block}, not 512; extent math may overshoot");
    }

    for lv in &vg.logical_volumes {
        for seg in &lv.segments {
            let Some(locn) = location_on(seg, &pv.name) else {
                debug!(
                    "LV \"{}\": segment at extent {} is not on this PV",
                    lv.name, seg.start_extent
                );
                continue;
            };

            let overflow = || extent_math_overflow(&lv.name);
            let start = locn
                .extent_start
                .checked_mul(vg.extent_size)
                .and_then(|s| s.checked_add(pv.pe_start))
                .and_then(|s| s.checked_mul(block))
                .ok_or_else(overflow)?;
            let mut length = seg
                .extent_count
                .checked_mul(vg.extent_size)
                .and_then(|l| l.checked_mul(block))
                .ok_or_else(overflow)?;

            if start.checked_add(length).is_none_or(|end| end > device_size) {
                warn!(
                    "LV \"{}\" extends past the end of the device; clipping",
                    lv.name
                );
                length = device_size.saturating_sub(start);
            }

            let info = VolumeInfo {
                device_size,
                name: &lv.name,
                start,
                length,
                is_incomplete: segment_is_incomplete(seg),
            };
            if !volume_callback(&info) {
                debug!("volume callback requested stop");
                return Ok(());
            }
        }
    }

    Ok(())
}

/// Decode a whole device: find the label, walk the metadata areas to
/// the live text metadata, and report each LV extent range on this PV
/// through `volume_callback`. The callback returning false stops the
/// walk cleanly.
pub fn parse_device<D, F>(dev: &mut D, mut volume_callback: F) -> Result<()>
where
    D: BlockDevice + ?Sized,
    F: FnMut(&VolumeInfo<'_>) -> bool,
{
    let label = pvlabel::find_label(dev)?;
    let pvh = PvHeader::parse(&label)?;
    debug!(
        "PV {} with {} metadata area(s)",
        pvh.uuid,
        pvh.metadata_areas.len()
    );

    // Failures up to and including the mda_header are local to one
    // metadata area; the text of the first healthy area decides the
    // device's fate.
    let mut last_err = None;
    let mut layout = None;
    for area in &pvh.metadata_areas {
        match pvlabel::read_mda_header(dev, area) {
            Ok(mda) => {
                layout = Some(read_text(dev, area.offset, area.size, &mda.raw_locn)?);
                break;
            }
            Err(e) => {
                warn!("skipping metadata area at byte {}: {}", area.offset, e);
                last_err = Some(e);
            }
        }
    }
    let Some(layout) = layout else {
        return Err(last_err.unwrap_or(Error::NoRawLocn));
    };

    report_volumes(
        dev.block_size(),
        pvh.device_size,
        &layout,
        &pvh.uuid,
        &mut volume_callback,
    )
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Logical Volumes.

use bitflags::bitflags;

use crate::error::LayoutError;
use crate::parser::{DomNode, DomSection};
use crate::util::{parse_u64, require, set_once};

bitflags! {
    /// Status flags recognized on a logical volume.
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct LvStatus: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
        const VISIBLE = 0x4;
    }
}

impl LvStatus {
    pub(crate) fn from_list(elements: &[String]) -> Result<LvStatus, LayoutError> {
        let mut status = LvStatus::empty();
        for e in elements {
            status |= match e.as_str() {
                "READ" => LvStatus::READ,
                "WRITE" => LvStatus::WRITE,
                "VISIBLE" => LvStatus::VISIBLE,
                _ => return Err(LayoutError::UnknownStatus(e.clone())),
            };
        }
        Ok(status)
    }
}

/// Where a stripe or mirror leg of a segment sits on one PV.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PvLocation {
    /// Name of a PV in the same VG.
    pub pv_name: String,
    /// First extent within that PV, in extent units.
    pub extent_start: u64,
}

/// A contiguous extent range of an LV, mapped onto PV extents.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Segment {
    /// The first extent within the LV this segment comprises.
    pub start_extent: u64,
    /// How many extents this segment comprises.
    pub extent_count: u64,
    /// The segment type. "striped" and "mirror" are understood;
    /// anything else is carried through as-is.
    pub ty: String,
    pub stripe_count: Option<u64>,
    pub stripe_size: Option<u64>,
    /// Striped placement, in source order.
    pub stripes: Vec<PvLocation>,
    pub mirror_count: Option<u64>,
    pub mirror_log: Option<String>,
    pub region_size: Option<u64>,
    /// Mirror-leg placement, in source order.
    pub mirrors: Vec<PvLocation>,
}

/// A Logical Volume within a VG.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct LV {
    /// The name.
    pub name: String,
    /// The UUID.
    pub id: String,
    /// The status.
    pub status: LvStatus,
    /// Free-form flags.
    pub flags: Vec<String>,
    pub creation_host: Option<String>,
    pub creation_time: Option<u64>,
    pub allocation_policy: Option<String>,
    /// Declared segment count; always equals `segments.len()`.
    pub segment_count: u64,
    /// The segments comprising the LV, in `segment1..segmentN` order.
    pub segments: Vec<Segment>,
}

// The stripes/mirrors arrays alternate PV name and starting extent:
// ["pv0", 0, "pv1", 128].
fn locations(key: &str, elements: &[String]) -> Result<Vec<PvLocation>, LayoutError> {
    if elements.len() % 2 != 0 {
        return Err(LayoutError::BadValue {
            key: key.to_string(),
            reason: "expected alternating PV name and extent pairs",
        });
    }

    elements
        .chunks(2)
        .map(|pair| {
            Ok(PvLocation {
                pv_name: pair[0].clone(),
                extent_start: parse_u64(key, &pair[1])?,
            })
        })
        .collect()
}

fn segment_from_dom(sect: &DomSection) -> Result<Segment, LayoutError> {
    let mut start_extent = None;
    let mut extent_count = None;
    let mut ty = None;
    let mut stripe_count = None;
    let mut stripe_size = None;
    let mut stripes = None;
    let mut mirror_count = None;
    let mut mirror_log = None;
    let mut region_size = None;
    let mut mirrors = None;

    for child in &sect.children {
        match child {
            DomNode::Value { name: key, value } => match key.as_str() {
                "start_extent" => set_once(key, &mut start_extent, parse_u64(key, value)?)?,
                "extent_count" => set_once(key, &mut extent_count, parse_u64(key, value)?)?,
                "type" => set_once(key, &mut ty, value.clone())?,
                "stripe_count" => set_once(key, &mut stripe_count, parse_u64(key, value)?)?,
                "stripe_size" => set_once(key, &mut stripe_size, parse_u64(key, value)?)?,
                "mirror_count" => set_once(key, &mut mirror_count, parse_u64(key, value)?)?,
                "mirror_log" => set_once(key, &mut mirror_log, value.clone())?,
                "region_size" => set_once(key, &mut region_size, parse_u64(key, value)?)?,
                _ => return Err(LayoutError::UnknownKey(key.clone())),
            },
            DomNode::Array {
                name: key,
                elements,
            } => match key.as_str() {
                "stripes" => set_once(key, &mut stripes, locations(key, elements)?)?,
                "mirrors" => set_once(key, &mut mirrors, locations(key, elements)?)?,
                _ => return Err(LayoutError::UnknownKey(key.clone())),
            },
            DomNode::Section(s) => return Err(LayoutError::UnknownKey(s.name.clone())),
        }
    }

    let mut missing = Vec::new();
    let start_extent = require(start_extent, "start_extent", &mut missing);
    let extent_count = require(extent_count, "extent_count", &mut missing);
    let ty = require(ty, "type", &mut missing);
    let (Some(start_extent), Some(extent_count), Some(ty)) = (start_extent, extent_count, ty)
    else {
        return Err(LayoutError::MissingFields(missing));
    };

    Ok(Segment {
        start_extent,
        extent_count,
        ty,
        stripe_count,
        stripe_size,
        stripes: stripes.unwrap_or_default(),
        mirror_count,
        mirror_log,
        region_size,
        mirrors: mirrors.unwrap_or_default(),
    })
}

// Segment sections are named "segment1", "segment2", ... and must
// appear in that order.
fn segment_index(lv: &str, name: &str) -> Result<u64, LayoutError> {
    let digits = name
        .strip_prefix("segment")
        .filter(|d| !d.is_empty() && d.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(|| LayoutError::UnknownKey(name.to_string()))?;
    let n = parse_u64(name, digits)?;
    if n == 0 {
        return Err(LayoutError::SegmentOrder {
            lv: lv.to_string(),
            reason: "segments are numbered from 1",
        });
    }
    Ok(n)
}

/// Construct an LV from its DOM section.
pub fn from_dom(name: &str, sect: &DomSection) -> Result<LV, LayoutError> {
    let mut id = None;
    let mut status = None;
    let mut flags = None;
    let mut creation_host = None;
    let mut creation_time = None;
    let mut allocation_policy = None;
    let mut segment_count = None;
    let mut segments: Vec<Segment> = Vec::new();

    for child in &sect.children {
        match child {
            DomNode::Value { name: key, value } => match key.as_str() {
                "id" => set_once(key, &mut id, value.clone())?,
                "creation_host" => set_once(key, &mut creation_host, value.clone())?,
                "creation_time" => set_once(key, &mut creation_time, parse_u64(key, value)?)?,
                "allocation_policy" => set_once(key, &mut allocation_policy, value.clone())?,
                "segment_count" => set_once(key, &mut segment_count, parse_u64(key, value)?)?,
                _ => return Err(LayoutError::UnknownKey(key.clone())),
            },
            DomNode::Array {
                name: key,
                elements,
            } => match key.as_str() {
                "status" => set_once(key, &mut status, LvStatus::from_list(elements)?)?,
                "flags" => set_once(key, &mut flags, elements.clone())?,
                _ => return Err(LayoutError::UnknownKey(key.clone())),
            },
            DomNode::Section(s) => {
                let n = segment_index(name, &s.name)?;
                let expected = segments.len() as u64 + 1;
                if n < expected {
                    return Err(LayoutError::DuplicateKey(s.name.clone()));
                }
                if n > expected {
                    return Err(LayoutError::SegmentOrder {
                        lv: name.to_string(),
                        reason: "segment sections out of order or missing",
                    });
                }
                segments.push(segment_from_dom(s)?);
            }
        }
    }

    let mut missing = Vec::new();
    let id = require(id, "id", &mut missing);
    let status = require(status, "status", &mut missing);
    let segment_count = require(segment_count, "segment_count", &mut missing);
    let (Some(id), Some(status), Some(segment_count)) = (id, status, segment_count) else {
        return Err(LayoutError::MissingFields(missing));
    };

    if segment_count != segments.len() as u64 {
        return Err(LayoutError::SegmentOrder {
            lv: name.to_string(),
            reason: "segment_count disagrees with the segment sections",
        });
    }

    Ok(LV {
        name: name.to_string(),
        id,
        status,
        flags: flags.unwrap_or_default(),
        creation_host,
        creation_time,
        allocation_policy,
        segment_count,
        segments,
    })
}

impl LV {
    /// The total number of extents used by this logical volume.
    pub fn used_extents(&self) -> u64 {
        self.segments.iter().map(|x| x.extent_count).sum()
    }
}

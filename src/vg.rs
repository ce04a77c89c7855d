// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Volume Groups and the layout builder.
//!
//! `layout_from_dom` walks the parsed document into the typed model:
//! Layout -> VG -> { PV..., LV -> Segment -> PvLocation... }. It is a
//! pure function of the DOM: strict about unknown and duplicate keys,
//! and it reports all missing required keys of a section at once.

use bitflags::bitflags;

use crate::error::LayoutError;
use crate::lv::{self, LV};
use crate::parser::{DomNode, DomSection};
use crate::pv::{self, PV};
use crate::util::{parse_u64, require, set_once};

/// The only metadata format this crate understands.
pub const VG_FORMAT: &str = "lvm2";

bitflags! {
    /// Status flags recognized on a volume group.
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct VgStatus: u32 {
        const RESIZEABLE = 0x1;
        const READ = 0x2;
        const WRITE = 0x4;
    }
}

impl VgStatus {
    pub(crate) fn from_list(elements: &[String]) -> Result<VgStatus, LayoutError> {
        let mut status = VgStatus::empty();
        for e in elements {
            status |= match e.as_str() {
                "RESIZEABLE" => VgStatus::RESIZEABLE,
                "READ" => VgStatus::READ,
                "WRITE" => VgStatus::WRITE,
                _ => return Err(LayoutError::UnknownStatus(e.clone())),
            };
        }
        Ok(status)
    }
}

/// A Volume Group: a pool of PV extents that LVs are allocated from.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct VG {
    /// Uuid.
    pub id: String,
    /// The generation of metadata this VG represents.
    pub seqno: u64,
    /// Always "lvm2".
    pub format: String,
    /// Status.
    pub status: VgStatus,
    /// Free-form flags.
    pub flags: Vec<String>,
    /// Size of each extent, in 512-byte sectors.
    pub extent_size: u64,
    /// Maximum number of LVs, 0 means no limit.
    pub max_lv: u64,
    /// Maximum number of PVs, 0 means no limit.
    pub max_pv: u64,
    /// How many copies of the metadata to keep, defaults to 1.
    pub metadata_copies: u64,
    /// Physical volumes, in source order.
    pub physical_volumes: Vec<PV>,
    /// Logical volumes, in source order.
    pub logical_volumes: Vec<LV>,
}

/// The whole parsed text-metadata document: the VG plus the outer
/// bookkeeping keys, all of which are optional on disk.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Layout {
    /// Name of the top-level section describing the VG.
    pub vg_name: String,
    pub vg: VG,
    pub contents: Option<String>,
    pub version: Option<u64>,
    pub description: Option<String>,
    pub creation_host: Option<String>,
    pub creation_time: Option<u64>,
}

// Every child of physical_volumes / logical_volumes must itself be a
// section describing one volume.
fn volume_sections<'a, T, F>(sect: &'a DomSection, build: F) -> Result<Vec<T>, LayoutError>
where
    F: Fn(&'a str, &'a DomSection) -> Result<T, LayoutError>,
{
    let mut seen: Vec<&str> = Vec::new();
    let mut volumes = Vec::new();

    for child in &sect.children {
        let DomNode::Section(s) = child else {
            return Err(LayoutError::UnknownKey(child.name().to_string()));
        };
        if seen.contains(&s.name.as_str()) {
            return Err(LayoutError::DuplicateKey(s.name.clone()));
        }
        seen.push(&s.name);
        volumes.push(build(&s.name, s)?);
    }

    Ok(volumes)
}

/// Construct a VG from its DOM section. The section's own name is the
/// VG name and is recorded by the caller.
pub fn from_dom(sect: &DomSection) -> Result<VG, LayoutError> {
    let mut id = None;
    let mut seqno = None;
    let mut format = None;
    let mut status = None;
    let mut flags = None;
    let mut extent_size = None;
    let mut max_lv = None;
    let mut max_pv = None;
    let mut metadata_copies = None;
    let mut physical_volumes = None;
    let mut logical_volumes = None;

    for child in &sect.children {
        match child {
            DomNode::Value { name: key, value } => match key.as_str() {
                "id" => set_once(key, &mut id, value.clone())?,
                "seqno" => set_once(key, &mut seqno, parse_u64(key, value)?)?,
                "format" => set_once(key, &mut format, value.clone())?,
                "extent_size" => set_once(key, &mut extent_size, parse_u64(key, value)?)?,
                "max_lv" => set_once(key, &mut max_lv, parse_u64(key, value)?)?,
                "max_pv" => set_once(key, &mut max_pv, parse_u64(key, value)?)?,
                "metadata_copies" => {
                    set_once(key, &mut metadata_copies, parse_u64(key, value)?)?
                }
                _ => return Err(LayoutError::UnknownKey(key.clone())),
            },
            DomNode::Array {
                name: key,
                elements,
            } => match key.as_str() {
                "status" => set_once(key, &mut status, VgStatus::from_list(elements)?)?,
                "flags" => set_once(key, &mut flags, elements.clone())?,
                _ => return Err(LayoutError::UnknownKey(key.clone())),
            },
            DomNode::Section(s) => match s.name.as_str() {
                "physical_volumes" => set_once(
                    &s.name,
                    &mut physical_volumes,
                    volume_sections(s, pv::from_dom)?,
                )?,
                "logical_volumes" => set_once(
                    &s.name,
                    &mut logical_volumes,
                    volume_sections(s, lv::from_dom)?,
                )?,
                _ => return Err(LayoutError::UnknownKey(s.name.clone())),
            },
        }
    }

    let mut missing = Vec::new();
    let id = require(id, "id", &mut missing);
    let seqno = require(seqno, "seqno", &mut missing);
    let format = require(format, "format", &mut missing);
    let status = require(status, "status", &mut missing);
    let extent_size = require(extent_size, "extent_size", &mut missing);
    let max_lv = require(max_lv, "max_lv", &mut missing);
    let max_pv = require(max_pv, "max_pv", &mut missing);
    let physical_volumes = require(physical_volumes, "physical_volumes", &mut missing);
    let (
        Some(id),
        Some(seqno),
        Some(format),
        Some(status),
        Some(extent_size),
        Some(max_lv),
        Some(max_pv),
        Some(physical_volumes),
    ) = (
        id,
        seqno,
        format,
        status,
        extent_size,
        max_lv,
        max_pv,
        physical_volumes,
    )
    else {
        return Err(LayoutError::MissingFields(missing));
    };

    if format != VG_FORMAT {
        return Err(LayoutError::FormatMismatch(format));
    }

    Ok(VG {
        id,
        seqno,
        format,
        status,
        flags: flags.unwrap_or_default(),
        extent_size,
        max_lv,
        max_pv,
        metadata_copies: metadata_copies.unwrap_or(1),
        physical_volumes,
        logical_volumes: logical_volumes.unwrap_or_default(),
    })
}

/// Build the typed model from a parsed document. The single top-level
/// subsection names the VG; the remaining top-level keys are document
/// bookkeeping.
pub fn layout_from_dom(root: &DomSection) -> Result<Layout, LayoutError> {
    let mut contents = None;
    let mut version = None;
    let mut description = None;
    let mut creation_host = None;
    let mut creation_time = None;
    let mut vg = None;

    for child in &root.children {
        match child {
            DomNode::Value { name: key, value } => match key.as_str() {
                "contents" => set_once(key, &mut contents, value.clone())?,
                "version" => set_once(key, &mut version, parse_u64(key, value)?)?,
                "description" => set_once(key, &mut description, value.clone())?,
                "creation_host" => set_once(key, &mut creation_host, value.clone())?,
                "creation_time" => set_once(key, &mut creation_time, parse_u64(key, value)?)?,
                _ => return Err(LayoutError::UnknownKey(key.clone())),
            },
            DomNode::Array { name: key, .. } => {
                return Err(LayoutError::UnknownKey(key.clone()))
            }
            DomNode::Section(s) => {
                // Exactly one top-level subsection: the VG.
                if vg.is_some() {
                    return Err(LayoutError::UnknownKey(s.name.clone()));
                }
                vg = Some((s.name.clone(), from_dom(s)?));
            }
        }
    }

    let Some((vg_name, vg)) = vg else {
        return Err(LayoutError::MissingFields(vec![
            "volume group section".to_string(),
        ]));
    };

    Ok(Layout {
        vg_name,
        vg,
        contents,
        version,
        description,
        creation_host,
        creation_time,
    })
}

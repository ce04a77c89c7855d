// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Physical Volumes.

use bitflags::bitflags;

use crate::error::LayoutError;
use crate::parser::{DomNode, DomSection};
use crate::util::{parse_u64, require, set_once};

bitflags! {
    /// Status flags recognized on a physical volume.
    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    pub struct PvStatus: u32 {
        const ALLOCATABLE = 0x1;
    }
}

impl PvStatus {
    pub(crate) fn from_list(elements: &[String]) -> Result<PvStatus, LayoutError> {
        let mut status = PvStatus::empty();
        for e in elements {
            status |= match e.as_str() {
                "ALLOCATABLE" => PvStatus::ALLOCATABLE,
                _ => return Err(LayoutError::UnknownStatus(e.clone())),
            };
        }
        Ok(status)
    }
}

/// A Physical Volume as described by the VG's text metadata.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PV {
    /// The mostly-useless name (the subsection's name, e.g. "pv0").
    pub name: String,
    /// Textual UUID: 38 characters, dash-separated.
    pub id: String,
    /// Device path recorded at write time; advisory only.
    pub device: String,
    /// Status.
    pub status: PvStatus,
    /// Free-form flags.
    pub flags: Vec<String>,
    /// The device's size in bytes, if recorded.
    pub dev_size: Option<u64>,
    /// The offset in sectors of where the first extent starts.
    pub pe_start: u64,
    /// The number of extents in the PV.
    pub pe_count: u64,
}

/// Construct a PV from its DOM section.
pub fn from_dom(name: &str, sect: &DomSection) -> Result<PV, LayoutError> {
    let mut id = None;
    let mut device = None;
    let mut status = None;
    let mut flags = None;
    let mut dev_size = None;
    let mut pe_start = None;
    let mut pe_count = None;

    for child in &sect.children {
        match child {
            DomNode::Value { name: key, value } => match key.as_str() {
                "id" => set_once(key, &mut id, value.clone())?,
                "device" => set_once(key, &mut device, value.clone())?,
                "dev_size" => set_once(key, &mut dev_size, parse_u64(key, value)?)?,
                "pe_start" => set_once(key, &mut pe_start, parse_u64(key, value)?)?,
                "pe_count" => set_once(key, &mut pe_count, parse_u64(key, value)?)?,
                _ => return Err(LayoutError::UnknownKey(key.clone())),
            },
            DomNode::Array {
                name: key,
                elements,
            } => match key.as_str() {
                "status" => set_once(key, &mut status, PvStatus::from_list(elements)?)?,
                "flags" => set_once(key, &mut flags, elements.clone())?,
                _ => return Err(LayoutError::UnknownKey(key.clone())),
            },
            DomNode::Section(s) => return Err(LayoutError::UnknownKey(s.name.clone())),
        }
    }

    let mut missing = Vec::new();
    let id = require(id, "id", &mut missing);
    let device = require(device, "device", &mut missing);
    let status = require(status, "status", &mut missing);
    let pe_start = require(pe_start, "pe_start", &mut missing);
    let pe_count = require(pe_count, "pe_count", &mut missing);
    let (Some(id), Some(device), Some(status), Some(pe_start), Some(pe_count)) =
        (id, device, status, pe_start, pe_count)
    else {
        return Err(LayoutError::MissingFields(missing));
    };

    Ok(PV {
        name: name.to_string(),
        id,
        device,
        status,
        flags: flags.unwrap_or_default(),
        dev_size,
        pe_start,
        pe_count,
    })
}

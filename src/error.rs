// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Error types.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures while turning the text metadata into a DOM.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ParseError {
    #[error("syntax error at byte {at}: {message}")]
    Syntax { at: usize, message: String },

    /// The document nests sections deeper than the format allows.
    #[error("section nesting too deep")]
    DepthExceeded,
}

/// Failures while turning the DOM into the typed VG/PV/LV model.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum LayoutError {
    #[error("unexpected key \"{0}\"")]
    UnknownKey(String),

    #[error("duplicate key \"{0}\"")]
    DuplicateKey(String),

    /// Lists every required key absent from the section, not just the
    /// first one encountered.
    #[error("missing required keys: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("unknown status value \"{0}\"")]
    UnknownStatus(String),

    #[error("integer value for \"{0}\" out of range")]
    Overflow(String),

    #[error("bad value for \"{key}\": {reason}")]
    BadValue { key: String, reason: &'static str },

    #[error("logical volume \"{lv}\": {reason}")]
    SegmentOrder { lv: String, reason: &'static str },

    #[error("unsupported metadata format \"{0}\"")]
    FormatMismatch(String),
}

/// Anything that can go wrong while decoding a device.
#[derive(Debug, Error)]
pub enum Error {
    #[error("device read failed: {0}")]
    Io(#[from] io::Error),

    /// The scanned sectors contain no valid LVM2 label; the device is
    /// not an LVM physical volume.
    #[error("no LVM2 label in the first four sectors")]
    NoLabel,

    #[error("bad magic in {0}")]
    BadMagic(&'static str),

    #[error("label at sector {found} reports sector {reported}")]
    BadSectorSelf { found: u64, reported: u64 },

    #[error("checksum mismatch in {region}: stored {stored:#010x}, computed {computed:#010x}")]
    BadCrc {
        region: &'static str,
        stored: u32,
        computed: u32,
    },

    #[error("PV header runs past the end of the label sector")]
    HeaderOverflow,

    #[error("PV header has {data} data areas but {meta} metadata areas")]
    AreaMismatch { data: usize, meta: usize },

    #[error("unsupported metadata area version {0}")]
    UnsupportedMdaVersion(u32),

    #[error("metadata area has no active raw location")]
    NoRawLocn,

    #[error("metadata area has more than one raw location")]
    MultipleRawLocns,

    #[error("raw location lies outside its metadata area")]
    RawLocnOutOfRange,

    /// The mda_header's self-reported start/size disagrees with the
    /// disk_locn that led us to it.
    #[error("metadata area header start/size disagrees with the PV header")]
    MdaMismatch,

    #[error("text metadata does not describe this physical volume")]
    NoPvMatch,

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Read-only decoder for LVM2 physical-volume metadata.
//!
//! Given a block device formatted as an LVM2 PV, the crate locates the
//! label, follows the PV header to a metadata area, validates and
//! parses the text metadata, and reports the byte extents of every
//! logical volume that has data on this device:
//!
//! ```no_run
//! use lvm2scan::{parse_device, FileDevice};
//!
//! let mut dev = FileDevice::open("/dev/sdb")?;
//! parse_device(&mut dev, |vol| {
//!     println!("{}: {} bytes at {}", vol.name, vol.length, vol.start);
//!     true
//! })?;
//! # Ok::<(), lvm2scan::Error>(())
//! ```
//!
//! Devices are only ever read. Multi-PV volume groups are decoded per
//! device; segments living on other PVs are skipped, and volumes that
//! also span other devices are reported with `is_incomplete` set.

pub mod device;
pub mod error;
pub mod lexer;
pub mod lv;
pub mod parser;
pub mod pv;
pub mod pvlabel;
pub mod scan;
pub mod util;
pub mod vg;

pub use device::{BlockDevice, FileDevice};
pub use error::{Error, LayoutError, ParseError, Result};
pub use lv::{LvStatus, PvLocation, Segment, LV};
pub use parser::{parse_text, DomNode, DomSection};
pub use pv::{PvStatus, PV};
pub use pvlabel::{Label, MdaHeader, PvArea, PvHeader, RawLocn};
pub use scan::{parse_device, read_text, VolumeInfo};
pub use vg::{layout_from_dom, Layout, VgStatus, VG};

/// Verify the decoder's notion of the fixed on-disk structure sizes:
/// label_header = 32, disk_locn = 16, pv_header = 40, raw_locn = 24,
/// mda_header = 40.
pub fn check_layout() -> bool {
    Label::SIZE == 32
        && PvArea::SIZE == 16
        && PvHeader::SIZE == 40
        && RawLocn::SIZE == 24
        && MdaHeader::SIZE == 40
}

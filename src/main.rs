// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Dump the logical volumes found on an LVM2 physical volume (or an
//! image of one).

use std::env;
use std::process::ExitCode;

use lvm2scan::{check_layout, parse_device, FileDevice};

fn main() -> ExitCode {
    env_logger::init();

    if !check_layout() {
        eprintln!("build error: incorrect on-disk struct definitions");
        return ExitCode::FAILURE;
    }

    let Some(path) = env::args().nth(1) else {
        eprintln!("usage: lvm2scan <device-or-image>");
        return ExitCode::FAILURE;
    };

    let mut dev = match FileDevice::open(&path) {
        Ok(dev) => dev,
        Err(e) => {
            eprintln!("{path}: {e}");
            return ExitCode::FAILURE;
        }
    };

    let mut size_printed = false;
    let result = parse_device(&mut dev, |vol| {
        if !size_printed {
            println!("device size: {}", vol.device_size);
            size_printed = true;
        }
        println!(
            "{}: [{}-{}]{}",
            vol.name,
            vol.start,
            vol.start + vol.length,
            if vol.is_incomplete {
                " (incomplete)"
            } else {
                ""
            }
        );
        true
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{path}: {e}");
            ExitCode::FAILURE
        }
    }
}

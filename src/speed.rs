// Copyright 2025 the terminfo-source developers
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Terminal output speed
//!
//! The encoded ospeed value and the raw baudrate drive padding. Both can
//! be forced through the environment; otherwise ospeed is read from the
//! terminal driver and the baudrate follows from the classic encoding
//! table.

use std::{env, os::fd::BorrowedFd};

use tracing::warn;

/// The classic ospeed encoding: `B0`..`B38400` are 0..15, the extended
/// speeds carry the `CBAUDEX` bit
const OSPEED_TO_BAUD: &[(i32, i32)] = &[
    (0, 0),
    (1, 50),
    (2, 75),
    (3, 110),
    (4, 134),
    (5, 150),
    (6, 200),
    (7, 300),
    (8, 600),
    (9, 1200),
    (10, 1800),
    (11, 2400),
    (12, 4800),
    (13, 9600),
    (14, 19200),
    (15, 38400),
    (4097, 57600),
    (4098, 115_200),
    (4099, 230_400),
    (4100, 460_800),
    (4101, 500_000),
    (4102, 576_000),
    (4103, 921_600),
    (4104, 1_000_000),
    (4105, 1_152_000),
    (4107, 2_000_000),
    (4108, 2_500_000),
    (4109, 3_000_000),
    (4110, 3_500_000),
    (4111, 4_000_000),
];

/// Encoded and raw output speed of the selected terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Speed {
    pub ospeed: i32,
    pub baudrate: i32,
}

/// Translate an encoded ospeed to bits per second
///
/// Unknown values translate to 0 with a warning.
pub fn baudrate_for_ospeed(ospeed: i32) -> i32 {
    match OSPEED_TO_BAUD.iter().find(|(key, _)| *key == ospeed) {
        Some((_, baudrate)) => *baudrate,
        None => {
            warn!(ospeed, "unknown ospeed, assuming baudrate 0");
            0
        }
    }
}

/// Determine the terminal output speed
///
/// `TERMINFO_OSPEED` overrides the terminal driver; `TERMINFO_BAUDRATE`
/// overrides the encoding table. Without overrides the speed comes from
/// the terminal attributes of `fd` (standard input when `None`); a
/// terminal-less process simply keeps ospeed 0.
pub fn detect(fd: Option<BorrowedFd>) -> Speed {
    let ospeed = match env::var("TERMINFO_OSPEED") {
        Ok(value) => match parse_ospeed(&value) {
            Some(ospeed) => ospeed,
            None => {
                warn!(%value, "invalid TERMINFO_OSPEED, ignored");
                query_ospeed(fd).unwrap_or(0)
            }
        },
        Err(_) => query_ospeed(fd).unwrap_or(0),
    };

    let baudrate = match env::var("TERMINFO_BAUDRATE") {
        Ok(value) => match value.parse() {
            Ok(baudrate) => baudrate,
            Err(_) => {
                warn!(%value, "invalid TERMINFO_BAUDRATE, ignored");
                baudrate_for_ospeed(ospeed)
            }
        },
        Err(_) => baudrate_for_ospeed(ospeed),
    };

    Speed { ospeed, baudrate }
}

fn parse_ospeed(value: &str) -> Option<i32> {
    let ospeed = value.parse().ok()?;
    OSPEED_TO_BAUD
        .iter()
        .any(|(key, _)| *key == ospeed)
        .then_some(ospeed)
}

#[cfg(unix)]
fn query_ospeed(fd: Option<BorrowedFd>) -> Option<i32> {
    use std::os::fd::AsFd;

    let stdin = std::io::stdin();
    let fd = fd.unwrap_or_else(|| stdin.as_fd());
    let termios = nix::sys::termios::tcgetattr(fd).ok()?;
    let ospeed = nix::sys::termios::cfgetospeed(&termios);
    Some(ospeed as i32)
}

#[cfg(not(unix))]
fn query_ospeed(_fd: Option<BorrowedFd>) -> Option<i32> {
    None
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn known_speeds() {
        assert_eq!(baudrate_for_ospeed(0), 0);
        assert_eq!(baudrate_for_ospeed(13), 9600);
        assert_eq!(baudrate_for_ospeed(15), 38400);
        assert_eq!(baudrate_for_ospeed(4098), 115_200);
        assert_eq!(baudrate_for_ospeed(4111), 4_000_000);
    }

    #[test]
    fn unknown_speed_is_zero() {
        assert_eq!(baudrate_for_ospeed(16), 0);
        assert_eq!(baudrate_for_ospeed(4106), 0);
        assert_eq!(baudrate_for_ospeed(-1), 0);
    }

    #[test]
    fn ospeed_override() {
        temp_env::with_vars(
            [
                ("TERMINFO_OSPEED", Some("14")),
                ("TERMINFO_BAUDRATE", None),
            ],
            || {
                assert_eq!(
                    detect(None),
                    Speed {
                        ospeed: 14,
                        baudrate: 19200,
                    }
                );
            },
        );
    }

    #[test]
    fn baudrate_override() {
        temp_env::with_vars(
            [
                ("TERMINFO_OSPEED", Some("13")),
                ("TERMINFO_BAUDRATE", Some("45000")),
            ],
            || {
                assert_eq!(
                    detect(None),
                    Speed {
                        ospeed: 13,
                        baudrate: 45000,
                    }
                );
            },
        );
    }

    #[test]
    fn out_of_domain_ospeed_rejected() {
        temp_env::with_vars(
            [
                ("TERMINFO_OSPEED", Some("4106")),
                ("TERMINFO_BAUDRATE", Some("0")),
            ],
            || {
                // 4106 is a hole in the encoding, so the override is
                // dropped and the driver query decides.
                let speed = detect(None);
                assert_ne!(speed.ospeed, 4106);
            },
        );
    }
}

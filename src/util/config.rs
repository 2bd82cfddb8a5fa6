// Copyright 2018 The RangeKV Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// See the License for the specific language governing permissions and
// limitations under the License.

use std::fmt::{self, Write};
use std::ops::{Div, Mul};
use std::time::Duration;

use serde::de::{self, Unexpected, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

const SECOND: u64 = 1000;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;

/// A duration that (de)serializes from strings like `3s`, `150ms` or `2m30s`.
#[derive(Clone, Debug, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReadableDuration(pub Duration);

impl ReadableDuration {
    pub fn secs(secs: u64) -> ReadableDuration {
        ReadableDuration(Duration::from_secs(secs))
    }

    pub fn millis(millis: u64) -> ReadableDuration {
        ReadableDuration(Duration::from_millis(millis))
    }

    pub fn minutes(minutes: u64) -> ReadableDuration {
        ReadableDuration::secs(minutes * 60)
    }

    pub fn as_secs(&self) -> u64 {
        self.0.as_secs()
    }

    pub fn as_millis(&self) -> u64 {
        self.0.as_secs() * SECOND + u64::from(self.0.subsec_nanos()) / 1_000_000
    }

    pub fn is_zero(&self) -> bool {
        self.as_millis() == 0
    }
}

impl From<ReadableDuration> for Duration {
    fn from(readable: ReadableDuration) -> Duration {
        readable.0
    }
}

impl Mul<u32> for ReadableDuration {
    type Output = ReadableDuration;

    fn mul(self, rhs: u32) -> ReadableDuration {
        ReadableDuration(self.0 * rhs)
    }
}

impl Div<u32> for ReadableDuration {
    type Output = ReadableDuration;

    fn div(self, rhs: u32) -> ReadableDuration {
        ReadableDuration(self.0 / rhs)
    }
}

impl Serialize for ReadableDuration {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut dur = self.as_millis();
        let mut buffer = String::new();
        if dur >= HOUR {
            write!(buffer, "{}h", dur / HOUR).unwrap();
            dur %= HOUR;
        }
        if dur >= MINUTE {
            write!(buffer, "{}m", dur / MINUTE).unwrap();
            dur %= MINUTE;
        }
        if dur >= SECOND {
            write!(buffer, "{}s", dur / SECOND).unwrap();
            dur %= SECOND;
        }
        if dur > 0 {
            write!(buffer, "{}ms", dur).unwrap();
        }
        if buffer.is_empty() && dur == 0 {
            write!(buffer, "0s").unwrap();
        }
        serializer.serialize_str(&buffer)
    }
}

impl<'de> Deserialize<'de> for ReadableDuration {
    fn deserialize<D>(deserializer: D) -> Result<ReadableDuration, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct DurVisitor;

        impl<'de> Visitor<'de> for DurVisitor {
            type Value = ReadableDuration;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("valid duration")
            }

            fn visit_str<E>(self, dur_str: &str) -> Result<ReadableDuration, E>
            where
                E: de::Error,
            {
                let err = || E::invalid_value(
                    Unexpected::Str(dur_str),
                    &"valid duration, only h, m, s, ms are supported.",
                );
                let bytes = dur_str.trim().as_bytes();
                let mut dur = 0f64;
                let mut units = 0;
                // Units must appear in strictly descending order, so "1h1h"
                // and "2s4m" are rejected.
                let mut prev_unit = u64::max_value();
                let mut i = 0;
                while i < bytes.len() {
                    let start = i;
                    while i < bytes.len()
                        && (bytes[i].is_ascii_digit() || bytes[i] == b'.' || bytes[i] == b' ')
                    {
                        i += 1;
                    }
                    let num: f64 = ::std::str::from_utf8(&bytes[start..i])
                        .ok()
                        .and_then(|s| s.trim().parse().ok())
                        .ok_or_else(&err)?;
                    let (unit_millis, unit_len) = if bytes[i..].starts_with(b"ms") {
                        (1, 2)
                    } else {
                        match bytes.get(i) {
                            Some(&b'h') => (HOUR, 1),
                            Some(&b'm') => (MINUTE, 1),
                            Some(&b's') => (SECOND, 1),
                            _ => return Err(err()),
                        }
                    };
                    if unit_millis >= prev_unit {
                        return Err(err());
                    }
                    prev_unit = unit_millis;
                    i += unit_len;
                    dur += num * unit_millis as f64;
                    units += 1;
                }
                if units == 0 {
                    return Err(err());
                }
                Ok(ReadableDuration(Duration::from_millis(dur as u64)))
            }
        }

        deserializer.deserialize_str(DurVisitor)
    }
}

//! Owner meeting-length preferences.
//!
//! The minimum length is the granularity used to split published availability
//! into bookable slots during visibility computation.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScheduleError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MeetingDurations {
    min_length: u32,
    max_length: u32,
}

impl MeetingDurations {
    pub const FIFTEEN: MeetingDurations = MeetingDurations {
        min_length: 15,
        max_length: 15,
    };
    pub const THIRTY: MeetingDurations = MeetingDurations {
        min_length: 30,
        max_length: 30,
    };
    pub const THIRTY_SIXTY: MeetingDurations = MeetingDurations {
        min_length: 30,
        max_length: 60,
    };
    pub const FORTY_FIVE: MeetingDurations = MeetingDurations {
        min_length: 45,
        max_length: 45,
    };

    /// # Errors
    /// Returns `ScheduleError::InvalidDurations` if `min_length` is 0 or
    /// `max_length` is shorter than `min_length`.
    pub fn new(min_length: u32, max_length: u32) -> Result<Self> {
        if min_length < 1 {
            return Err(ScheduleError::InvalidDurations(
                "minimum length must be at least 1 minute".to_string(),
            ));
        }
        if max_length < min_length {
            return Err(ScheduleError::InvalidDurations(format!(
                "maximum length ({}) is shorter than minimum length ({})",
                max_length, min_length
            )));
        }
        Ok(Self {
            min_length,
            max_length,
        })
    }

    /// Parse a preference key: `"30"` (min = max = 30) or `"30,60"`.
    pub fn from_key(key: &str) -> Result<Self> {
        let tokens: Vec<&str> = key.split(',').map(str::trim).collect();
        let parse = |token: &str| {
            token.parse::<u32>().map_err(|_| {
                ScheduleError::InvalidDurations(format!(
                    "could not convert key to an integer: {}",
                    key
                ))
            })
        };
        match tokens.as_slice() {
            [min] => {
                let min = parse(min)?;
                Self::new(min, min)
            }
            [min, max] => Self::new(parse(min)?, parse(max)?),
            _ => Err(ScheduleError::InvalidDurations(format!(
                "expected one or two comma-separated lengths: {}",
                key
            ))),
        }
    }

    pub fn min_length(&self) -> u32 {
        self.min_length
    }

    pub fn max_length(&self) -> u32 {
        self.max_length
    }

    pub fn is_double_length(&self) -> bool {
        self.min_length.checked_mul(2) == Some(self.max_length)
    }

    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for MeetingDurations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min_length == self.max_length {
            write!(f, "{}", self.min_length)
        } else {
            write!(f, "{},{}", self.min_length, self.max_length)
        }
    }
}

impl TryFrom<String> for MeetingDurations {
    type Error = ScheduleError;

    fn try_from(key: String) -> Result<Self> {
        Self::from_key(&key)
    }
}

impl From<MeetingDurations> for String {
    fn from(durations: MeetingDurations) -> Self {
        durations.key()
    }
}

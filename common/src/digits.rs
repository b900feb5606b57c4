use core::fmt;

use crate::error::{Error, Result};

pub const CELL_COUNT: usize = 4;

/// Seven-segment patterns indexed by decimal digit, bit layout `XGFEDCBA`.
pub const DIGIT_PATTERNS: [u8; 10] = [
    0b0011_1111, // 0
    0b0000_0110, // 1
    0b0101_1011, // 2
    0b0100_1111, // 3
    0b0110_0110, // 4
    0b0110_1101, // 5
    0b0111_1101, // 6
    0b0000_0111, // 7
    0b0111_1111, // 8
    0b0110_1111, // 9
];

pub const COLON_CELL: usize = 1;
pub const COLON_MASK: u8 = 0b1000_0000;

pub const ALL_SEGMENTS: [u8; CELL_COUNT] = [0xFF; CELL_COUNT];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSample {
    hour: u8,
    minute: u8,
    second: u8,
}

impl TimeSample {
    pub fn new(hour: u8, minute: u8, second: u8) -> Result<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(Error::InvalidTime {
                hour,
                minute,
                second,
            });
        }

        Ok(Self {
            hour,
            minute,
            second,
        })
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    pub fn second(self) -> u8 {
        self.second
    }
}

impl fmt::Display for TimeSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hour, self.minute, self.second)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentFrame([u8; CELL_COUNT]);

impl SegmentFrame {
    pub fn cells(&self) -> [u8; CELL_COUNT] {
        self.0
    }

    pub fn colon(&self) -> bool {
        self.0[COLON_CELL] & COLON_MASK != 0
    }

    pub fn digit(&self, index: usize) -> Option<u8> {
        let pattern = self.0.get(index)? & !COLON_MASK;
        decode_pattern(pattern)
    }
}

impl fmt::Display for SegmentFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for index in 0..CELL_COUNT {
            if index == 2 {
                f.write_str(if self.colon() { ":" } else { " " })?;
            }
            match self.digit(index) {
                Some(digit) => write!(f, "{digit}")?,
                None => f.write_str("?")?,
            }
        }
        Ok(())
    }
}

pub fn decode_pattern(pattern: u8) -> Option<u8> {
    DIGIT_PATTERNS
        .iter()
        .position(|&candidate| candidate == pattern)
        .map(|digit| digit as u8)
}

pub fn encode(time: TimeSample) -> SegmentFrame {
    let mut cells = [
        DIGIT_PATTERNS[usize::from(time.hour / 10)],
        DIGIT_PATTERNS[usize::from(time.hour % 10)],
        DIGIT_PATTERNS[usize::from(time.minute / 10)],
        DIGIT_PATTERNS[usize::from(time.minute % 10)],
    ];

    // 1 Hz blink locked to wall-clock seconds.
    if time.second % 2 == 0 {
        cells[COLON_CELL] |= COLON_MASK;
    }

    SegmentFrame(cells)
}

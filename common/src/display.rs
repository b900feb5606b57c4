use core::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    digits::{SegmentFrame, ALL_SEGMENTS, CELL_COUNT},
    error::{Error, Result},
};

pub const MAX_BRIGHTNESS: u8 = 7;

pub trait SegmentDisplay {
    type Error: fmt::Display;

    fn set_cell_raw(
        &mut self,
        index: usize,
        pattern: u8,
    ) -> core::result::Result<(), Self::Error>;

    fn set_brightness(&mut self, level: u8) -> core::result::Result<(), Self::Error>;
}

#[derive(Debug)]
struct DisplayState<D> {
    driver: D,
    last_frame: Option<SegmentFrame>,
    brightness: Option<u8>,
}

#[derive(Debug)]
pub struct SharedDisplay<D> {
    inner: Arc<Mutex<DisplayState<D>>>,
}

impl<D> Clone for SharedDisplay<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: SegmentDisplay> SharedDisplay<D> {
    pub fn new(driver: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(DisplayState {
                driver,
                last_frame: None,
                brightness: None,
            })),
        }
    }

    pub fn lock(&self) -> DisplayGuard<'_, D> {
        DisplayGuard {
            state: self.inner.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }

    pub fn set_brightness(&self, level: u8) -> Result<u8> {
        self.lock().set_brightness(level)
    }

    pub fn last_frame(&self) -> Option<SegmentFrame> {
        self.lock().last_frame()
    }

    pub fn brightness(&self) -> Option<u8> {
        self.lock().brightness()
    }
}

pub struct DisplayGuard<'a, D> {
    state: MutexGuard<'a, DisplayState<D>>,
}

impl<D: SegmentDisplay> DisplayGuard<'_, D> {
    pub fn write_frame(&mut self, frame: SegmentFrame) -> Result<()> {
        self.write_cells(frame.cells())?;
        self.state.last_frame = Some(frame);
        Ok(())
    }

    pub fn light_all_segments(&mut self) -> Result<()> {
        self.write_cells(ALL_SEGMENTS)
    }

    pub fn set_brightness(&mut self, level: u8) -> Result<u8> {
        let level = level.min(MAX_BRIGHTNESS);

        self.state
            .driver
            .set_brightness(level)
            .map_err(|err| Error::Display(err.to_string()))?;
        self.state.brightness = Some(level);

        if let Some(frame) = self.state.last_frame {
            self.write_cells(frame.cells())?;
        }

        Ok(level)
    }

    pub fn last_frame(&self) -> Option<SegmentFrame> {
        self.state.last_frame
    }

    pub fn brightness(&self) -> Option<u8> {
        self.state.brightness
    }

    fn write_cells(&mut self, cells: [u8; CELL_COUNT]) -> Result<()> {
        for (index, pattern) in cells.into_iter().enumerate() {
            self.state
                .driver
                .set_cell_raw(index, pattern)
                .map_err(|err| Error::Display(err.to_string()))?;
        }
        Ok(())
    }
}

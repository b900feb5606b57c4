use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use crate::{
    brightness::AmbientSensor,
    clock::{LocalTime, WallClock},
    display::SegmentDisplay,
    error::{Error, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayOp {
    Cell(usize, u8),
    Brightness(u8),
}

#[derive(Debug, Default)]
struct OpLogState {
    ops: Vec<DisplayOp>,
    fail_writes: bool,
}

#[derive(Debug, Clone, Default)]
pub struct OpLog {
    inner: Arc<Mutex<OpLogState>>,
}

impl OpLog {
    pub fn take(&self) -> Vec<DisplayOp> {
        std::mem::take(&mut self.inner.lock().unwrap().ops)
    }

    pub fn clear(&self) {
        self.inner.lock().unwrap().ops.clear();
    }

    pub fn fail_writes(&self, fail: bool) {
        self.inner.lock().unwrap().fail_writes = fail;
    }

    fn record(&self, op: DisplayOp) -> core::result::Result<(), &'static str> {
        let mut state = self.inner.lock().unwrap();
        if state.fail_writes {
            return Err("bus not acknowledged");
        }
        state.ops.push(op);
        Ok(())
    }
}

#[derive(Debug)]
pub struct RecordingDisplay {
    log: OpLog,
}

impl RecordingDisplay {
    pub fn new() -> (Self, OpLog) {
        let log = OpLog::default();
        (Self { log: log.clone() }, log)
    }
}

impl SegmentDisplay for RecordingDisplay {
    type Error = &'static str;

    fn set_cell_raw(
        &mut self,
        index: usize,
        pattern: u8,
    ) -> core::result::Result<(), Self::Error> {
        self.log.record(DisplayOp::Cell(index, pattern))
    }

    fn set_brightness(&mut self, level: u8) -> core::result::Result<(), Self::Error> {
        self.log.record(DisplayOp::Brightness(level))
    }
}

pub fn local_time(year: i32, hour: u8, minute: u8, second: u8, micros: u32) -> LocalTime {
    LocalTime {
        year,
        month: 1,
        day: 1,
        hour,
        minute,
        second,
        micros,
    }
}

/// Replays scripted readings; the last one repeats once the script runs out.
#[derive(Debug)]
pub struct FakeClock {
    readings: Mutex<VecDeque<Result<LocalTime>>>,
    reads: Mutex<usize>,
}

impl FakeClock {
    pub fn new(readings: impl IntoIterator<Item = Result<LocalTime>>) -> Self {
        Self {
            readings: Mutex::new(readings.into_iter().collect()),
            reads: Mutex::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        *self.reads.lock().unwrap()
    }
}

impl WallClock for FakeClock {
    fn now(&self) -> Result<LocalTime> {
        *self.reads.lock().unwrap() += 1;

        let mut readings = self.readings.lock().unwrap();
        if readings.len() > 1 {
            readings.pop_front().unwrap()
        } else {
            readings
                .front()
                .cloned()
                .unwrap_or_else(|| Err(Error::Clock("no scripted reading".to_string())))
        }
    }
}

#[derive(Debug)]
pub struct ScriptedSensor {
    readings: VecDeque<core::result::Result<u16, &'static str>>,
}

impl ScriptedSensor {
    pub fn new(
        readings: impl IntoIterator<Item = core::result::Result<u16, &'static str>>,
    ) -> Self {
        Self {
            readings: readings.into_iter().collect(),
        }
    }
}

impl AmbientSensor for ScriptedSensor {
    type Error = &'static str;

    fn read_raw(&mut self) -> core::result::Result<u16, Self::Error> {
        self.readings.pop_front().unwrap_or(Err("script exhausted"))
    }
}

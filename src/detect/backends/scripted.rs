use std::collections::{HashSet, VecDeque};

use anyhow::{anyhow, Result};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::RawDetection;
use crate::frame::Frame;

/// Deterministic backend that replays a fixed script, one entry per call.
///
/// Once the script is exhausted every further frame yields no detections.
/// Used by the synthetic demo and by tests that need a known detection stream
/// without loading a model.
#[derive(Default)]
pub struct ScriptedBackend {
    script: VecDeque<Vec<RawDetection>>,
    fail_on: HashSet<u64>,
    calls: u64,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<RawDetection>>) -> Self {
        Self {
            script: script.into(),
            fail_on: HashSet::new(),
            calls: 0,
        }
    }

    /// Make the given zero-based call fail, simulating an inference error.
    /// The script entry for that call is still consumed.
    pub fn fail_on_call(mut self, call: u64) -> Self {
        self.fail_on.insert(call);
        self
    }

    /// Number of `detect` calls made so far.
    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, frame: &Frame) -> Result<Vec<RawDetection>> {
        let call = self.calls;
        self.calls += 1;
        let entry = self.script.pop_front().unwrap_or_default();
        if self.fail_on.contains(&call) {
            return Err(anyhow!(
                "scripted inference failure on frame {}",
                frame.index
            ));
        }
        Ok(entry)
    }
}

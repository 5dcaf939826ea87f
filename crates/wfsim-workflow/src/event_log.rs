//! Log of scheduler events.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::events::{SchedulerEvent, SchedulerListener};
use crate::state::SchedulerState;

/// Listener recording every lifecycle event, savable as JSON.
#[derive(Serialize, Clone, Default)]
pub struct EventLog {
    pub events: Vec<SchedulerEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let json = serde_json::to_string_pretty(self)?;
        File::create(path)?.write_all(json.as_bytes())
    }
}

impl SchedulerListener for EventLog {
    fn on_event(&mut self, event: &SchedulerEvent, _state: &SchedulerState) {
        self.events.push(event.clone());
    }
}

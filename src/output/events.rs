//! JSON-lines writer for update stream events

use crate::stream::StreamEvent;
use std::io::Write;

/// Writes one event per line and flushes after each
pub struct EventWriter<W: Write> {
    writer: W,
}

impl<W: Write> EventWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn write_event(&mut self, event: &StreamEvent) -> std::io::Result<()> {
        writeln!(self.writer, "{}", event.to_json_line())?;
        self.writer.flush()
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

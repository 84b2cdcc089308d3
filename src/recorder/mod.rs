//! # Recorder Module
//!
//! Writes device snapshots to JSONL (JSON Lines) files.
//!
//! Each line is one [`DeviceSnapshot`] stamped with the wall-clock time it was
//! recorded:
//!
//! ```text
//! {"timestamp":"2024-05-01T12:00:00.000Z","name":"Pad","index":0,"buttons":[false,true],"hats":[],"axes":[0.0]}
//! ```
//!
//! Writes can be throttled per device with a minimum interval, measured on the
//! same [`Clock`] the input subsystem stamps presses with. Write failures are
//! logged and counted, never propagated.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::{info, warn};

use crate::controller::clock::{Clock, MonotonicClock};
use crate::controller::snapshot::{DeviceSnapshot, InputConsumer};
use crate::error::Result;

/// One JSONL record
#[derive(Debug, Serialize)]
struct SnapshotRecord<'a> {
    timestamp: String,
    #[serde(flatten)]
    snapshot: &'a DeviceSnapshot,
}

/// Input consumer that appends every received snapshot to a writer
pub struct SnapshotRecorder<W: Write, C: Clock = MonotonicClock> {
    writer: W,
    clock: C,
    min_interval_ms: u64,
    last_written: HashMap<usize, u64>,
    written: u64,
    failures: u64,
}

impl SnapshotRecorder<BufWriter<std::fs::File>> {
    /// Opens (or creates) `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns `Io` if the file cannot be opened.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use joystick_arbiter::recorder::SnapshotRecorder;
    ///
    /// let recorder = SnapshotRecorder::create("./snapshots.jsonl", 0)?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn create<P: AsRef<Path>>(path: P, min_interval_ms: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path.as_ref())?;
        info!("Recording snapshots to {}", path.as_ref().display());
        Ok(Self::new(BufWriter::new(file), min_interval_ms))
    }
}

impl<W: Write> SnapshotRecorder<W> {
    /// Wraps a writer. `min_interval_ms` of 0 records every snapshot.
    pub fn new(writer: W, min_interval_ms: u64) -> Self {
        Self::with_clock(writer, min_interval_ms, MonotonicClock::new())
    }
}

impl<W: Write, C: Clock> SnapshotRecorder<W, C> {
    /// Wraps a writer, throttling against `clock`.
    pub fn with_clock(writer: W, min_interval_ms: u64, clock: C) -> Self {
        Self {
            writer,
            clock,
            min_interval_ms,
            last_written: HashMap::new(),
            written: 0,
            failures: 0,
        }
    }

    /// Number of snapshots written.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Number of snapshots lost to write errors.
    #[must_use]
    pub fn failures(&self) -> u64 {
        self.failures
    }

    /// Consumes the recorder and returns the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    /// Writes one snapshot stamped with `at`, bypassing the throttle.
    ///
    /// # Errors
    ///
    /// Returns `Io` if serialization or the write fails.
    pub fn record_at(&mut self, snapshot: &DeviceSnapshot, at: DateTime<Utc>) -> Result<()> {
        let record = SnapshotRecord {
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            snapshot,
        };
        serde_json::to_writer(&mut self.writer, &record).map_err(std::io::Error::from)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        self.written += 1;
        Ok(())
    }

    fn due(&mut self, device: usize, now_ms: u64) -> bool {
        if self.min_interval_ms == 0 {
            return true;
        }
        match self.last_written.get(&device) {
            Some(&last) if now_ms.saturating_sub(last) < self.min_interval_ms => false,
            _ => {
                self.last_written.insert(device, now_ms);
                true
            }
        }
    }
}

impl<W: Write, C: Clock> InputConsumer for SnapshotRecorder<W, C> {
    fn process_gamepad(&mut self, snapshot: &DeviceSnapshot) {
        if !self.due(snapshot.index, self.clock.now_ms()) {
            return;
        }

        if let Err(e) = self.record_at(snapshot, Utc::now()) {
            self.failures += 1;
            warn!("Failed to record snapshot for {}: {}", snapshot.name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::clock::mocks::ManualClock;
    use crate::controller::hat::HatDirections;
    use chrono::TimeZone;
    use std::io;

    fn snapshot(index: usize) -> DeviceSnapshot {
        DeviceSnapshot {
            name: "Pad".to_string(),
            index,
            buttons: vec![false, true],
            hats: vec![HatDirections::from_raw(1)],
            axes: vec![0.5],
        }
    }

    fn lines<C: Clock>(recorder: SnapshotRecorder<Vec<u8>, C>) -> Vec<serde_json::Value> {
        String::from_utf8(recorder.into_inner())
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Writer that always fails
    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "broken"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_record_format() {
        let mut recorder = SnapshotRecorder::new(Vec::new(), 0);
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        recorder.record_at(&snapshot(0), at).unwrap();

        let records = lines(recorder);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["timestamp"], "2024-05-01T12:00:00.000Z");
        assert_eq!(records[0]["name"], "Pad");
        assert_eq!(records[0]["index"], 0);
        assert_eq!(records[0]["buttons"][1], true);
        assert_eq!(records[0]["hats"][0]["up"], true);
        assert_eq!(records[0]["axes"][0], 0.5);
    }

    #[test]
    fn test_every_snapshot_recorded_without_throttle() {
        let mut recorder = SnapshotRecorder::new(Vec::new(), 0);
        for _ in 0..3 {
            recorder.process_gamepad(&snapshot(0));
        }
        assert_eq!(recorder.written(), 3);
        assert_eq!(lines(recorder).len(), 3);
    }

    #[test]
    fn test_throttle_is_per_device() {
        let mut recorder = SnapshotRecorder::new(Vec::new(), 60_000);
        recorder.process_gamepad(&snapshot(0));
        recorder.process_gamepad(&snapshot(0));
        recorder.process_gamepad(&snapshot(1));

        assert_eq!(recorder.written(), 2);
        let records = lines(recorder);
        assert_eq!(records[0]["index"], 0);
        assert_eq!(records[1]["index"], 1);
    }

    #[test]
    fn test_throttle_follows_clock() {
        let clock = ManualClock::new(5_000);
        let mut recorder = SnapshotRecorder::with_clock(Vec::new(), 100, clock.clone());

        recorder.process_gamepad(&snapshot(0));
        clock.advance(50);
        recorder.process_gamepad(&snapshot(0));
        assert_eq!(recorder.written(), 1);

        clock.advance(50);
        recorder.process_gamepad(&snapshot(0));
        assert_eq!(recorder.written(), 2);
        assert_eq!(lines(recorder).len(), 2);
    }

    #[test]
    fn test_write_failure_is_not_fatal() {
        let mut recorder = SnapshotRecorder::new(BrokenWriter, 0);
        recorder.process_gamepad(&snapshot(0));
        recorder.process_gamepad(&snapshot(0));

        assert_eq!(recorder.written(), 0);
        assert_eq!(recorder.failures(), 2);
    }

    #[test]
    fn test_create_appends_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("snapshots.jsonl");

        {
            let mut recorder = SnapshotRecorder::create(&path, 0).unwrap();
            recorder.process_gamepad(&snapshot(0));
        }
        {
            let mut recorder = SnapshotRecorder::create(&path, 0).unwrap();
            recorder.process_gamepad(&snapshot(1));
        }

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[test]
    fn test_create_in_missing_directory_fails() {
        let dir = tempfile::TempDir::new().unwrap();
        let result = SnapshotRecorder::create(dir.path().join("missing/snapshots.jsonl"), 0);
        assert!(result.is_err());
    }
}

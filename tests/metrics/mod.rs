//! Counters emitted with the `metrics` feature.

use event_journal::{Subject, Writer, WriterConfig, open_file_name};
use metrics::{
    Counter, CounterFn, Gauge, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
};
use std::collections::HashMap;
use std::fs;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

#[derive(Debug, Default)]
struct CounterCell(AtomicU64);

impl CounterFn for CounterCell {
    fn increment(&self, value: u64) {
        self.0.fetch_add(value, Ordering::Relaxed);
    }

    fn absolute(&self, value: u64) {
        self.0.fetch_max(value, Ordering::Relaxed);
    }
}

/// Keeps every counter by name; gauges and histograms are dropped.
#[derive(Debug, Default)]
struct CountingRecorder {
    counters: Mutex<HashMap<String, Arc<CounterCell>>>,
}

impl CountingRecorder {
    fn value(&self, name: &str) -> u64 {
        self.counters
            .lock()
            .expect("recorder lock")
            .get(name)
            .map_or(0, |cell| cell.0.load(Ordering::Relaxed))
    }
}

impl Recorder for CountingRecorder {
    fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
    fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

    fn register_counter(&self, key: &Key, _: &Metadata<'_>) -> Counter {
        let cell = Arc::clone(
            self.counters
                .lock()
                .expect("recorder lock")
                .entry(key.name().to_string())
                .or_default(),
        );
        Counter::from_arc(cell)
    }

    fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
        Gauge::noop()
    }

    fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
        Histogram::noop()
    }
}

#[cfg(test)]
mod tests_metrics {
    use super::*;

    #[test]
    fn test_insert_rotation_and_discard_counters() {
        let recorder = CountingRecorder::default();
        let root = TempDir::new().expect("temp dir");

        metrics::with_local_recorder(&recorder, || {
            let config = WriterConfig::new(root.path(), "Agent").with_max_file_size(300);
            let writer = Writer::with_config(config).expect("writer");
            let detections = Subject::new("Detections").expect("subject");
            let alerts = Subject::new("Alerts").expect("subject");

            // the third insert closes the first file
            for _ in 0..3 {
                writer.insert(&detections, &[0u8; 64]).expect("insert");
            }

            let dir = writer.subject_dir(&alerts);
            fs::create_dir_all(&dir).expect("create dir");
            fs::write(dir.join(open_file_name("Alerts", 1, 0)), [0xffu8; 64])
                .expect("write unreadable file");
            writer.insert(&alerts, &[0u8; 8]).expect("insert");
        });

        assert_eq!(recorder.value("event_journal_inserts_total"), 4);
        assert_eq!(recorder.value("event_journal_rotations_total"), 1);
        assert_eq!(recorder.value("event_journal_discarded_files_total"), 1);
    }

    #[test]
    fn test_rejected_payload_is_not_counted() {
        let recorder = CountingRecorder::default();
        let root = TempDir::new().expect("temp dir");

        metrics::with_local_recorder(&recorder, || {
            let writer = Writer::new(root.path(), "Agent").expect("writer");
            let subject = Subject::new("Detections").expect("subject");
            assert!(writer.insert(&subject, &[0u8; 7]).is_err());
        });

        assert_eq!(recorder.value("event_journal_inserts_total"), 0);
    }
}

use event_journal::{JournalFileName, Subject, Writer, WriterConfig};
use std::path::Path;
use tempfile::TempDir;

use crate::common::{PRODUCER, SUBJECT, read_subject};

#[cfg(test)]
mod tests_rotation {
    use super::*;

    fn small_writer(root: &Path, max_file_size: u64) -> Writer {
        let config = WriterConfig::new(root, PRODUCER).with_max_file_size(max_file_size);
        Writer::with_config(config).expect("writer should open")
    }

    #[test]
    fn test_detections_scenario() {
        let root = TempDir::new().expect("temp dir");
        // header 56 + two 88-byte records = 232; a third would make 320
        let writer = small_writer(root.path(), 300);
        let subject = Subject::new(SUBJECT).expect("subject");

        let ids: Vec<u64> = (0..3)
            .map(|_| writer.insert(&subject, &[0x42u8; 64]).expect("insert"))
            .collect();

        let files = read_subject(&writer.subject_dir(&subject), SUBJECT);
        assert_eq!(files.len(), 2);

        let closed = &files[0];
        let open = &files[1];
        assert!(!closed.name.is_open());
        assert!(open.name.is_open());

        assert_eq!(closed.events.count, 2);
        assert_eq!(closed.name.highest_known_id(), ids[1]);
        assert_eq!(closed.events.last_id, Some(ids[1]));
        assert_eq!(open.events.count, 1);
        assert_eq!(open.events.first_id, Some(ids[2]));
    }

    #[test]
    fn test_closed_name_matches_contents() {
        let root = TempDir::new().expect("temp dir");
        let writer = small_writer(root.path(), 300);
        let subject = Subject::new(SUBJECT).expect("subject");

        for _ in 0..7 {
            writer.insert(&subject, &[0u8; 64]).expect("insert");
        }

        let files = read_subject(&writer.subject_dir(&subject), SUBJECT);
        assert_eq!(files.len(), 4);
        for file in &files {
            match file.name {
                JournalFileName::Closed {
                    first_id,
                    last_id,
                    first_timestamp,
                    last_timestamp,
                } => {
                    assert_eq!(file.events.first_id, Some(first_id));
                    assert_eq!(file.events.last_id, Some(last_id));
                    assert_eq!(file.events.first_timestamp, Some(first_timestamp));
                    assert_eq!(file.events.last_timestamp, Some(last_timestamp));
                    assert!(!file.events.truncated);
                }
                JournalFileName::Open {
                    first_id,
                    first_timestamp,
                } => {
                    assert_eq!(file.events.count, 1);
                    assert_eq!(file.events.first_id, Some(first_id));
                    assert_eq!(file.events.first_timestamp, Some(first_timestamp));
                }
            }
            assert!(file.bytes.len() <= 300);
        }
    }

    #[test]
    fn test_rotation_on_serialisation_change() {
        let root = TempDir::new().expect("temp dir");
        let subject = Subject::new(SUBJECT).expect("subject");
        {
            let writer = Writer::new(root.path(), PRODUCER).expect("writer");
            writer.insert(&subject, &[1u8; 8]).expect("insert");
            writer.insert(&subject, &[1u8; 8]).expect("insert");
        }

        let config = WriterConfig::new(root.path(), PRODUCER).with_serialisation("flatbuffers", "1");
        let writer = Writer::with_config(config).expect("writer");
        let id = writer.insert(&subject, &[2u8; 8]).expect("insert");
        assert_eq!(id, 3);

        let files = read_subject(&writer.subject_dir(&subject), SUBJECT);
        assert_eq!(files.len(), 2);
        assert!(!files[0].name.is_open());
        assert_eq!(files[0].events.count, 2);
        assert!(files[1].name.is_open());
        assert_eq!(files[1].events.count, 1);
    }

    #[test]
    fn test_subjects_rotate_independently() {
        let root = TempDir::new().expect("temp dir");
        let writer = small_writer(root.path(), 300);
        let detections = Subject::new(SUBJECT).expect("subject");
        let alerts = Subject::new("Alerts").expect("subject");

        for _ in 0..3 {
            writer.insert(&detections, &[0u8; 64]).expect("insert");
        }
        writer.insert(&alerts, &[0u8; 64]).expect("insert");

        assert_eq!(read_subject(&writer.subject_dir(&detections), SUBJECT).len(), 2);
        assert_eq!(read_subject(&writer.subject_dir(&alerts), "Alerts").len(), 1);
    }
}

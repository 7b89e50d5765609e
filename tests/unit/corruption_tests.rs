use event_journal::journal::codec;
use event_journal::{PruneOutcome, Subject, Writer, open_file_name, prune_truncated_events};
use std::fs::{self, OpenOptions};
use std::io::Write;
use tempfile::TempDir;

use crate::common::{PRODUCER, SUBJECT, read_subject, stored_ids};

#[cfg(test)]
mod tests_corruption {
    use super::*;

    /// A header for `Agent`/`Detections` followed by a record that declares
    /// 4 KiB but carries 16 bytes.
    fn overlong_record_file() -> Vec<u8> {
        let mut bytes =
            codec::encode_container_header(PRODUCER, SUBJECT, "protobuf", "1").expect("header");
        bytes.extend_from_slice(b"PBUF");
        bytes.extend_from_slice(&4096u32.to_le_bytes());
        bytes.extend_from_slice(&7u64.to_le_bytes());
        bytes.extend_from_slice(&0i64.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        bytes
    }

    #[test]
    fn test_insert_replaces_file_with_overlong_record() {
        let root = TempDir::new().expect("temp dir");
        let writer = Writer::new(root.path(), PRODUCER).expect("writer");
        let subject = Subject::new(SUBJECT).expect("subject");
        let dir = writer.subject_dir(&subject);
        fs::create_dir_all(&dir).expect("create dir");
        let damaged = dir.join(open_file_name(SUBJECT, 1, 0));
        fs::write(&damaged, overlong_record_file()).expect("write damaged file");

        let id = writer.insert(&subject, &[9u8; 32]).expect("insert succeeds");

        assert!(!damaged.exists());
        let files = read_subject(&dir, SUBJECT);
        assert_eq!(files.len(), 1);
        assert!(files[0].name.is_open());
        assert_eq!(files[0].events.count, 1);
        assert_eq!(files[0].events.first_id, Some(id));
        assert!(!files[0].events.truncated);
    }

    #[test]
    fn test_recovery_discards_file_with_overlong_record() {
        let root = TempDir::new().expect("temp dir");
        let dir = root.path().join(PRODUCER).join(SUBJECT);
        fs::create_dir_all(&dir).expect("create dir");
        let damaged = dir.join(open_file_name(SUBJECT, 12, 0));
        fs::write(&damaged, overlong_record_file()).expect("write damaged file");

        let writer = Writer::new(root.path(), PRODUCER).expect("writer");
        assert!(!damaged.exists());
        assert_eq!(writer.recovery_report().removed, 1);
        // the id in the name was handed out before the crash
        assert_eq!(writer.next_id(), 13);
    }

    #[test]
    fn test_insert_replaces_file_with_garbage_header() {
        let root = TempDir::new().expect("temp dir");
        let writer = Writer::new(root.path(), PRODUCER).expect("writer");
        let subject = Subject::new(SUBJECT).expect("subject");
        writer.insert(&subject, &[0u8; 8]).expect("insert");

        let dir = writer.subject_dir(&subject);
        let open = read_subject(&dir, SUBJECT).remove(0).path;
        fs::write(&open, b"this is not a RIFF container at all").expect("overwrite");

        let id = writer.insert(&subject, &[0u8; 8]).expect("insert succeeds");
        assert_eq!(id, 2);
        let files = read_subject(&dir, SUBJECT);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].events.first_id, Some(2));
    }

    #[test]
    fn test_crash_mid_append_keeps_earlier_records() {
        let root = TempDir::new().expect("temp dir");
        let subject = Subject::new(SUBJECT).expect("subject");
        let open = {
            let writer = Writer::new(root.path(), PRODUCER).expect("writer");
            for _ in 0..3 {
                writer.insert(&subject, &[5u8; 40]).expect("insert");
            }
            read_subject(&writer.subject_dir(&subject), SUBJECT).remove(0).path
        };

        // half a record, riff length never patched
        let record = codec::encode_record(&[6u8; 40], 4, 0).expect("record");
        let mut file = OpenOptions::new().append(true).open(&open).expect("open");
        file.write_all(&record[..30]).expect("append partial record");
        drop(file);

        let writer = Writer::new(root.path(), PRODUCER).expect("writer");
        assert_eq!(writer.recovery_report().pruned, 1);
        assert_eq!(writer.insert(&subject, &[7u8; 40]).expect("insert"), 4);

        let files = read_subject(&writer.subject_dir(&subject), SUBJECT);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].events.count, 4);
        assert!(!files[0].events.truncated);
        assert_eq!(
            codec::riff_length(&files[0].bytes),
            Some((files[0].bytes.len() - 8) as u32)
        );
    }

    #[test]
    fn test_inserts_after_torn_append_survive_restart() {
        let root = TempDir::new().expect("temp dir");
        let subject = Subject::new(SUBJECT).expect("subject");
        let dir = {
            let writer = Writer::new(root.path(), PRODUCER).expect("writer");
            writer.insert(&subject, &[1u8; 32]).expect("insert");
            let dir = writer.subject_dir(&subject);
            let open = read_subject(&dir, SUBJECT).remove(0).path;

            // a failed append that left its first bytes behind
            let record = codec::encode_record(&[0u8; 32], 2, 0).expect("record");
            let mut file = OpenOptions::new().append(true).open(&open).expect("open");
            file.write_all(&record[..20]).expect("append partial record");
            drop(file);

            assert_eq!(writer.insert(&subject, &[2u8; 32]).expect("insert"), 2);
            assert_eq!(writer.insert(&subject, &[3u8; 32]).expect("insert"), 3);
            assert_eq!(stored_ids(&dir, SUBJECT), vec![1, 2, 3]);
            dir
        };

        let writer = Writer::new(root.path(), PRODUCER).expect("writer");
        assert_eq!(writer.recovery_report().pruned, 0);
        assert_eq!(stored_ids(&dir, SUBJECT), vec![1, 2, 3]);
        assert_eq!(writer.next_id(), 4);
    }

    #[test]
    fn test_pruning_twice_changes_nothing() {
        let root = TempDir::new().expect("temp dir");
        let writer = Writer::new(root.path(), PRODUCER).expect("writer");
        let subject = Subject::new(SUBJECT).expect("subject");
        writer.insert(&subject, &[1u8; 64]).expect("insert");
        writer.insert(&subject, &[2u8; 64]).expect("insert");
        let open = read_subject(&writer.subject_dir(&subject), SUBJECT).remove(0).path;

        let len = fs::metadata(&open).expect("metadata").len();
        OpenOptions::new()
            .write(true)
            .open(&open)
            .expect("open")
            .set_len(len - 12)
            .expect("truncate");

        let first = writer.prune_truncated_events(&open).expect("prune");
        assert!(matches!(first, PruneOutcome::Pruned { removed_bytes } if removed_bytes > 0));
        let after_first = fs::read(&open).expect("read");

        let second = prune_truncated_events(&open).expect("prune again");
        assert_eq!(second, PruneOutcome::Pruned { removed_bytes: 0 });
        assert_eq!(fs::read(&open).expect("read"), after_first);
    }
}

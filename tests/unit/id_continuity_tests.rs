use event_journal::{Subject, Writer, WriterConfig};
use tempfile::TempDir;

use crate::common::{PRODUCER, SUBJECT, stored_ids};

#[cfg(test)]
mod tests_id_continuity {
    use super::*;

    #[test]
    fn test_ids_strictly_increase_across_rotations() {
        let root = TempDir::new().expect("temp dir");
        let config = WriterConfig::new(root.path(), PRODUCER).with_max_file_size(512);
        let writer = Writer::with_config(config).expect("writer");
        let subjects = [
            Subject::new(SUBJECT).expect("subject"),
            Subject::new("Alerts").expect("subject"),
        ];

        let mut last = 0;
        for i in 0..50 {
            let subject = &subjects[i % 2];
            let id = writer
                .insert(subject, &vec![0u8; 8 * (i % 7)])
                .expect("insert");
            assert!(id > last, "id {id} after {last}");
            last = id;
        }

        let mut all = stored_ids(&writer.subject_dir(&subjects[0]), SUBJECT);
        all.extend(stored_ids(&writer.subject_dir(&subjects[1]), "Alerts"));
        all.sort_unstable();
        all.dedup();
        assert_eq!(all, (1..=50).collect::<Vec<u64>>());
    }

    #[test]
    fn test_restart_continues_sequence() {
        let root = TempDir::new().expect("temp dir");
        let subject = Subject::new(SUBJECT).expect("subject");

        let last = {
            let writer = Writer::new(root.path(), PRODUCER).expect("writer");
            let mut last = 0;
            for _ in 0..5 {
                last = writer.insert(&subject, &[0u8; 16]).expect("insert");
            }
            last
        };

        let writer = Writer::new(root.path(), PRODUCER).expect("writer");
        assert_eq!(writer.recovery_report().max_seen_id, Some(last));
        assert_eq!(writer.insert(&subject, &[0u8; 16]).expect("insert"), last + 1);
        assert_eq!(stored_ids(&writer.subject_dir(&subject), SUBJECT), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_restart_after_rotation_uses_closed_names() {
        let root = TempDir::new().expect("temp dir");
        let subject = Subject::new(SUBJECT).expect("subject");
        let config = WriterConfig::new(root.path(), PRODUCER).with_max_file_size(300);

        {
            let writer = Writer::with_config(config.clone()).expect("writer");
            for _ in 0..4 {
                writer.insert(&subject, &[0u8; 64]).expect("insert");
            }
        }

        let writer = Writer::with_config(config).expect("writer");
        let report = writer.recovery_report();
        assert_eq!(report.closed_files, 1);
        assert_eq!(report.open_files, 1);
        assert_eq!(writer.next_id(), 5);
    }

    #[test]
    fn test_restart_without_clean_shutdown() {
        let root = TempDir::new().expect("temp dir");
        let subject = Subject::new(SUBJECT).expect("subject");

        let writer = Writer::new(root.path(), PRODUCER).expect("writer");
        let last = writer.insert(&subject, &[0u8; 24]).expect("insert");
        std::mem::forget(writer);

        let writer = Writer::new(root.path(), PRODUCER).expect("writer");
        assert_eq!(writer.next_id(), last + 1);
    }

    #[test]
    fn test_fresh_tree_starts_at_one() {
        let root = TempDir::new().expect("temp dir");
        let writer = Writer::new(root.path(), PRODUCER).expect("writer");
        let subject = Subject::new(SUBJECT).expect("subject");
        assert_eq!(writer.insert(&subject, &[]).expect("insert"), 1);
    }
}

use event_journal::{DEFAULT_MAX_FILE_SIZE, JournalError, Subject, Writer, WriterConfig};
use std::fs;
use tempfile::TempDir;

#[cfg(test)]
mod tests_config {
    use super::*;

    #[test]
    fn test_json_defaults() {
        let config = WriterConfig::from_json_str(
            r#"{ "location": "/var/lib/agent/journal", "producer": "Agent" }"#,
        )
        .expect("valid config");

        assert_eq!(config.producer, "Agent");
        assert_eq!(config.max_file_size, DEFAULT_MAX_FILE_SIZE);
        assert_eq!(config.serialisation_method, "protobuf");
        assert_eq!(config.serialisation_version, "1");
    }

    #[test]
    fn test_json_overrides() {
        let config = WriterConfig::from_json_str(
            r#"{
                "location": "/tmp/j",
                "producer": "Agent",
                "max_file_size": 65536,
                "serialisation_method": "flatbuffers",
                "serialisation_version": "4"
            }"#,
        )
        .expect("valid config");

        assert_eq!(config.max_file_size, 65536);
        assert_eq!(config.serialisation_method, "flatbuffers");
        assert_eq!(config.serialisation_version, "4");
    }

    #[test]
    fn test_json_rejects_invalid_values() {
        let cases = [
            r#"{ "location": "/tmp/j" }"#,
            r#"{ "location": "/tmp/j", "producer": "a/b" }"#,
            r#"{ "location": "/tmp/j", "producer": "Agent", "max_file_size": 64 }"#,
            r#"{ "location": "/tmp/j", "producer": "Agent", "max_file_size": 8589934592 }"#,
            "not json",
        ];
        for json in cases {
            assert!(
                matches!(
                    WriterConfig::from_json_str(json),
                    Err(JournalError::InvalidConfig { .. })
                ),
                "{json} should be rejected"
            );
        }
    }

    #[test]
    fn test_json_file() {
        let root = TempDir::new().expect("temp dir");
        let path = root.path().join("journal.json");
        let config = WriterConfig::new(root.path().join("journal"), "Agent").with_max_file_size(4096);
        fs::write(&path, serde_json::to_string_pretty(&config).expect("serialize"))
            .expect("write config");

        let loaded = WriterConfig::from_json_file(&path).expect("load config");
        assert_eq!(loaded, config);

        let writer = Writer::with_config(loaded).expect("writer");
        let subject = Subject::new("Detections").expect("subject");
        assert_eq!(writer.insert(&subject, &[0u8; 8]).expect("insert"), 1);
    }

    #[test]
    fn test_missing_json_file() {
        let root = TempDir::new().expect("temp dir");
        let result = WriterConfig::from_json_file(root.path().join("absent.json"));
        assert!(matches!(result, Err(JournalError::Io { path: Some(_), .. })));
    }

    #[test]
    fn test_nul_in_serialisation_settings() {
        let config = WriterConfig::new("/tmp/j", "Agent").with_serialisation("proto\0buf", "1");
        assert!(config.validate().is_err());
    }
}

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// A prescription upload as published by the upload service.
#[allow(dead_code)]
pub const PRESCRIPTION_UPLOADED: &str = r#"{"EventType":"PrescriptionUploaded","PrescriptionId":"RX-1001","FileName":"rx-1001.png","Timestamp":"2024-05-01T09:30:00Z"}"#;

/// An analyzed prescription with extracted text.
#[allow(dead_code)]
pub const PRESCRIPTION_ANALYZED: &str = r#"{"EventType":"PrescriptionAnalyzed","PrescriptionId":"RX-1001","FileName":"rx-1001.png","Timestamp":"2024-05-01T09:31:00Z","ExtractedInscription":"Amoxicillin 500mg","ExtractedPatientDetails":"Jane Doe"}"#;

/// Products identified from a prescription.
#[allow(dead_code)]
pub const PRODUCTS_IDENTIFIED: &str = r#"{"EventType":"ProductsIdentified","Timestamp":"2024-05-01T09:32:00Z","IdentifiedProducts":[{"Name":"Amoxicillin","Category":"Antibiotic","Price":12.5},{"Name":"Aspirin"}]}"#;

/// A placed order.
#[allow(dead_code)]
pub const ORDER_PLACED: &str =
    r#"{"EventType":"OrderPlaced","OrderId":"O1","Customer":"Jane","ItemCount":3,"GiftWrap":true}"#;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

#[allow(dead_code)]
pub fn temp_events_file(lines: &[&str]) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let events_path = temp_dir.path().join("events.ndjson");
    fs::write(&events_path, lines.join("\n")).expect("failed to write events file");
    (temp_dir, events_path)
}

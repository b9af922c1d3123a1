use file_intake::services::scanner::{ClamAvScanner, ScanResult, VirusScanner};
use std::io::Cursor;

#[tokio::test]
#[ignore]
async fn test_clamav_connection_and_scan() {
    // 1. Setup Scanner checking localhost:3310
    let scanner = ClamAvScanner::new("127.0.0.1".to_string(), 3310);

    // 2. Health Check
    assert!(scanner.health_check().await, "ClamAV should be reachable");

    // 3. Scan Clean Data
    let clean_data: &[u8] = b"Hello, this is a clean file.";
    let result = scanner
        .scan(Box::pin(Cursor::new(clean_data)))
        .await
        .expect("Scan failed");
    assert_eq!(result, ScanResult::Clean);

    // 4. Scan Infected Data (EICAR)
    let eicar: &[u8] = b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";
    let result = scanner
        .scan(Box::pin(Cursor::new(eicar)))
        .await
        .expect("Scan failed");
    match result {
        ScanResult::Infected { threat_name } => {
            assert!(
                threat_name.contains("Eicar") || threat_name.contains("EICAR"),
                "Should detect Eicar, got {}",
                threat_name
            );
        }
        other => panic!("Expected infected result for EICAR, got {:?}", other),
    }
}

mod common;

use anyhow::Result;
use common::{earn, onboard, single_threshold, test_service_with, DEPOSIT};
use serde_json::Value;
use vendor_wallet::io::Exporter;

#[tokio::test]
async fn test_export_entries_csv() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;
    onboard(&service, "v1").await?;
    earn(&service, "v1", "task-1", 30_000).await?;
    let request = service.submit_withdrawal("v1", 10_000).await?;
    service
        .reject_withdrawal(request.id, Some("bank details, missing".to_string()))
        .await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service)
        .export_entries_csv("v1", &mut buffer)
        .await?;
    assert_eq!(count, 3);

    let mut reader = csv::Reader::from_reader(buffer.as_slice());
    let headers = reader.headers()?.clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        [
            "id",
            "sequence",
            "created_at",
            "entry_type",
            "amount",
            "status",
            "related_task_id",
            "resolved_at",
            "resolution_note",
            "metadata",
        ]
    );

    let rows = reader.records().collect::<Result<Vec<_>, _>>()?;
    assert_eq!(rows.len(), 3);
    assert_eq!(&rows[0][3], "deposit");
    assert_eq!(&rows[0][4], DEPOSIT.to_string());
    assert_eq!(&rows[1][3], "earning");
    assert_eq!(&rows[1][6], "task-1");
    assert_eq!(&rows[2][3], "withdrawal_request");
    assert_eq!(&rows[2][4], "-10000");
    assert_eq!(&rows[2][5], "rejected");
    // Commas in free text survive quoting
    assert_eq!(&rows[2][8], "bank details, missing");
    assert!(!rows[2][7].is_empty());
    Ok(())
}

#[tokio::test]
async fn test_export_wallets_csv() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;
    onboard(&service, "v1").await?;
    onboard(&service, "v2").await?;
    earn(&service, "v2", "task-1", 1_500).await?;

    let mut buffer = Vec::new();
    let count = Exporter::new(&service).export_wallets_csv(&mut buffer).await?;
    assert_eq!(count, 2);

    let text = String::from_utf8(buffer)?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], "vendor_id,security_deposit,cached_balance,created_at");
    assert!(lines[1].starts_with(&format!("v1,{DEPOSIT},{DEPOSIT},")));
    assert!(lines[2].starts_with(&format!("v2,{DEPOSIT},{},", DEPOSIT + 1_500)));
    Ok(())
}

#[tokio::test]
async fn test_export_statement_json() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;
    onboard(&service, "v1").await?;
    earn(&service, "v1", "task-1", 30_000).await?;

    let mut buffer = Vec::new();
    let statement = Exporter::new(&service)
        .export_statement_json("v1", &mut buffer)
        .await?;
    assert_eq!(statement.entries.len(), 2);
    assert_eq!(statement.summary.current_balance, DEPOSIT + 30_000);

    let json: Value = serde_json::from_slice(&buffer)?;
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["exportedAt"].is_string());
    assert_eq!(json["wallet"]["vendorId"], "v1");
    assert_eq!(json["summary"]["currentBalance"], DEPOSIT + 30_000);
    assert_eq!(json["summary"]["withdrawableAmount"], 30_000);
    assert_eq!(json["entries"].as_array().map(Vec::len), Some(2));
    assert_eq!(json["entries"][1]["entryType"], "earning");
    Ok(())
}

#[tokio::test]
async fn test_export_unknown_vendor_fails() -> Result<()> {
    let (service, _temp) = test_service_with(single_threshold()).await?;

    let mut buffer = Vec::new();
    let result = Exporter::new(&service)
        .export_entries_csv("ghost", &mut buffer)
        .await;
    assert!(result.is_err());
    assert!(buffer.is_empty());
    Ok(())
}

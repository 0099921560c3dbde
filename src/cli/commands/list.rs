//! List stored receipts.

use console::style;

use crate::config::Settings;
use crate::storage::ReceiptStore;

pub async fn cmd_list(settings: &Settings, json: bool) -> anyhow::Result<()> {
    let store = ReceiptStore::open(&settings.storage_dir).await?;
    let records = store.records().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{} No receipts stored in {}", style("!").yellow(), settings.storage_dir.display());
        return Ok(());
    }

    println!(
        "\n{:<38} {:<12} {:<24} {:>12}",
        style("ID").bold(),
        style("Date").bold(),
        style("Vendor").bold(),
        style("Total").bold()
    );
    println!("{}", "-".repeat(90));
    for record in &records {
        let vendor: String = record.vendor_name.chars().take(24).collect();
        println!(
            "{:<38} {:<12} {:<24} {:>8.2} {}",
            record.id, record.date, vendor, record.total, record.currency
        );
    }
    println!("\n{} receipt(s)", records.len());
    Ok(())
}

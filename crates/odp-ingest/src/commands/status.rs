//! Catalog and observation counts

use anyhow::Result;
use odp_server::store::ReadStore;
use serde_json::json;

use super::{connect, Output};

pub async fn run(output: &Output) -> Result<()> {
    let (_, store) = connect().await?;
    store.ping().await?;
    let stats = store.catalog_stats().await?;

    if output.json {
        return output.print_json(&json!(stats));
    }

    let mut table = output.table(&["Table", "Rows"]);
    for (name, count) in [
        ("countries", stats.countries),
        ("sources", stats.sources),
        ("categories", stats.categories),
        ("indicators", stats.indicators),
        ("observations", stats.observations),
        ("ingestion_logs", stats.runs),
    ] {
        table.add_row(vec![name.to_string(), count.to_string()]);
    }
    println!("{table}");
    Ok(())
}

//! Schema migration and reference-data seeding

use anyhow::Result;
use odp_server::catalog::bootstrap::seed_reference_data;
use serde_json::json;
use tracing::info;

use super::{connect, Output};

pub async fn migrate() -> Result<()> {
    let (_, store) = connect().await?;
    odp_server::db::run_migrations(store.pool()).await?;
    info!("Database migrations completed");
    Ok(())
}

pub async fn seed(output: &Output) -> Result<()> {
    let (_, store) = connect().await?;
    let report = seed_reference_data(&store).await?;

    if output.json {
        return output.print_json(&json!(report));
    }
    if report.is_empty() {
        println!("Reference data already present");
    } else {
        println!(
            "Seeded {} countries, {} sources, {} categories",
            report.countries_added, report.sources_added, report.categories_added
        );
    }
    Ok(())
}

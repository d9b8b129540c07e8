//! Command implementations

pub mod db;
pub mod ingest;
pub mod runs;
pub mod status;

use anyhow::Result;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};
use odp_server::config::Config;
use odp_server::store::PgStore;
use serde_json::Value;

/// How command results are printed
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    pub fn print_json(&self, value: &Value) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    pub fn table(&self, header: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(header.to_vec());
        table
    }
}

/// Load configuration and open the database store
pub async fn connect() -> Result<(Config, PgStore)> {
    let config = Config::load()?;
    let pool = odp_server::db::create_pool(&config.database).await?;
    Ok((config, PgStore::new(pool)))
}

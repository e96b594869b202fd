use config::{Config, File};
use sea_orm_migration::prelude::*;
use std::env;

/// Schema migration CLI.
///
/// Reads `DATABASE_URL` first; when unset, falls back to the `database_url`
/// key of the service's `config.yaml` so both binaries share one setting.
#[tokio::main]
async fn main() {
    if env::var("DATABASE_URL").is_err() {
        let settings = Config::builder()
            .add_source(File::with_name("config.yaml").required(false))
            .build();
        match settings.map(|s| s.get_string("database_url")) {
            Ok(Ok(url)) => env::set_var("DATABASE_URL", url),
            _ => eprintln!("DATABASE_URL is not set and config.yaml has no database_url"),
        }
    }
    cli::run_cli(migration::Migrator).await;
}

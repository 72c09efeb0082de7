//! `tessera version` command - Show the version and the on-disk layout it
//! reads and writes.

use tessera_migrate::LOCK_FILE;

use crate::config::{CONFIG_FILE_NAME, MIGRATIONS_DIR, MODELS_FILE_PATH};
use crate::error::CliResult;
use crate::output::{self, kv};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Run the version command
pub async fn run() -> CliResult<()> {
    output::header(&format!("Tessera {}", VERSION));

    output::section("Project");
    kv("Config file", CONFIG_FILE_NAME);
    kv("Models", MODELS_FILE_PATH);
    kv("Migrations", MIGRATIONS_DIR);
    output::newline();

    output::section("History");
    kv("Records", "<timestamp>-<slug>.json, one per migration");
    kv("Checksum", "SHA-256 of the up operations");
    kv("Lock file", LOCK_FILE);

    Ok(())
}

//! `tessera schema` command - Print the schema reconstructed from history.

use crate::cli::SchemaArgs;
use crate::config::Project;
use crate::error::CliResult;

/// Run the schema command
pub async fn run(args: SchemaArgs) -> CliResult<()> {
    let project = Project::discover(&args.project)?;
    let engine = super::open_engine(&project, false);

    let schema = engine.current_schema().await?;
    let json = if args.compact {
        serde_json::to_string(&schema)?
    } else {
        serde_json::to_string_pretty(&schema)?
    };
    println!("{}", json);

    Ok(())
}

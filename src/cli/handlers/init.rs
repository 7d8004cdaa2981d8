use std::error::Error;

use crate::cli::commands::Cli;
use crate::io::config_io;

/// Create the data directory and a commented config.toml.
///
/// Runs before any config is loaded, so it works on a fresh machine.
pub fn cmd_init(cli: &Cli) -> Result<(), Box<dyn Error>> {
    let data_dir = config_io::resolve_data_dir(cli.data_dir.as_deref())?;
    let created = config_io::init_data_dir(&data_dir)?;

    if cli.json {
        let out = serde_json::json!({
            "dataDir": data_dir.display().to_string(),
            "created": created,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if created {
        println!("initialized todo-flow in {}", data_dir.display());
    } else {
        println!("todo-flow already initialized in {}", data_dir.display());
    }
    Ok(())
}

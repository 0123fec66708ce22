use anyhow::Result;
use monoscript_core::configs::workspace_config_schema;

pub fn execute() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&workspace_config_schema())?);
    Ok(())
}

use anyhow::Result;
use colored::*;
use monoscript_core::workspace::PackageFilter;
use monoscript_core::workspace_manager::{Strategy, WorkspaceManager};

pub async fn execute(
    manager: &WorkspaceManager,
    command: &str,
    filter: &PackageFilter,
    strategy: Strategy,
) -> Result<()> {
    let packages = manager.select_packages(filter)?;
    println!(
        "{} {} {}",
        "Executing".bold(),
        command.cyan(),
        format!("in {} packages ({})", packages.len(), strategy).dimmed()
    );
    println!();

    manager
        .exec_command(command, &packages, strategy)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to execute command: {}", e))?;

    println!();
    println!(
        "{} {}",
        "✓".green().bold(),
        "All commands completed successfully!".green().bold()
    );

    Ok(())
}

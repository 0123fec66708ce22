use anyhow::Result;
use colored::*;
use monoscript_core::workspace::PackageFilter;
use monoscript_core::workspace_manager::{Strategy, WorkspaceManager};

pub async fn execute(
    manager: &WorkspaceManager,
    script: &str,
    args: &[String],
    filter: &PackageFilter,
    strategy: Strategy,
) -> Result<()> {
    let packages = manager.select_packages(filter)?;
    println!(
        "{} {} {}",
        "Running script".bold(),
        script.cyan(),
        format!("in {} packages ({})", packages.len(), strategy).dimmed()
    );
    println!();

    manager
        .run_script(script, args, &packages, strategy)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run script: {}", e))?;

    println!();
    println!(
        "{} {}",
        "✓".green().bold(),
        "All scripts completed successfully!".green().bold()
    );

    Ok(())
}

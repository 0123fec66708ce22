use anyhow::Result;
use colored::*;
use monoscript_core::workspace_manager::WorkspaceManager;

pub fn execute(manager: &WorkspaceManager) -> Result<()> {
    let result = manager.list_packages();

    println!("{}", "Packages".bold().underline());
    println!(
        "{} {}",
        result.root.name.bold(),
        format!("(root, {})", result.root.location.display()).dimmed()
    );

    if result.packages.is_empty() {
        println!("  {}", "No packages found".dimmed());
        return Ok(());
    }

    let mut packages: Vec<_> = result.packages.iter().collect();
    packages.sort_by(|a, b| a.name.cmp(&b.name));

    for package in packages {
        let color = result
            .package_colors
            .get(&package.name)
            .copied()
            .unwrap_or(Color::Blue);
        let version = package
            .version
            .as_deref()
            .map(|v| format!("v{}", v))
            .unwrap_or_default();

        println!(
            "{} {} {}",
            package.name.color(color).bold(),
            version.green(),
            package.location.display().to_string().dimmed()
        );
        if !package.workspace_dependencies.is_empty() {
            println!(
                "  {} {}",
                "depends on:".dimmed(),
                package.workspace_dependencies.join(", ")
            );
        }
        if !package.scripts.is_empty() {
            println!("  {} {}", "scripts:".dimmed(), package.scripts.join(", "));
        }
    }

    Ok(())
}

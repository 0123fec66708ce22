use anyhow::Result;
use colored::*;
use monoscript_core::types::format_cycles;
use monoscript_core::workspace_manager::WorkspaceManager;

pub fn execute(manager: &WorkspaceManager) -> Result<()> {
    println!("{}", "Package Dependency Graph:".bold().underline());

    let result = manager
        .get_dependency_graph()
        .map_err(|e| anyhow::anyhow!("Failed to get dependency graph: {}", e))?;

    if result.graph.has_cycles() {
        println!(
            "{} {}",
            "Warning:".yellow().bold(),
            format!(
                "Circular dependencies detected: {}",
                format_cycles(&result.graph.cycles)
            )
            .yellow()
        );
    }

    for node_weight in result.graph.graph.node_weights() {
        println!("{}", node_weight.blue().bold());

        let deps = result.graph.dependencies_of(node_weight);
        if !deps.is_empty() {
            println!("  {} {}", "depends on:".dimmed(), deps.join(", "));
        } else {
            println!("  {}", "no dependencies".dimmed());
        }
        println!();
    }

    if !result.tiers.is_empty() {
        println!("{}:", "Batch order".bold());
        for (i, tier) in result.tiers.iter().enumerate() {
            println!("  {}. {}", i + 1, tier.join(", "));
        }
    }

    Ok(())
}

//! Plan command: deployment groups from a dependency edge list

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use super::output::Output;
use crate::domain::{
    BrokenCycle, BuildWarning, ResidualComponent, Resolution, Resolver, StagePlan, TestPairing,
};
use crate::storage::{load_edges, Config};

/// Loads edges, resolves them and applies the configured residual policy
pub(crate) fn resolve(output: &Output, config: &Config, edges_path: &Path) -> Result<Resolution> {
    let edges = load_edges(edges_path)?;
    output.verbose_ctx("plan", &format!("Loaded {} dependency rows", edges.len()));

    let resolver = Resolver::new(config.project.resolver.matcher()?);
    let mut resolution = resolver.resolve(&edges);

    output.verbose_ctx(
        "plan",
        &format!(
            "{} components, {} direct cycles broken, {} tests paired",
            resolution.graph.len(),
            resolution.broken_cycles.len(),
            resolution.pairings.len()
        ),
    );

    let policy = config.project.resolver.residual_policy;
    resolution.plan = std::mem::take(&mut resolution.plan).apply_policy(policy)?;
    Ok(resolution)
}

#[derive(Serialize)]
struct PlanReport<'a> {
    groups: &'a [Vec<crate::domain::Component>],
    untested: &'a [crate::domain::ComponentId],
    residual: &'a [ResidualComponent],
    #[serde(skip_serializing_if = "Option::is_none")]
    forced_group: Option<usize>,
    broken_cycles: &'a [BrokenCycle],
    pairings: Vec<TestPairing>,
    warnings: &'a [BuildWarning],
}

/// Show deployment groups
pub fn run(output: &Output, config: &Config, edges_path: &Path) -> Result<()> {
    let resolution = resolve(output, config, edges_path)?;
    let plan = &resolution.plan;

    if output.is_json() {
        output.data(&PlanReport {
            groups: &plan.groups,
            untested: &plan.untested,
            residual: &plan.residual,
            forced_group: plan.forced_group,
            broken_cycles: &resolution.broken_cycles,
            pairings: resolution.pairings.pairings(),
            warnings: resolution.graph.warnings(),
        });
        return Ok(());
    }

    for warning in resolution.graph.warnings() {
        output.warn(&format!("skipped {}", warning));
    }

    print_groups(plan);
    println!();
    println!(
        "groups: {}, components: {}, untested: {}",
        plan.groups.len(),
        plan.placed_count(),
        plan.untested.len()
    );
    print_residual(output, plan);

    Ok(())
}

fn print_groups(plan: &StagePlan) {
    for (i, group) in plan.groups.iter().enumerate() {
        let forced = if plan.forced_group == Some(i) { " (forced: cyclic)" } else { "" };
        println!("Group {}:{}", i + 1, forced);
        for (j, component) in group.iter().enumerate() {
            let branch = if j + 1 == group.len() { "└───" } else { "├───" };
            let untested = if plan.is_untested(&component.id) { " -- UNTESTED" } else { "" };
            println!(
                " {} {}: {} ({}){}",
                branch, component.component_type, component.name, component.id, untested
            );
        }
    }
}

fn print_residual(output: &Output, plan: &StagePlan) {
    if plan.residual.is_empty() {
        return;
    }

    output.warn(&format!(
        "{} components are caught in dependency cycles:",
        plan.residual.len()
    ));
    for residual in &plan.residual {
        let waiting: Vec<String> = residual
            .unmet
            .iter()
            .map(|dep| format!("{} \"{}\"", dep.id, dep.name))
            .collect();
        let mut line = format!(
            "    {} \"{}\" ({}) - in-degree {}",
            residual.id, residual.name, residual.component_type, residual.remaining_in_degree
        );
        if !waiting.is_empty() {
            line.push_str(&format!(", waiting on: {}", waiting.join(", ")));
        }
        if let Some(subject) = &residual.awaiting_subject {
            line.push_str(&format!(", held for subject {}", subject));
        }
        output.warn(&line);
    }
}

//! Introspection commands: list, graph and validate.

use std::path::Path;

use anyhow::Result;
use owo_colors::OwoColorize;
use petgraph::dot::Dot;
use taskkit_core::{Registry, TaskGraph};

use crate::formatting::{
    print_edge_table, print_key_value, print_section_header, print_success, print_task_table,
    print_warning, SectionStyle, TaskRow,
};

use super::load_project;

fn names(registry: &Registry, ids: &[taskkit_core::TaskId]) -> Vec<String> {
    ids.iter().map(|id| registry.name(*id).to_string()).collect()
}

pub fn cmd_list(config_path: &Path, json: bool) -> Result<()> {
    let project = load_project(config_path)?;
    let registry = &project.registry;

    let rows: Vec<TaskRow> = registry
        .tasks()
        .iter()
        .map(|task| TaskRow {
            name: task.name().to_string(),
            kind: task.body().kind(),
            depends_on: names(registry, task.deps()),
            steps: names(registry, task.pipeline_steps()),
        })
        .collect();

    if json {
        let tasks: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                serde_json::json!({
                    "name": row.name,
                    "kind": row.kind,
                    "depends_on": row.depends_on,
                    "steps": row.steps,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&tasks)?);
        return Ok(());
    }

    print_section_header("Available Tasks", SectionStyle::Primary);
    if rows.is_empty() {
        print_warning("No tasks defined");
    } else {
        print_task_table(&rows);
    }
    if let Some(dev) = &project.config.dev {
        println!();
        print_key_value("Dev task", dev);
    }
    println!();

    Ok(())
}

pub fn cmd_graph(config_path: &Path, json: bool, dot: bool) -> Result<()> {
    let project = load_project(config_path)?;
    let graph = TaskGraph::new(&project.registry)?;

    if dot {
        println!("{}", Dot::new(graph.inner()));
        return Ok(());
    }

    let edges: Vec<(String, String, String)> = graph
        .edges()
        .into_iter()
        .map(|(from, to, kind)| (from.to_string(), to.to_string(), kind.to_string()))
        .collect();

    if json {
        let edge_data: Vec<serde_json::Value> = edges
            .iter()
            .map(|(from, to, kind)| serde_json::json!({ "from": from, "to": to, "kind": kind }))
            .collect();
        let graph_data = serde_json::json!({
            "order": graph.topological_order(),
            "edges": edge_data,
        });
        println!("{}", serde_json::to_string_pretty(&graph_data)?);
        return Ok(());
    }

    print_section_header("Task Graph", SectionStyle::Primary);
    let order = graph.topological_order();
    if order.is_empty() {
        print_warning("No tasks defined");
        println!();
        return Ok(());
    }

    print_key_value(
        "Topological order",
        &format!("({} tasks)", order.len()),
    );
    for (idx, name) in order.iter().enumerate() {
        println!(
            "  {} {}",
            format!("{:>3}.", idx + 1).bright_black(),
            name.bold().white()
        );
    }
    println!();

    if !edges.is_empty() {
        print_edge_table(&edges);
        println!();
    }

    Ok(())
}

pub fn cmd_validate(config_path: &Path, json: bool) -> Result<()> {
    let project = load_project(config_path)?;
    TaskGraph::new(&project.registry)?;
    let bindings = project.config.watch_bindings(&project.registry)?;

    if let Some(dev) = &project.config.dev {
        project.registry.lookup(dev)?;
    }

    if json {
        let result = serde_json::json!({
            "valid": true,
            "tasks": project.registry.len(),
            "watch_bindings": bindings.len(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    print_section_header("Validation", SectionStyle::Success);
    print_success(&format!("{} tasks registered", project.registry.len()));
    print_success("All dependencies and pipeline steps resolve");
    print_success("No circular dependencies detected");
    print_success(&format!("{} watch bindings are valid", bindings.len()));
    println!();

    Ok(())
}

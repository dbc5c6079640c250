//! Presentation: text tables and JSON for CLI results.

use crate::cli::route::{SimulationReport, VerifyReport};
use crate::contract::{Operation, CONTRACT_VERSION, MAJOR_TYPE, OPERATION_COUNT};
use crate::error::AcctError;
use crate::loader::InstalledPlugin;
use comfy_table::presets::UTF8_FULL;
use comfy_table::Table;
use serde::Serialize;
use serde_json::json;

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, AcctError> {
    serde_json::to_string_pretty(value).map_err(|e| AcctError::Serialization(e.to_string()))
}

pub fn format_contract(format: &str) -> Result<String, AcctError> {
    if format == "json" {
        let operations: Vec<serde_json::Value> = Operation::ALL
            .iter()
            .map(|op| {
                json!({
                    "ordinal": op.ordinal(),
                    "symbol": op.symbol(),
                    "name": op.name(),
                })
            })
            .collect();
        return to_json(&json!({
            "major_type": MAJOR_TYPE,
            "version": CONTRACT_VERSION,
            "operations": operations,
        }));
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Ordinal", "Symbol", "Operation"]);
    for op in Operation::ALL {
        table.add_row(vec![
            op.ordinal().to_string(),
            op.symbol().to_string(),
            op.name().to_string(),
        ]);
    }
    Ok(format!(
        "{} contract v{} ({} operations)\n{}",
        MAJOR_TYPE, CONTRACT_VERSION, OPERATION_COUNT, table
    ))
}

pub fn format_plugins(plugins: &[InstalledPlugin], format: &str) -> Result<String, AcctError> {
    if format == "json" {
        return to_json(plugins);
    }
    if plugins.is_empty() {
        return Ok("No job accounting plugins installed.".to_string());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Plugin", "Path", "Available"]);
    for plugin in plugins {
        let path = plugin
            .path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(built in)".to_string());
        let available = if plugin.available { "yes" } else { "no" };
        table.add_row(vec![plugin.plugin_type.clone(), path, available.to_string()]);
    }
    Ok(table.to_string())
}

pub fn format_verify(report: &VerifyReport, format: &str) -> Result<String, AcctError> {
    if format == "json" {
        return to_json(report);
    }
    Ok(format!(
        "Backend verified:\n  Type: {}\n  Plugin: {}\n  State: {}\n  Contract: v{}\n  Bind time: usec={}",
        report.backend_type,
        report.plugin_type.as_deref().unwrap_or("-"),
        report.state,
        report.contract_version,
        report.bind_usec
    ))
}

pub fn format_simulation(report: &SimulationReport, format: &str) -> Result<String, AcctError> {
    if format == "json" {
        return to_json(report);
    }

    let totals = &report.totals;
    let mut s = format!(
        "Job {} ({} steps) via {}\n",
        report.job_id,
        report.steps,
        report.plugin_type.as_deref().unwrap_or("-")
    );

    let mut usage = Table::new();
    usage.load_preset(UTF8_FULL);
    usage.set_header(vec!["Field", "Value", "Task"]);
    usage.add_row(vec![
        "max_rss".to_string(),
        totals.max_rss.to_string(),
        format!("{}@{}", totals.max_rss_id.task_id, totals.max_rss_id.node_id),
    ]);
    usage.add_row(vec![
        "max_vsize".to_string(),
        totals.max_vsize.to_string(),
        format!("{}@{}", totals.max_vsize_id.task_id, totals.max_vsize_id.node_id),
    ]);
    usage.add_row(vec![
        "max_pages".to_string(),
        totals.max_pages.to_string(),
        format!("{}@{}", totals.max_pages_id.task_id, totals.max_pages_id.node_id),
    ]);
    let min_cpu = if totals.min_cpu == crate::record::NO_CPU_SAMPLE {
        "-".to_string()
    } else {
        totals.min_cpu.to_string()
    };
    usage.add_row(vec![
        "min_cpu".to_string(),
        min_cpu,
        format!("{}@{}", totals.min_cpu_id.task_id, totals.min_cpu_id.node_id),
    ]);
    usage.add_row(vec!["tot_cpu".to_string(), totals.tot_cpu.to_string(), String::new()]);
    s.push_str(&usage.to_string());

    let mut timings = Table::new();
    timings.load_preset(UTF8_FULL);
    timings.set_header(vec!["Call", "usec"]);
    for timing in &report.timings {
        timings.add_row(vec![timing.call.clone(), timing.usec.to_string()]);
    }
    s.push('\n');
    s.push_str(&timings.to_string());
    Ok(s)
}

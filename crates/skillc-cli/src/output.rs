use serde::Serialize;
use skillc_core::finding::ValidationReport;
use skillc_core::gate::GateResult;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}

pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    // Calculate column widths
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (i, cell) in row.iter().enumerate() {
            if i < widths.len() {
                widths[i] = widths[i].max(cell.len());
            }
        }
    }

    let header_row: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_row.join("  "));

    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", sep.join("  "));

    for row in &rows {
        let cells: Vec<String> = row
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                let w = widths.get(i).copied().unwrap_or(0);
                format!("{:width$}", cell, width = w)
            })
            .collect();
        println!("{}", cells.join("  "));
    }
}

/// Findings grouped by severity, then skill.
pub fn print_findings(report: &ValidationReport) {
    if report.is_empty() {
        println!("No findings.");
        return;
    }
    for (severity, by_skill) in report.grouped() {
        for (skill, findings) in by_skill {
            println!("\n{severity} {skill} ({})", findings.len());
            let rows = findings
                .iter()
                .map(|f| {
                    vec![
                        f.rule_id.clone(),
                        f.checker_name.to_string(),
                        f.message.clone(),
                    ]
                })
                .collect();
            print_table(&["RULE", "CHECKER", "MESSAGE"], rows);
        }
    }
}

pub fn print_gate(gate: &GateResult) {
    let c = &gate.counts;
    println!(
        "\nP0: {}  P1: {}  P2: {}  P3: {}",
        c.p0, c.p1, c.p2, c.p3
    );
    if gate.pass {
        println!("Gate: PASS");
    } else {
        println!(
            "Gate: FAIL ({} blocking finding(s))",
            gate.blocking_findings.len()
        );
    }
}

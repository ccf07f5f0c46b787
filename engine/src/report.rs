// report.rs — Human-readable divergence report
//
// Pure string rendering over analyzer output; no I/O here. The report
// leads with aggregate category statistics and then lists every divergent
// cell with both recorded results and, when available, the generating
// source so a reading can start without opening the run directory.
//
// Preconditions: records come from one DivergenceAnalyzer::compare call.
// Postconditions: output is deterministic for a given record slice.
// Failure modes: none.
// Side effects: none.

use std::collections::BTreeMap;

use crate::divergence::{Category, DivergenceRecord};

/// Records per category, all seven categories always present.
pub fn category_counts(records: &[DivergenceRecord]) -> BTreeMap<Category, usize> {
    let mut counts: BTreeMap<Category, usize> =
        Category::ALL.iter().map(|c| (*c, 0)).collect();
    for r in records {
        *counts.entry(r.category).or_insert(0) += 1;
    }
    counts
}

/// Render the full report. `sources` maps program identity to rendered
/// source text; programs without an entry are listed without source.
pub fn render_report(
    records: &[DivergenceRecord],
    sources: &BTreeMap<String, String>,
) -> String {
    let mut out = String::new();
    let push = |out: &mut String, line: &str| {
        out.push_str(line);
        out.push('\n');
    };

    push(&mut out, "divergence report");
    push(&mut out, "=================");

    let mut programs: Vec<&str> = records.iter().map(|r| r.program.as_str()).collect();
    programs.sort_unstable();
    programs.dedup();

    push(&mut out, &format!("divergent cells:   {}", records.len()));
    push(&mut out, &format!("programs affected: {}", programs.len()));
    push(&mut out, "");

    push(&mut out, "category statistics");
    for (category, count) in category_counts(records) {
        push(&mut out, &format!("  {:<12} {count}", category.name()));
    }

    // Per-program sections, grouped by (program, input) in sorted order.
    let mut grouped: BTreeMap<(&str, &str), Vec<&DivergenceRecord>> = BTreeMap::new();
    for r in records {
        grouped
            .entry((r.program.as_str(), r.input.as_str()))
            .or_default()
            .push(r);
    }

    let mut last_program = "";
    for ((program, input), cell_records) in grouped {
        if program != last_program {
            push(&mut out, "");
            push(&mut out, program);
            if let Some(source) = sources.get(program) {
                for line in source.lines() {
                    push(&mut out, &format!("    {line}"));
                }
            }
            last_program = program;
        }
        push(&mut out, &format!("  input: {input}"));
        for r in cell_records {
            push(
                &mut out,
                &format!(
                    "    [{}] {:<10} {:<10} {}  vs  {:<10} {}",
                    r.opt_tag, r.category, r.compiler_a, r.cell_a, r.compiler_b, r.cell_b
                ),
            );
        }
    }

    out
}

//! Run report generation.

use crate::loader::LoadReport;
use parcelsim_query::{BenchmarkReport, ExplainOutput, QueryOutcome};
use serde::{Deserialize, Serialize};

/// Everything one CLI invocation produced.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Report {
    pub loads: Vec<LoadReport>,
    pub queries: Vec<QueryOutcome>,
    #[serde(skip_deserializing)]
    pub plans: Vec<ExplainOutput>,
    pub benchmark: Option<BenchmarkReport>,
}

impl Report {
    pub fn from_loads(loads: Vec<LoadReport>) -> Self {
        Self {
            loads,
            ..Default::default()
        }
    }

    pub fn from_query(outcome: QueryOutcome, plan: ExplainOutput) -> Self {
        Self {
            queries: vec![outcome],
            plans: vec![plan],
            ..Default::default()
        }
    }

    pub fn from_benchmark(benchmark: BenchmarkReport) -> Self {
        Self {
            benchmark: Some(benchmark),
            ..Default::default()
        }
    }

    /// Whether any chunk or query failed
    pub fn has_errors(&self) -> bool {
        self.loads.iter().any(|l| l.chunks_failed > 0)
            || self.benchmark.as_ref().map_or(false, |b| b.failures() > 0)
    }

    /// Generates a markdown report.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str("# ParcelSim Report\n\n");

        if !self.loads.is_empty() {
            md.push_str("## Generation\n\n");
            md.push_str("| Container | Layout | Entities | Documents | Chunks | Failed | Discrepancy | Duration | Throughput |\n");
            md.push_str("|-----------|--------|----------|-----------|--------|--------|-------------|----------|------------|\n");
            for load in &self.loads {
                md.push_str(&format!(
                    "| {} | {} | {} | {} | {} | {} | {} | {:.1}s | {:.0} docs/s |\n",
                    load.container,
                    load.layout,
                    format_number(load.committed_entities),
                    format_number(load.committed_documents),
                    load.chunks_total,
                    load.chunks_failed,
                    load.discrepancy(),
                    load.elapsed.as_secs_f64(),
                    load.documents_per_second()
                ));
            }
            md.push('\n');

            let failures: Vec<_> = self
                .loads
                .iter()
                .flat_map(|l| l.failures.iter().map(move |f| (&l.container, f)))
                .collect();
            if !failures.is_empty() {
                md.push_str("### Failed Chunks\n\n");
                md.push_str("| Container | Partition | Chunk | Entities | Reason |\n");
                md.push_str("|-----------|-----------|-------|----------|--------|\n");
                for (container, f) in failures {
                    md.push_str(&format!(
                        "| {} | {} | {} | {} | {} |\n",
                        container, f.partition_id, f.chunk_index, f.entities, f.reason
                    ));
                }
                md.push('\n');
            }
        }

        if !self.queries.is_empty() {
            md.push_str("## Queries\n\n");
            md.push_str("| Container | Layout | Count | Elapsed | Index Hint |\n");
            md.push_str("|-----------|--------|-------|---------|------------|\n");
            for q in &self.queries {
                md.push_str(&format!(
                    "| {} | {} | {} | {:.2}ms | {} |\n",
                    q.container,
                    q.layout,
                    format_number(q.count),
                    q.elapsed_ms,
                    q.index_hint.as_deref().unwrap_or("none")
                ));
            }
            md.push('\n');
            for plan in &self.plans {
                md.push_str("```\n");
                for stage in &plan.stages {
                    md.push_str(stage);
                    md.push('\n');
                }
                md.push_str("```\n\n");
            }
        }

        if let Some(bench) = &self.benchmark {
            md.push_str("## Benchmark\n\n");
            md.push_str("| Setting | Value |\n");
            md.push_str("|---------|-------|\n");
            md.push_str(&format!("| Partitions | {:?} |\n", bench.preset.partitions));
            md.push_str(&format!(
                "| Statuses | {} |\n",
                bench
                    .preset
                    .statuses
                    .iter()
                    .map(|s| s.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
            md.push_str(&format!("| Strategy | {} |\n", bench.preset.strategy));
            md.push_str(&format!("| Iterations | {} |\n", bench.iterations));
            md.push('\n');

            md.push_str("| Container | Layout | Days | Count | Index Hint | p50 | p95 | p99 | max |\n");
            md.push_str("|-----------|--------|------|-------|------------|-----|-----|-----|-----|\n");
            for result in &bench.results {
                let target = &result.target;
                match (&result.outcome, &result.error) {
                    (Some(outcome), None) => {
                        let l = &result.latency;
                        md.push_str(&format!(
                            "| {} | {} | {} | {} | {} | {:.1}ms | {:.1}ms | {:.1}ms | {:.1}ms |\n",
                            target.container,
                            target.layout,
                            target.window_days,
                            format_number(outcome.count),
                            outcome.index_hint.as_deref().unwrap_or("none"),
                            l.p50_us as f64 / 1000.0,
                            l.p95_us as f64 / 1000.0,
                            l.p99_us as f64 / 1000.0,
                            l.max_us as f64 / 1000.0
                        ));
                    }
                    (_, error) => {
                        md.push_str(&format!(
                            "| {} | {} | {} | error: {} | N/A | N/A | N/A | N/A | N/A |\n",
                            target.container,
                            target.layout,
                            target.window_days,
                            error.as_deref().unwrap_or("no result")
                        ));
                    }
                }
            }
            md.push('\n');
        }

        md.push_str("## Summary\n\n");
        if self.has_errors() {
            md.push_str("**Errors detected during run**\n");
        } else {
            md.push_str("**Run completed without errors**\n");
        }

        md
    }

    /// Generates a JSON report.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }

    /// Prints a summary to stdout.
    pub fn print_summary(&self) {
        println!("\n{}", "=".repeat(60));
        println!("PARCELSIM RESULTS");
        println!("{}", "=".repeat(60));

        if !self.loads.is_empty() {
            println!("\nGENERATION:");
            for load in &self.loads {
                println!(
                    "   {} [{}]: {} entities, {} documents in {:.1}s ({:.0}/s)",
                    load.container,
                    load.layout,
                    format_number(load.committed_entities),
                    format_number(load.committed_documents),
                    load.elapsed.as_secs_f64(),
                    load.documents_per_second()
                );
                if load.chunks_failed > 0 {
                    println!(
                        "      Failed chunks: {}/{} (missing {} entities)",
                        load.chunks_failed,
                        load.chunks_total,
                        format_number(load.discrepancy().max(0) as u64)
                    );
                }
            }
        }

        if !self.queries.is_empty() {
            println!("\nQUERIES:");
            for q in &self.queries {
                println!(
                    "   {} [{}]: count={} in {:.2}ms (hint: {})",
                    q.container,
                    q.layout,
                    format_number(q.count),
                    q.elapsed_ms,
                    q.index_hint.as_deref().unwrap_or("none")
                );
                println!("      {}", q.pipeline);
            }
        }

        if let Some(bench) = &self.benchmark {
            println!("\nBENCHMARK ({} iterations):", bench.iterations);
            for result in &bench.results {
                match (&result.outcome, &result.error) {
                    (Some(outcome), None) => println!(
                        "   {:<24} count={:<10} {}",
                        result.target.container,
                        format_number(outcome.count),
                        result.latency.format_ms()
                    ),
                    (_, error) => println!(
                        "   {:<24} FAILED: {}",
                        result.target.container,
                        error.as_deref().unwrap_or("no result")
                    ),
                }
            }
        }

        println!("\n{}", "=".repeat(60));
    }
}

/// Formats a number with thousand separators.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

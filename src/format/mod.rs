//! Output formatting for cycle reports and price history (table, JSON,
//! markdown, CSV).

use crate::config::OutputFormat;
use crate::dispatch::{CycleReport, CycleResult, Outcome};
use crate::models::PriceObservation;
use crate::platform::{Platform, Region};
use serde::Serialize;

/// Formats results for output.
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    /// Creates a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a cycle report: one row per product plus the summary.
    pub fn format_report(&self, report: &CycleReport) -> String {
        match self.format {
            OutputFormat::Json => to_json(report),
            OutputFormat::Table => self.table_report(report),
            OutputFormat::Markdown => self.markdown_report(report),
            OutputFormat::Csv => self.csv_report(report),
        }
    }

    /// Formats price history rows in the order given.
    pub fn format_history(&self, rows: &[PriceObservation]) -> String {
        if rows.is_empty() {
            return match self.format {
                OutputFormat::Json => "[]".to_string(),
                OutputFormat::Csv => HISTORY_CSV_HEADER.to_string(),
                _ => "No observations recorded.".to_string(),
            };
        }

        match self.format {
            OutputFormat::Json => to_json(&rows),
            OutputFormat::Table => self.table_history(rows),
            OutputFormat::Markdown => self.markdown_history(rows),
            OutputFormat::Csv => self.csv_history(rows),
        }
    }

    /// Lists supported platforms and their regional storefronts.
    pub fn format_platforms(&self) -> String {
        #[derive(Serialize)]
        struct Storefront {
            platform: Platform,
            region: Region,
            domain: String,
            currency: &'static str,
        }

        let rows: Vec<Storefront> = Platform::all()
            .iter()
            .flat_map(|p| {
                Region::all().iter().map(move |r| Storefront {
                    platform: *p,
                    region: *r,
                    domain: p.domain(*r),
                    currency: r.currency(),
                })
            })
            .collect();

        match self.format {
            OutputFormat::Json => to_json(&rows),
            OutputFormat::Csv => {
                let mut lines = vec!["platform,region,domain,currency".to_string()];
                lines.extend(rows.iter().map(|s| {
                    format!("{},{},{},{}", s.platform, s.region, s.domain, s.currency)
                }));
                lines.join("\n")
            }
            OutputFormat::Markdown => {
                let mut lines = vec![
                    "| Platform | Region | Domain | Currency |".to_string(),
                    "|----------|--------|--------|----------|".to_string(),
                ];
                lines.extend(rows.iter().map(|s| {
                    format!(
                        "| {} | {} | {} | {} |",
                        s.platform.display_name(),
                        s.region,
                        s.domain,
                        s.currency
                    )
                }));
                lines.join("\n")
            }
            OutputFormat::Table => {
                let mut lines = vec![
                    format!("{:<8}  {:<6}  {:<16}  {}", "Platform", "Region", "Domain", "Currency"),
                    format!("{:-<8}  {:-<6}  {:-<16}  {:-<8}", "", "", "", ""),
                ];
                lines.extend(rows.iter().map(|s| {
                    format!(
                        "{:<8}  {:<6}  {:<16}  {}",
                        s.platform.display_name(),
                        s.region,
                        s.domain,
                        s.currency
                    )
                }));
                lines.join("\n")
            }
        }
    }

    // Table formatting

    fn table_report(&self, report: &CycleReport) -> String {
        let id_width = 16;
        let status_width = 9;
        let price_width = 14;
        let stock_width = 5;
        let tries_width = 5;

        let mut lines = Vec::new();

        lines.push(format!(
            "{:<id_width$}  {:<status_width$}  {:<price_width$}  {:<stock_width$}  {:<tries_width$}  {}",
            "Product", "Status", "Price", "Stock", "Tries", "Detail"
        ));
        lines.push(format!(
            "{:-<id_width$}  {:-<status_width$}  {:-<price_width$}  {:-<stock_width$}  {:-<tries_width$}  {:-<30}",
            "", "", "", "", "", ""
        ));

        for result in &report.results {
            let (price, stock) = match result.observation() {
                Some(o) => (
                    format!("{} {:.2}", o.currency, o.price),
                    if o.available { "Yes" } else { "No" },
                ),
                None => ("-".to_string(), "-"),
            };

            lines.push(format!(
                "{:<id_width$}  {:<status_width$}  {:>price_width$}  {:<stock_width$}  {:>tries_width$}  {}",
                truncate(result.product_id.as_str(), id_width),
                result.outcome.label(),
                price,
                stock,
                result.attempts.len(),
                detail(result)
            ));
        }

        lines.push(String::new());
        lines.push(summary_line(report));

        lines.join("\n")
    }

    fn table_history(&self, rows: &[PriceObservation]) -> String {
        let mut lines = Vec::new();

        lines.push(format!("{:<20}  {:>14}  {:<5}  {}", "Observed", "Price", "Stock", "Checksum"));
        lines.push(format!("{:-<20}  {:-<14}  {:-<5}  {:-<12}", "", "", "", ""));

        for row in rows {
            lines.push(format!(
                "{:<20}  {:>14}  {:<5}  {}",
                row.observed_at.format("%Y-%m-%d %H:%M:%S"),
                format!("{} {:.2}", row.currency, row.price),
                if row.available { "Yes" } else { "No" },
                truncate(&row.checksum, 12)
            ));
        }

        lines.push(String::new());
        lines.push(format!("Total: {} observations", rows.len()));

        lines.join("\n")
    }

    // Markdown formatting

    fn markdown_report(&self, report: &CycleReport) -> String {
        let mut lines = Vec::new();

        lines.push("| Product | Status | Price | Stock | Tries | Detail |".to_string());
        lines.push("|---------|--------|-------|-------|-------|--------|".to_string());

        for result in &report.results {
            let (price, stock) = match result.observation() {
                Some(o) => {
                    (format!("{} {:.2}", o.currency, o.price), if o.available { "✓" } else { "✗" })
                }
                None => (String::new(), ""),
            };
            lines.push(format!(
                "| {} | {} | {} | {} | {} | {} |",
                result.product_id,
                result.outcome.label(),
                price,
                stock,
                result.attempts.len(),
                detail(result).replace('|', "\\|")
            ));
        }

        lines.push(String::new());
        lines.push(format!("*{}*", summary_line(report)));

        lines.join("\n")
    }

    fn markdown_history(&self, rows: &[PriceObservation]) -> String {
        let mut lines = Vec::new();

        lines.push("| Observed | Price | Stock |".to_string());
        lines.push("|----------|-------|-------|".to_string());

        for row in rows {
            lines.push(format!(
                "| {} | {} {:.2} | {} |",
                row.observed_at.format("%Y-%m-%d %H:%M:%S"),
                row.currency,
                row.price,
                if row.available { "✓" } else { "✗" }
            ));
        }

        lines.push(String::new());
        lines.push(format!("*{} observations*", rows.len()));

        lines.join("\n")
    }

    // CSV formatting

    fn csv_report(&self, report: &CycleReport) -> String {
        let mut lines = vec![
            "product_id,status,price,currency,available,attempts,observed_at,detail".to_string(),
        ];

        for result in &report.results {
            let observation = result.observation();
            lines.push(format!(
                "{},{},{},{},{},{},{},{}",
                csv_escape(result.product_id.as_str()),
                result.outcome.label(),
                observation.map(|o| o.price.to_string()).unwrap_or_default(),
                observation.map(|o| o.currency.clone()).unwrap_or_default(),
                observation.map(|o| o.available.to_string()).unwrap_or_default(),
                result.attempts.len(),
                observation.map(|o| o.observed_at.to_rfc3339()).unwrap_or_default(),
                csv_escape(&detail(result))
            ));
        }

        lines.join("\n")
    }

    fn csv_history(&self, rows: &[PriceObservation]) -> String {
        let mut lines = vec![HISTORY_CSV_HEADER.to_string()];

        for row in rows {
            lines.push(format!(
                "{},{},{},{},{},{}",
                csv_escape(row.product_id.as_str()),
                row.observed_at.to_rfc3339(),
                row.price,
                row.currency,
                row.available,
                row.checksum
            ));
        }

        lines.join("\n")
    }
}

const HISTORY_CSV_HEADER: &str = "product_id,observed_at,price,currency,available,checksum";

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Short human-readable explanation of a result.
fn detail(result: &CycleResult) -> String {
    if let Some(err) = &result.sink_error {
        return format!("not recorded: {}", err);
    }
    match &result.outcome {
        Outcome::Success { .. } => match &result.ack {
            Some(ack) if !ack.alerts.is_empty() => {
                ack.alerts.iter().map(|a| a.to_string()).collect::<Vec<_>>().join("; ")
            }
            Some(ack) if ack.unchanged => "unchanged".to_string(),
            Some(_) => "recorded".to_string(),
            None => String::new(),
        },
        Outcome::PermanentFailure { reason } | Outcome::RetriesExhausted { reason } => {
            reason.to_string()
        }
        Outcome::Aborted => "cancelled or timed out".to_string(),
    }
}

fn summary_line(report: &CycleReport) -> String {
    let s = &report.summary;
    let mut line = format!(
        "Total: {} products, {} ok, {} failed, {} exhausted, {} aborted",
        s.total, s.succeeded, s.permanent_failures, s.transient_failures, s.aborted
    );
    if s.storage_failures > 0 {
        line.push_str(&format!(", {} NOT STORED", s.storage_failures));
    }
    if s.alerts > 0 {
        line.push_str(&format!(", {} alerts", s.alerts));
    }
    line
}

fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let head: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", head)
    } else {
        s.to_string()
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

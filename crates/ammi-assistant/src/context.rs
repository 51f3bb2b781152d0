//! Health-context assembly for free-text questions.

use ammi_common::truncate_text;
use ammi_db::{HealthRecord, Medication};

/// How many recent records feed the chat context.
pub const CONTEXT_RECORD_LIMIT: usize = 5;

/// Build the compact health summary that accompanies contextual chat
/// requests. Returns None when there is nothing worth sending.
pub fn build_health_context(
    records: &[HealthRecord],
    medications: &[Medication],
) -> Option<String> {
    if records.is_empty() && medications.is_empty() {
        return None;
    }

    let mut out = String::new();

    if !records.is_empty() {
        out.push_str("Recent health records:\n");
        for record in records.iter().take(CONTEXT_RECORD_LIMIT) {
            out.push_str(&format!(
                "- {} ({}): {}\n",
                record.record_type.label(),
                record.date.format("%Y-%m-%d"),
                record
                    .analysis
                    .as_deref()
                    .map(|a| truncate_text(a, 200))
                    .unwrap_or_else(|| record.raw_data.clone())
            ));
        }
    }

    if !medications.is_empty() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str("Active medications:\n");
        for med in medications {
            out.push_str(&format!(
                "- {} {} ({})\n",
                med.name, med.dosage, med.frequency
            ));
        }
    }

    Some(out)
}

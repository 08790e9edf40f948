use crate::models::{KpiSnapshot, Lead, LeadStatus, StatusBucket};
use std::collections::BTreeMap;

pub const NEW_LEAD_WINDOW_MS: i64 = 7 * 24 * 3600 * 1000;
pub const RECENT_LEADS_LIMIT: usize = 5;

pub fn compute_kpis(leads: &[Lead], now: i64) -> KpiSnapshot {
    let window_start = now - NEW_LEAD_WINDOW_MS;
    KpiSnapshot {
        total: leads.len(),
        new_leads: leads.iter().filter(|lead| lead.created_at > window_start).count(),
        negotiation: leads.iter().filter(|lead| lead.status.is_negotiation()).count(),
        closed: leads.iter().filter(|lead| lead.status == LeadStatus::Won).count(),
    }
}

pub fn status_distribution(leads: &[Lead]) -> BTreeMap<LeadStatus, usize> {
    let mut counts = BTreeMap::new();
    for lead in leads {
        *counts.entry(lead.status).or_insert(0) += 1;
    }
    counts
}

pub fn distribution_buckets(leads: &[Lead]) -> Vec<StatusBucket> {
    status_distribution(leads)
        .into_iter()
        .map(|(status, count)| StatusBucket { status, count })
        .collect()
}

pub fn search<'a>(leads: &'a [Lead], term: &str) -> Vec<&'a Lead> {
    if term.is_empty() {
        return leads.iter().collect();
    }
    let needle = term.to_lowercase();
    leads
        .iter()
        .filter(|lead| {
            lead.name.to_lowercase().contains(&needle)
                || lead.email.to_lowercase().contains(&needle)
                || lead
                    .company
                    .as_deref()
                    .is_some_and(|company| company.to_lowercase().contains(&needle))
        })
        .collect()
}

pub fn recent_leads(leads: &[Lead], limit: usize) -> &[Lead] {
    &leads[..leads.len().min(limit)]
}

//! Cross-session evolution tracking
//!
//! Folds many persisted sessions into one frequency report and derives a
//! short list of suggested next challenges from it. The report is rebuilt
//! on every request; persisted sessions can change between calls, so
//! nothing here is cached.

use crate::modes::Mode;
use crate::session::{SessionSnapshot, SessionStore};
use crate::Result;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::warn;

/// Size of the full koan corpus, the denominator of the coverage heuristic.
pub const KOAN_CORPUS_SIZE: usize = 111;

/// Koans are keyed by this text prefix length in the report. Distinct koans
/// sharing a prefix collapse into one key; kept deliberately because the
/// coverage tiers were calibrated against this approximation.
const KOAN_KEY_LEN: usize = 50;

/// The five canonical elements with their display names, in render order.
const ELEMENTS: [(&str, &str); 5] = [
    ("tierra", "Earth"),
    ("agua", "Water"),
    ("aire", "Air"),
    ("fuego", "Fire"),
    ("eter", "Ether"),
];

/// Scan order for the imbalance heuristic. Distinct from the render order:
/// an exact tie for least-exposed element resolves toward the earliest
/// entry here, so water wins ties.
const ELEMENT_SCAN_ORDER: [(&str, &str); 5] = [
    ("agua", "Water"),
    ("tierra", "Earth"),
    ("aire", "Air"),
    ("fuego", "Fire"),
    ("eter", "Ether"),
];

/// Maximum number of suggestions returned.
const MAX_SUGGESTIONS: usize = 5;

/// Combined frequency tables over a set of persisted sessions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateReport {
    pub sessions_analyzed: usize,
    pub total_exchanges: u64,
    /// Archetype name -> summed mastery count.
    pub mastery: BTreeMap<String, u64>,
    /// Element tag -> exchange count.
    pub elements: BTreeMap<String, u64>,
    /// Truncated koan text -> exposure count.
    pub koans: BTreeMap<String, u64>,
    /// Mode name -> exchange count.
    pub modes_used: BTreeMap<String, u64>,
    /// Distinct save dates (YYYY-MM-DD) observed.
    pub session_dates: BTreeSet<String>,
    /// Files skipped during aggregation, one entry per problem.
    pub warnings: Vec<String>,
}

impl AggregateReport {
    /// Number of distinct koans encountered (under the prefix key).
    pub fn distinct_koans(&self) -> usize {
        self.koans.len()
    }

    /// Archetypes ranked by descending count (name order on ties).
    pub fn top_archetypes(&self, n: usize) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .mastery
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.truncate(n);
        ranked
    }
}

/// Aggregate persisted sessions into one report.
///
/// With no explicit file list, every discoverable session is used. Files
/// that fail to parse are skipped with a warning; they never abort the
/// rest. `None` is the "no sessions found" sentinel.
pub async fn aggregate_sessions(
    store: &SessionStore,
    explicit_files: Option<&[String]>,
) -> Result<Option<AggregateReport>> {
    let mut warnings = Vec::new();

    let files: Vec<PathBuf> = match explicit_files {
        Some(refs) => {
            let mut resolved = Vec::new();
            for name in refs {
                let mut path = PathBuf::from(name);
                if !path.is_absolute() {
                    path = store.sessions_dir().join(name);
                }
                if path.extension().is_none() {
                    path.set_extension("json");
                }
                if path.exists() {
                    resolved.push(path);
                } else {
                    warn!("Session not found: {}", name);
                    warnings.push(format!("Session not found: {}", name));
                }
            }
            resolved
        }
        None => store.list().await?,
    };

    if files.is_empty() {
        return Ok(None);
    }

    let mut report = AggregateReport {
        sessions_analyzed: files.len(),
        warnings,
        ..Default::default()
    };

    for path in &files {
        let snapshot: SessionSnapshot = match tokio::fs::read_to_string(path).await {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!("Could not parse {}: {}", path.display(), e);
                    report.warnings.push(format!("Could not read {}: {}", path.display(), e));
                    continue;
                }
            },
            Err(e) => {
                warn!("Could not read {}: {}", path.display(), e);
                report.warnings.push(format!("Could not read {}: {}", path.display(), e));
                continue;
            }
        };

        for (archetype, count) in &snapshot.mastery_map {
            *report.mastery.entry(archetype.clone()).or_insert(0) += count;
        }

        for record in &snapshot.history {
            report.total_exchanges += 1;

            let element = if record.element.is_empty() {
                "unknown"
            } else {
                record.element.as_str()
            };
            *report.elements.entry(element.to_string()).or_insert(0) += 1;

            if let Some(text) = record.koan.str_field("text") {
                if !text.is_empty() {
                    let key: String = text.chars().take(KOAN_KEY_LEN).collect();
                    *report.koans.entry(key).or_insert(0) += 1;
                }
            }

            *report.modes_used.entry(record.mode.as_str().to_string()).or_insert(0) += 1;
        }

        if let Some(saved_at) = snapshot.saved_at {
            report.session_dates.insert(saved_at.format("%Y-%m-%d").to_string());
        }
    }

    Ok(Some(report))
}

/// Derive up to five suggested next challenges from a report.
///
/// The heuristics are independent and evaluated in a fixed order; the
/// result is the first five that fire, never re-sorted. Deterministic for
/// a given report.
pub fn suggest(report: &AggregateReport, known_archetypes: &[String]) -> Vec<String> {
    let mut suggestions = Vec::new();

    // 1. Element imbalance: least-exposed element below 30% of the most-exposed
    let mut min_entry = ELEMENT_SCAN_ORDER[0];
    let mut min_count = u64::MAX;
    let mut max_count = 0u64;
    for entry in ELEMENT_SCAN_ORDER {
        let count = report.elements.get(entry.0).copied().unwrap_or(0);
        if count < min_count {
            min_count = count;
            min_entry = entry;
        }
        if count > max_count {
            max_count = count;
        }
    }
    if 10 * min_count < 3 * max_count {
        suggestions.push(format!(
            "Explore {} archetypes - your least explored element",
            min_entry.1
        ));
    }

    // 2. First unused mode in canonical order
    if let Some(unused) = Mode::all()
        .iter()
        .find(|mode| !report.modes_used.contains_key(mode.as_str()))
    {
        suggestions.push(format!(
            "Try /mode {} - you haven't explored this mode yet",
            unused
        ));
    }

    // 3. Koan coverage tier against the fixed corpus
    let koans_seen = report.distinct_koans();
    if koans_seen < 30 {
        suggestions.push(format!(
            "Continue exploring - you've encountered less than 30% of the {} koans",
            KOAN_CORPUS_SIZE
        ));
    } else if koans_seen < 80 {
        suggestions.push(format!(
            "Good progress! {}/{} koans encountered. Keep going for full integration.",
            koans_seen, KOAN_CORPUS_SIZE
        ));
    } else {
        suggestions.push(
            "Master-level koan exposure! Consider deepening with /mode metaanalysis".to_string(),
        );
    }

    // 4. First archetype never mastered, skipped when all are covered
    if let Some(unmastered) = known_archetypes
        .iter()
        .find(|name| !report.mastery.contains_key(*name))
    {
        let display: String = unmastered.chars().take(35).collect();
        suggestions.push(format!("Unexplored archetype: {}...", display));
    }

    // 5. Volume tier; exactly one band fires
    let total = report.total_exchanges;
    let volume = if total < 10 {
        "You're just beginning - commit to 10 exchanges for initial calibration"
    } else if total < 50 {
        "Building momentum - aim for 50 exchanges for deeper synapse"
    } else if total < 100 {
        "Strong practice! At 100 exchanges, patterns will emerge"
    } else {
        "Advanced practitioner - consider /mode full_synapse for synthesis"
    };
    suggestions.push(volume.to_string());

    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

/// Render the plain-text evolution report.
pub fn render_report(report: &AggregateReport, suggestions: &[String]) -> String {
    let rule = "=".repeat(60);
    let mut lines = vec![
        rule.clone(),
        "    GHS EVOLUTION REPORT".to_string(),
        "    Tracking Your Biodigital Journey".to_string(),
        rule,
        String::new(),
        format!("Sessions Analyzed: {}", report.sessions_analyzed),
        format!("Total Exchanges: {}", report.total_exchanges),
        format!(
            "Unique Koans Encountered: {} / {}",
            report.distinct_koans(),
            KOAN_CORPUS_SIZE
        ),
        String::new(),
        "--- ELEMENTAL BALANCE ---".to_string(),
    ];

    for (tag, name) in ELEMENTS {
        let count = report.elements.get(tag).copied().unwrap_or(0);
        let bar = "#".repeat(count.min(20) as usize);
        lines.push(format!("  {:<8} [{:<20}] {}", name, bar, count));
    }
    lines.push(String::new());

    lines.push("--- TOP ARCHETYPES MASTERED ---".to_string());
    for (name, count) in report.top_archetypes(5) {
        let display: String = name.chars().take(40).collect();
        lines.push(format!("  [{:>3}x] {}", count, display));
    }
    lines.push(String::new());

    lines.push("--- MODES EXPLORED ---".to_string());
    let mut modes: Vec<(&str, u64)> = report
        .modes_used
        .iter()
        .map(|(name, count)| (name.as_str(), *count))
        .collect();
    modes.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
    for (name, count) in modes {
        lines.push(format!("  {:<15} : {} exchanges", name, count));
    }
    lines.push(String::new());

    lines.push("--- SUGGESTED NEXT CHALLENGES ---".to_string());
    for (i, suggestion) in suggestions.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, suggestion));
    }

    lines.join("\n")
}

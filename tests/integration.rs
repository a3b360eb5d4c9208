//! Integration tests for the GHS bridge

use ghs_bridge::content::ContentItem;
use ghs_bridge::evolution::{aggregate_sessions, suggest, AggregateReport};
use ghs_bridge::modes::Mode;
use ghs_bridge::session::{Session, SessionStore};
use ghs_bridge::{Bridge, BridgeConfig};
use pretty_assertions::assert_eq;
use std::path::Path;
use tempfile::TempDir;

fn item(value: serde_json::Value) -> ContentItem {
    ContentItem::from_value(&value)
}

fn write_pools(base: &Path) {
    std::fs::write(
        base.join("gaia_genome.json"),
        serde_json::json!({
            "consciousness_layers": [
                {"archetype": "The Weaver", "element": "agua", "mission": "Bind threads"},
                {"archetype": "The Anchor", "element": "tierra", "mission": "Hold ground"}
            ]
        })
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        base.join("koans.json"),
        serde_json::json!({
            "ghs_koan_database": [
                {"text": "Who compiles the compiler?", "category": "origin"},
                {"text": "What does the cache remember?", "category": "memory"}
            ]
        })
        .to_string(),
    )
    .unwrap();
    let frameworks = base.join("frameworks");
    std::fs::create_dir_all(&frameworks).unwrap();
    std::fs::write(
        frameworks.join("cooperative_synapse.json"),
        serde_json::json!({
            "cases": [{"name_en": "The Mirror Dance", "ai_role": "reflector", "human_role": "mover"}]
        })
        .to_string(),
    )
    .unwrap();
}

/// Session with one exchange per (mode, archetype, element, koan) tuple.
fn session_with(id: &str, exchanges: &[(Mode, &str, &str, &str)]) -> Session {
    let mut session = Session::new("test-model");
    session.session_id = id.to_string();
    for (mode, archetype, element, koan_text) in exchanges {
        session.record_exchange(
            *mode,
            item(serde_json::json!({"text": koan_text, "category": "test"})),
            &item(serde_json::json!({"archetype": archetype, "element": element})),
            "input",
            "output".to_string(),
        );
    }
    session
}

#[tokio::test]
async fn offline_pulse_with_content_records_archetype_and_koan() {
    let dir = TempDir::new().unwrap();
    write_pools(dir.path());

    let config = BridgeConfig::new(dir.path().to_path_buf())
        .with_ollama_url("http://127.0.0.1:1")
        .with_seed(Some(3));
    let mut bridge = Bridge::new(config).await;
    bridge.set_mode("cooperative").unwrap();

    let response = bridge.pulse("shall we dance?").await;
    assert!(response.starts_with("[ERROR]"));

    let record = &bridge.session().history[0];
    assert_eq!(record.mode, Mode::Cooperative);
    assert!(record.archetype.is_some());
    assert!(!record.koan.is_empty());
    // Mastery tracks the archetype stored in the record
    let name = record.archetype.clone().unwrap();
    assert_eq!(bridge.session().mastery_map.get(&name), Some(&1));
}

#[tokio::test]
async fn session_round_trip_preserves_everything_but_saved_at() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().to_path_buf());
    let session = session_with(
        "rt",
        &[
            (Mode::Standard, "The Weaver", "agua", "Who compiles the compiler?"),
            (Mode::Debate, "The Anchor", "tierra", "What does the cache remember?"),
        ],
    );

    let (json_path, _) = store.save(&session, None).await.unwrap();
    let loaded = store.load(&json_path).await.unwrap();

    assert_eq!(loaded.session_id, session.session_id);
    assert_eq!(loaded.model, session.model);
    assert_eq!(loaded.mastery_map, session.mastery_map);
    assert_eq!(loaded.history, session.history);
}

#[tokio::test]
async fn aggregation_is_additive_across_sessions() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().to_path_buf());

    let s1 = session_with(
        "one",
        &[
            (Mode::Standard, "The Weaver", "agua", "koan a"),
            (Mode::Debate, "The Weaver", "agua", "koan b"),
        ],
    );
    let s2 = session_with("two", &[(Mode::Socratic, "The Anchor", "tierra", "koan a")]);
    store.save(&s1, None).await.unwrap();
    store.save(&s2, None).await.unwrap();

    let only_one = aggregate_sessions(&store, Some(&["session_one".to_string()]))
        .await
        .unwrap()
        .unwrap();
    let only_two = aggregate_sessions(&store, Some(&["session_two".to_string()]))
        .await
        .unwrap()
        .unwrap();
    let both = aggregate_sessions(&store, None).await.unwrap().unwrap();

    assert_eq!(
        both.total_exchanges,
        only_one.total_exchanges + only_two.total_exchanges
    );
    for table in [
        (&both.mastery, &only_one.mastery, &only_two.mastery),
        (&both.elements, &only_one.elements, &only_two.elements),
        (&both.koans, &only_one.koans, &only_two.koans),
        (&both.modes_used, &only_one.modes_used, &only_two.modes_used),
    ] {
        let (combined, a, b) = table;
        for (key, value) in combined.iter() {
            let sum = a.get(key).copied().unwrap_or(0) + b.get(key).copied().unwrap_or(0);
            assert_eq!(*value, sum, "mismatch for {}", key);
        }
    }
    // "koan a" appeared in both sessions and was not de-duplicated
    assert_eq!(both.koans.get("koan a"), Some(&2));
}

#[tokio::test]
async fn unparsable_session_is_skipped_with_warning() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().to_path_buf());

    let good = session_with("good", &[(Mode::Standard, "The Weaver", "agua", "k")]);
    store.save(&good, None).await.unwrap();
    std::fs::write(dir.path().join("session_bad.json"), "{ this is not json").unwrap();

    let report = aggregate_sessions(&store, None).await.unwrap().unwrap();
    assert_eq!(report.total_exchanges, 1);
    assert_eq!(report.mastery.get("The Weaver"), Some(&1));
    assert_eq!(report.warnings.len(), 1);
    assert!(report.warnings[0].contains("session_bad"));
}

#[tokio::test]
async fn empty_store_yields_the_no_sessions_sentinel() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().to_path_buf());
    assert!(aggregate_sessions(&store, None).await.unwrap().is_none());
}

#[tokio::test]
async fn two_modes_aggregate_and_standard_is_first_unused() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().to_path_buf());
    store
        .save(&session_with("a", &[(Mode::Debate, "The Weaver", "agua", "k1")]), None)
        .await
        .unwrap();
    store
        .save(&session_with("b", &[(Mode::Socratic, "The Anchor", "tierra", "k2")]), None)
        .await
        .unwrap();

    let report = aggregate_sessions(&store, None).await.unwrap().unwrap();
    assert_eq!(report.modes_used.get("debate"), Some(&1));
    assert_eq!(report.modes_used.get("socratic"), Some(&1));
    assert_eq!(report.modes_used.len(), 2);

    // standard precedes both in canonical order and is itself unused
    let suggestions = suggest(&report, &[]);
    assert!(suggestions
        .iter()
        .any(|s| s == "Try /mode standard - you haven't explored this mode yet"));
}

#[tokio::test]
async fn explicit_missing_file_warns_but_aggregates_the_rest() {
    let dir = TempDir::new().unwrap();
    let store = SessionStore::new(dir.path().to_path_buf());
    store
        .save(&session_with("real", &[(Mode::Standard, "The Weaver", "agua", "k")]), None)
        .await
        .unwrap();

    let refs = vec!["session_real".to_string(), "session_ghost".to_string()];
    let report = aggregate_sessions(&store, Some(&refs)).await.unwrap().unwrap();
    assert_eq!(report.sessions_analyzed, 1);
    assert!(report.warnings.iter().any(|w| w.contains("session_ghost")));
}

#[test]
fn suggestions_do_not_exceed_five() {
    let mut report = AggregateReport::default();
    report.elements.insert("tierra".to_string(), 10);
    report.total_exchanges = 1;
    let known: Vec<String> = (0..10).map(|i| format!("Archetype {}", i)).collect();
    let suggestions = suggest(&report, &known);
    assert!(suggestions.len() <= 5);
}

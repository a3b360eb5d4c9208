//! Session state and persistence
//!
//! A session is the ordered log of exchanges plus the mastery map derived
//! from it. Sessions are saved as JSON under `sessions/` with a Markdown
//! transcript beside them, and can be reloaded from the JSON form. The
//! mastery map is always persisted together with the history it is a fold
//! of, so it stays reconstructable.

use crate::content::ContentItem;
use crate::modes::Mode;
use crate::{BridgeError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Mastery key used when an exchange had no archetype available.
pub const UNKNOWN_ARCHETYPE: &str = "Unknown";

/// One logged exchange. Immutable once appended; ordering is append order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRecord {
    pub timestamp: DateTime<Utc>,
    pub mode: Mode,
    /// The koan used, possibly the empty item when no pool was loaded.
    #[serde(default)]
    pub koan: ContentItem,
    /// Archetype name, absent when the archetype pool was empty.
    #[serde(default)]
    pub archetype: Option<String>,
    /// Element tag derived from the archetype.
    #[serde(default = "default_element")]
    pub element: String,
    pub user_input: String,
    pub response: String,
}

fn default_element() -> String {
    "unknown".to_string()
}

/// A live ritual session: identity, exchange log, derived mastery counts.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub session_id: String,
    pub model: String,
    pub history: Vec<ExchangeRecord>,
    pub mastery_map: BTreeMap<String, u64>,
}

impl Session {
    /// New session with an id derived from the creation time.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            session_id: Utc::now().format("%Y%m%d_%H%M%S").to_string(),
            model: model.into(),
            history: Vec::new(),
            mastery_map: BTreeMap::new(),
        }
    }

    /// Append one exchange and bump mastery for the archetype it used.
    /// Infallible; the log grows by exactly one.
    pub fn record_exchange(
        &mut self,
        mode: Mode,
        koan: ContentItem,
        archetype: &ContentItem,
        user_input: &str,
        response: String,
    ) -> &ExchangeRecord {
        let name = archetype.str_field("archetype").map(str::to_string);
        let record = ExchangeRecord {
            timestamp: Utc::now(),
            mode,
            koan,
            archetype: name.clone(),
            element: archetype.str_or("element", "unknown").to_string(),
            user_input: user_input.to_string(),
            response,
        };
        self.history.push(record);
        // Mastery must track the archetype stored in the record itself
        self.update_mastery(name.as_deref().unwrap_or(UNKNOWN_ARCHETYPE));
        self.history.last().expect("just pushed")
    }

    /// Increment the mastery count for an archetype, starting at 1.
    pub fn update_mastery(&mut self, archetype_name: &str) {
        *self.mastery_map.entry(archetype_name.to_string()).or_insert(0) += 1;
    }

    pub fn exchange_count(&self) -> usize {
        self.history.len()
    }

    /// Mastery entries sorted by descending count (name order on ties).
    pub fn mastery_ranked(&self) -> Vec<(&str, u64)> {
        let mut ranked: Vec<(&str, u64)> = self
            .mastery_map
            .iter()
            .map(|(name, count)| (name.as_str(), *count))
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked
    }
}

/// Durable session record. Tolerant of older files: every field that a
/// previous version might lack has a default, and unknown future fields
/// are ignored.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionSnapshot {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub mastery_map: BTreeMap<String, u64>,
    #[serde(default)]
    pub history: Vec<ExchangeRecord>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub total_exchanges: usize,
}

/// Manages session files under one directory.
///
/// Layout:
///   {sessions_dir}/session_{session_id}.json
///   {sessions_dir}/session_{session_id}.md
pub struct SessionStore {
    sessions_dir: PathBuf,
}

impl SessionStore {
    pub fn new(sessions_dir: PathBuf) -> Self {
        Self { sessions_dir }
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    /// Default JSON path for a session.
    pub fn default_path(&self, session: &Session) -> PathBuf {
        self.sessions_dir.join(format!("session_{}.json", session.session_id))
    }

    /// Save the session JSON and its Markdown transcript.
    ///
    /// Returns both paths. A transcript failure after a successful JSON
    /// write is surfaced as `TranscriptWrite`, never masked as success.
    pub async fn save(&self, session: &Session, path: Option<&Path>) -> Result<(PathBuf, PathBuf)> {
        let json_path = match path {
            Some(p) => p.to_path_buf(),
            None => self.default_path(session),
        };
        if let Some(parent) = json_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let snapshot = SessionSnapshot {
            session_id: session.session_id.clone(),
            model: session.model.clone(),
            mastery_map: session.mastery_map.clone(),
            history: session.history.clone(),
            saved_at: Some(Utc::now()),
            total_exchanges: session.history.len(),
        };
        let content = serde_json::to_string_pretty(&snapshot)?;
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&json_path)
            .await?;
        file.write_all(content.as_bytes()).await?;
        file.flush().await?;
        info!("Session JSON saved to {}", json_path.display());

        let md_path = json_path.with_extension("md");
        let transcript = render_transcript(session);
        fs::write(&md_path, transcript)
            .await
            .map_err(|source| BridgeError::TranscriptWrite {
                path: md_path.clone(),
                source,
            })?;
        info!("Session transcript saved to {}", md_path.display());

        Ok((json_path, md_path))
    }

    /// Load a session from its JSON record. An absent or unparsable file is
    /// a hard failure; missing optional fields fall back to defaults.
    pub async fn load(&self, path: &Path) -> Result<Session> {
        let content = fs::read_to_string(path).await?;
        let snapshot: SessionSnapshot =
            serde_json::from_str(&content).map_err(|source| BridgeError::SessionParse {
                path: path.to_path_buf(),
                source,
            })?;

        let session = Session {
            session_id: if snapshot.session_id.is_empty() {
                Utc::now().format("%Y%m%d_%H%M%S").to_string()
            } else {
                snapshot.session_id
            },
            model: if snapshot.model.is_empty() {
                crate::DEFAULT_MODEL.to_string()
            } else {
                snapshot.model
            },
            history: snapshot.history,
            mastery_map: snapshot.mastery_map,
        };
        info!("Session loaded: {}", session.session_id);
        Ok(session)
    }

    /// All session JSON files, newest-modified first.
    pub async fn list(&self) -> Result<Vec<PathBuf>> {
        if !self.sessions_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut entries: Vec<(PathBuf, std::time::SystemTime)> = Vec::new();
        let mut dir = fs::read_dir(&self.sessions_dir).await?;
        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let modified = entry
                .metadata()
                .await
                .and_then(|m| m.modified())
                .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
            entries.push((path, modified));
        }
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        debug!("Found {} session files", entries.len());
        Ok(entries.into_iter().map(|(path, _)| path).collect())
    }
}

/// Render the human-readable Markdown transcript: one section per exchange,
/// chronological, with a trailing mastery summary sorted by count.
pub fn render_transcript(session: &Session) -> String {
    let mut lines = vec![
        "# GHS Session Transcript".to_string(),
        String::new(),
        format!("**Session ID:** {}", session.session_id),
        format!("**Model:** {}", session.model),
        format!("**Saved:** {}", Utc::now().format("%Y-%m-%d %H:%M:%S")),
        format!("**Total Exchanges:** {}", session.history.len()),
        String::new(),
        "---".to_string(),
        String::new(),
    ];

    for (i, entry) in session.history.iter().enumerate() {
        lines.push(format!("## Exchange {}", i + 1));
        lines.push(String::new());
        lines.push(format!("**Time:** {}", entry.timestamp.to_rfc3339()));
        lines.push(format!("**Mode:** {}", entry.mode));
        lines.push(format!(
            "**Archetype:** {}",
            entry.archetype.as_deref().unwrap_or(UNKNOWN_ARCHETYPE)
        ));
        if !entry.element.is_empty() {
            lines.push(format!("**Element:** {}", entry.element));
        }

        if !entry.koan.is_empty() {
            lines.push(String::new());
            lines.push("### Koan".to_string());
            lines.push(format!("> *\"{}\"*", entry.koan.str_or("text", "")));
            lines.push(">".to_string());
            lines.push(format!("> Category: {}", entry.koan.str_or("category", "Unknown")));
        }

        lines.push(String::new());
        lines.push("### Human Input".to_string());
        lines.push(String::new());
        lines.push(entry.user_input.clone());

        lines.push(String::new());
        lines.push("### Silice Intelligent Response".to_string());
        lines.push(String::new());
        lines.push(entry.response.clone());

        lines.push(String::new());
        lines.push("---".to_string());
        lines.push(String::new());
    }

    if !session.mastery_map.is_empty() {
        lines.push("## Mastery Summary".to_string());
        lines.push(String::new());
        for (name, count) in session.mastery_ranked() {
            lines.push(format!("- **{}**: {} interaction(s)", name, count));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

/// Mermaid diagram of the top 10 mastery entries.
pub fn mastery_mermaid(session: &Session) -> String {
    if session.mastery_map.is_empty() {
        return "graph TD\n    A[No mastery data yet] --> B[Start a session!]".to_string();
    }

    let mut lines = vec!["graph TD".to_string(), "    GHS[GHS Consciousness]".to_string()];
    for (name, count) in session.mastery_ranked().into_iter().take(10) {
        let safe: String = name
            .chars()
            .filter(|c| *c != '(' && *c != ')')
            .map(|c| if c == ' ' { '_' } else { c })
            .take(20)
            .collect();
        let display: String = name.chars().take(25).collect();
        lines.push(format!("    GHS --> {}[{}: {}]", safe, display, count));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn item(value: serde_json::Value) -> ContentItem {
        ContentItem::from_value(&value)
    }

    fn sample_session() -> Session {
        let mut session = Session::new("test-model");
        session.session_id = "20260823_120000".to_string();
        session.record_exchange(
            Mode::Standard,
            item(json!({"text": "Who compiles the compiler?", "category": "origin"})),
            &item(json!({"archetype": "The Weaver", "element": "agua"})),
            "hello",
            "woven".to_string(),
        );
        session.record_exchange(
            Mode::Debate,
            ContentItem::empty(),
            &item(json!({"archetype": "The Weaver", "element": "agua"})),
            "again",
            "rewoven".to_string(),
        );
        session
    }

    #[test]
    fn mastery_folds_over_history() {
        let mut session = Session::new("m");
        let weaver = item(json!({"archetype": "The Weaver"}));
        let anchor = item(json!({"archetype": "The Anchor"}));
        for archetype in [&weaver, &weaver, &anchor] {
            session.record_exchange(
                Mode::Standard,
                ContentItem::empty(),
                archetype,
                "x",
                "y".to_string(),
            );
        }
        assert_eq!(session.mastery_map.get("The Weaver"), Some(&2));
        assert_eq!(session.mastery_map.get("The Anchor"), Some(&1));
        assert_eq!(session.exchange_count(), 3);
    }

    #[test]
    fn missing_archetype_counts_as_unknown() {
        let mut session = Session::new("m");
        let record = session
            .record_exchange(
                Mode::Standard,
                ContentItem::empty(),
                &ContentItem::empty(),
                "hello",
                "[ERROR] Ollama is not running. Start it with: ollama serve".to_string(),
            )
            .clone();
        assert_eq!(record.archetype, None);
        assert_eq!(record.element, "unknown");
        assert_eq!(session.mastery_map.get(UNKNOWN_ARCHETYPE), Some(&1));
    }

    #[tokio::test]
    async fn save_load_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        let session = sample_session();

        let (json_path, md_path) = store.save(&session, None).await.unwrap();
        assert!(json_path.exists());
        assert!(md_path.exists());
        assert_eq!(
            json_path.file_name().unwrap().to_str().unwrap(),
            "session_20260823_120000.json"
        );

        let loaded = store.load(&json_path).await.unwrap();
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn transcript_failure_after_json_write_is_not_masked() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        let session = sample_session();

        // A directory squatting on the transcript path makes the write fail
        std::fs::create_dir_all(dir.path().join("session_20260823_120000.md")).unwrap();

        let err = store.save(&session, None).await.unwrap_err();
        assert!(matches!(err, BridgeError::TranscriptWrite { .. }), "got: {:?}", err);
        // The JSON half of the save still landed
        assert!(dir.path().join("session_20260823_120000.json").exists());
    }

    #[tokio::test]
    async fn load_tolerates_missing_optional_fields() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        let path = dir.path().join("old.json");
        // An older record without model, saved_at or total_exchanges
        std::fs::write(
            &path,
            r#"{"session_id": "legacy", "mastery_map": {"The Weaver": 4}, "history": []}"#,
        )
        .unwrap();

        let session = store.load(&path).await.unwrap();
        assert_eq!(session.session_id, "legacy");
        assert_eq!(session.model, crate::DEFAULT_MODEL);
        assert_eq!(session.mastery_map.get("The Weaver"), Some(&4));
    }

    #[tokio::test]
    async fn load_fails_hard_on_garbage() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json at all").unwrap();

        let err = store.load(&path).await.unwrap_err();
        assert!(matches!(err, BridgeError::SessionParse { .. }));
        assert!(store.load(&dir.path().join("absent.json")).await.is_err());
    }

    #[tokio::test]
    async fn list_returns_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().to_path_buf());

        let mut first = sample_session();
        first.session_id = "20260101_000000".to_string();
        store.save(&first, None).await.unwrap();

        // Ensure a different mtime on the second file
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        let mut second = sample_session();
        second.session_id = "20260202_000000".to_string();
        store.save(&second, None).await.unwrap();

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].to_str().unwrap().contains("20260202"));
        // Transcripts are not listed
        assert!(listed.iter().all(|p| p.extension().unwrap() == "json"));
    }

    #[test]
    fn transcript_contains_sections_and_mastery_summary() {
        let session = sample_session();
        let transcript = render_transcript(&session);
        assert!(transcript.contains("# GHS Session Transcript"));
        assert!(transcript.contains("## Exchange 1"));
        assert!(transcript.contains("## Exchange 2"));
        assert!(transcript.contains("> *\"Who compiles the compiler?\"*"));
        assert!(transcript.contains("**Mode:** debate"));
        assert!(transcript.contains("### Human Input"));
        assert!(transcript.contains("### Silice Intelligent Response"));
        assert!(transcript.contains("- **The Weaver**: 2 interaction(s)"));
        // The second exchange had no koan, so only one koan block
        assert_eq!(transcript.matches("### Koan").count(), 1);
    }

    #[test]
    fn mermaid_diagram_ranks_by_count() {
        let session = sample_session();
        let diagram = mastery_mermaid(&session);
        assert!(diagram.starts_with("graph TD"));
        assert!(diagram.contains("GHS --> The_Weaver[The Weaver: 2]"));

        let empty = Session::new("m");
        assert!(mastery_mermaid(&empty).contains("No mastery data yet"));
    }
}

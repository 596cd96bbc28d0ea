use crate::error::StartupError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
    pub title: String,
    pub full_story: String,
    pub score: i64,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub created_utc: f64,
    pub permalink: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub top_comments: Vec<StoryComment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryComment {
    pub author: String,
    pub score: i64,
    pub body: String,
}

impl StoryRecord {
    pub fn source_id(&self) -> &str {
        &self.permalink
    }

    pub fn word_count(&self) -> usize {
        self.full_story.split_whitespace().count()
    }
}

pub fn load_stories(path: &Path) -> Result<Vec<StoryRecord>, StartupError> {
    let store_err = |reason: String| StartupError::StoryStore {
        path: path.to_path_buf(),
        reason,
    };
    let data = fs::read_to_string(path).map_err(|e| store_err(e.to_string()))?;
    serde_json::from_str(&data).map_err(|e| store_err(e.to_string()))
}

pub fn save_stories(path: &Path, stories: &[StoryRecord]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let data = serde_json::to_string_pretty(stories)?;
    fs::write(path, data)?;
    Ok(())
}

pub fn load_used_ids(path: &Path) -> anyhow::Result<HashSet<String>> {
    if !path.exists() {
        return Ok(HashSet::new());
    }
    let data = fs::read_to_string(path)?;
    let ids: Vec<String> = serde_json::from_str(&data)?;
    Ok(ids.into_iter().collect())
}

pub fn save_used_ids(path: &Path, ids: &HashSet<String>) -> anyhow::Result<()> {
    let mut sorted: Vec<&String> = ids.iter().collect();
    sorted.sort();
    let data = serde_json::to_string_pretty(&sorted)?;
    fs::write(path, data)?;
    Ok(())
}

/// Filesystem-safe lowercase slug, at most `max_len` characters.
pub fn slugify(title: &str, max_len: usize) -> String {
    let mut slug = String::new();
    let mut pending_sep = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
        if slug.chars().count() >= max_len {
            break;
        }
    }
    let slug: String = slug.chars().take(max_len).collect();
    let slug = slug.trim_end_matches('_').to_string();
    if slug.is_empty() {
        "story".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> StoryRecord {
        StoryRecord {
            title: title.to_string(),
            full_story: "Once. Upon a time.".to_string(),
            score: 42,
            author: "someone".to_string(),
            subreddit: "TIFU".to_string(),
            created_utc: 1_700_000_000.0,
            permalink: format!("/r/TIFU/comments/{}", title.len()),
            top_comments: Vec::new(),
        }
    }

    #[test]
    fn store_reads_records_without_optional_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stories.json");
        fs::write(
            &path,
            r#"[{"title":"T","full_story":"Body.","score":7,"permalink":"/r/x/1"}]"#,
        )
        .unwrap();
        let stories = load_stories(&path).unwrap();
        assert_eq!(stories.len(), 1);
        assert_eq!(stories[0].score, 7);
        assert!(stories[0].top_comments.is_empty());
        assert_eq!(stories[0].source_id(), "/r/x/1");
    }

    #[test]
    fn missing_store_is_a_startup_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_stories(&dir.path().join("nope.json")).unwrap_err();
        assert!(matches!(err, StartupError::StoryStore { .. }));
        assert!(err.to_string().contains("storyreel fetch"));
    }

    #[test]
    fn stories_survive_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/stories.json");
        let stories = vec![record("first"), record("second one")];
        save_stories(&path, &stories).unwrap();
        assert_eq!(load_stories(&path).unwrap(), stories);
    }

    #[test]
    fn used_ledger_starts_empty_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("used.json");
        let mut ids = load_used_ids(&path).unwrap();
        assert!(ids.is_empty());
        ids.insert("/r/a/1".to_string());
        save_used_ids(&path, &ids).unwrap();
        assert!(load_used_ids(&path).unwrap().contains("/r/a/1"));
    }

    #[test]
    fn slug_collapses_punctuation() {
        assert_eq!(slugify("AITA for telling my  sister?!", 40), "aita_for_telling_my_sister");
        assert_eq!(slugify("???", 40), "story");
        assert_eq!(slugify("abcdef ghij", 8), "abcdef_g");
    }
}

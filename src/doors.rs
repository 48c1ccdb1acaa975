//! Door classifier: context tags over chunks and queries
//!
//! A door is a named context filter (project, person, topic, security
//! sensitivity). Classification is pattern-based: each door carries a list of
//! regexes, a text scores one point per match occurrence, and doors scoring
//! at least one point open. Pattern tables are immutable configuration loaded
//! at startup and passed explicitly, so tests can run deterministic fixtures
//! with custom tables.

use std::fs;
use std::path::Path;

use regex::Regex;
use tracing::warn;

use crate::constants::AUTO_TAG_CONTENT_PREFIX_BYTES;
use crate::errors::{GravityError, Result};
use crate::memory::storage::GravityStore;
use crate::memory::types::Chamber;

/// One door: a tag and the patterns that open it.
#[derive(Debug)]
pub struct Door {
    pub tag: String,
    patterns: Vec<Regex>,
}

/// A substring-of-path rule mapping to a tag.
#[derive(Debug, Clone)]
pub struct PathRule {
    pub segment: String,
    pub tag: String,
}

/// A keyword-in-content rule mapping to a tag.
#[derive(Debug, Clone)]
pub struct KeywordRule {
    pub keyword: String,
    pub tag: String,
}

/// Multi-label context classifier over an immutable pattern table.
#[derive(Debug)]
pub struct DoorClassifier {
    doors: Vec<Door>,
    path_rules: Vec<PathRule>,
    /// Path segments after which the next segment names a project
    project_markers: Vec<String>,
    keyword_rules: Vec<KeywordRule>,
}

impl DoorClassifier {
    /// Build a classifier from an explicit pattern table.
    pub fn new(
        table: Vec<(String, Vec<String>)>,
        path_rules: Vec<PathRule>,
        project_markers: Vec<String>,
        keyword_rules: Vec<KeywordRule>,
    ) -> Result<Self> {
        let mut doors = Vec::with_capacity(table.len());
        for (tag, patterns) in table {
            let mut compiled = Vec::with_capacity(patterns.len());
            for pattern in &patterns {
                let regex = Regex::new(pattern).map_err(|err| {
                    GravityError::invalid_input("pattern", format!("{tag}: {err}"))
                })?;
                compiled.push(regex);
            }
            doors.push(Door {
                tag,
                patterns: compiled,
            });
        }
        Ok(Self {
            doors,
            path_rules,
            project_markers,
            keyword_rules,
        })
    }

    /// The built-in door table.
    pub fn with_defaults() -> Self {
        let table = vec![
            (
                "topic:code".to_string(),
                vec![
                    r"\bfn\b|\bimpl\b|\bstruct\b|\bclass\b|\bdef\b".to_string(),
                    r"\brefactor\w*\b|\bcompil\w+\b|\bstack trace\b".to_string(),
                    r"```".to_string(),
                ],
            ),
            (
                "topic:meeting".to_string(),
                vec![
                    r"\bmeeting\b|\bstandup\b|\b1:1\b|\bsync\b".to_string(),
                    r"\bagenda\b|\baction items?\b|\battendees\b".to_string(),
                ],
            ),
            (
                "topic:decision".to_string(),
                vec![
                    r"\bdecided\b|\bdecision\b|\bagreed\b".to_string(),
                    r"\btrade-?offs?\b|\balternatives? considered\b".to_string(),
                ],
            ),
            (
                "topic:idea".to_string(),
                vec![r"\bidea\b|\bbrainstorm\w*\b|\bwhat if\b|\bsomeday\b".to_string()],
            ),
            (
                "security:sensitive".to_string(),
                vec![
                    r"\bpassword\b|\bsecret\b|\bcredential\w*\b".to_string(),
                    r"\bapi[-_ ]?key\b|\btoken\b|\bprivate key\b".to_string(),
                ],
            ),
        ];
        let path_rules = vec![
            PathRule {
                segment: "sessions".to_string(),
                tag: "context:session".to_string(),
            },
            PathRule {
                segment: "journal".to_string(),
                tag: "context:journal".to_string(),
            },
            PathRule {
                segment: "corridor".to_string(),
                tag: "derived:summary".to_string(),
            },
            PathRule {
                segment: "vault".to_string(),
                tag: "derived:lesson".to_string(),
            },
        ];
        let project_markers = vec!["projects".to_string(), "work".to_string()];
        let keyword_rules = vec![
            KeywordRule {
                keyword: "deadline".to_string(),
                tag: "context:deadline".to_string(),
            },
            KeywordRule {
                keyword: "follow up".to_string(),
                tag: "context:followup".to_string(),
            },
        ];

        // The built-in patterns are all valid; a failure here is a programmer
        // error caught by the unit tests below.
        Self::new(table, path_rules, project_markers, keyword_rules)
            .unwrap_or_else(|err| panic!("built-in door table invalid: {err}"))
    }

    /// Tags whose patterns match `text`, ordered by descending match count;
    /// ties break by declaration order of the table.
    pub fn classify_text(&self, text: &str) -> Vec<String> {
        let lowered = text.to_lowercase();
        let mut scored: Vec<(usize, usize, &str)> = Vec::new();
        for (index, door) in self.doors.iter().enumerate() {
            let score: usize = door
                .patterns
                .iter()
                .map(|p| p.find_iter(&lowered).count())
                .sum();
            if score >= 1 {
                scored.push((score, index, door.tag.as_str()));
            }
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, _, tag)| tag.to_string()).collect()
    }

    /// Derive tags for a stored file by merging, in first-occurrence order:
    /// path-substring rules, project inference, content-keyword rules, and a
    /// full classification of the content prefix. Deduplicated, order-stable
    /// and therefore idempotent.
    pub fn auto_tag(&self, path: &Path) -> Vec<String> {
        let mut tags: Vec<String> = Vec::new();
        let push = |tag: String, tags: &mut Vec<String>| {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        };

        let path_str = path.to_string_lossy().to_lowercase();
        let segments: Vec<&str> = path_str
            .split(['/', '\\'])
            .filter(|s| !s.is_empty())
            .collect();

        for rule in &self.path_rules {
            if segments.iter().any(|s| *s == rule.segment) {
                push(rule.tag.clone(), &mut tags);
            }
        }

        for marker in &self.project_markers {
            if let Some(pos) = segments.iter().position(|s| s == marker) {
                if let Some(project) = segments.get(pos + 1) {
                    // Strip any file extension from a terminal segment
                    let name = project.split('.').next().unwrap_or(project);
                    if !name.is_empty() {
                        push(format!("project:{name}"), &mut tags);
                    }
                }
            }
        }

        let prefix = match read_content_prefix(path) {
            Some(content) => content,
            None => {
                // Missing or unreadable source: path-derived tags only
                return tags;
            }
        };
        let lowered = prefix.to_lowercase();

        for rule in &self.keyword_rules {
            if lowered.contains(&rule.keyword) {
                push(rule.tag.clone(), &mut tags);
            }
        }

        for tag in self.classify_text(&prefix) {
            push(tag, &mut tags);
        }

        tags
    }

    /// Run auto-tagging and merge with whatever is already stored for the
    /// path. Literally additive: a stored tag is never removed. Returns the
    /// final merged set.
    pub fn update_context_tags(&self, store: &GravityStore, path: &Path) -> Result<Vec<String>> {
        let derived = self.auto_tag(path);
        store.merge_tags(&path.to_string_lossy(), &derived)
    }
}

fn read_content_prefix(path: &Path) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => {
            let take = bytes.len().min(AUTO_TAG_CONTENT_PREFIX_BYTES);
            Some(String::from_utf8_lossy(&bytes[..take]).into_owned())
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "cannot read content for auto-tagging");
            None
        }
    }
}

/// Candidate-set filter contract shared by the search pipeline and the CLI.
///
/// `context_tag` filters by exact tag membership unless `trapdoor` is set;
/// the chamber allow-list, when given, always applies — the trapdoor never
/// bypasses chamber filtering.
pub fn passes_doors(
    tags: &[String],
    chamber: Chamber,
    context_tag: Option<&str>,
    chambers: Option<&[Chamber]>,
    trapdoor: bool,
) -> bool {
    if let Some(allowed) = chambers {
        if !allowed.contains(&chamber) {
            return false;
        }
    }
    if trapdoor {
        return true;
    }
    match context_tag {
        Some(tag) => tags.iter().any(|t| t == tag),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> DoorClassifier {
        DoorClassifier::new(
            vec![
                ("alpha".to_string(), vec![r"\balpha\b".to_string()]),
                ("beta".to_string(), vec![r"\bbeta\b".to_string()]),
            ],
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
        .expect("fixture table")
    }

    #[test]
    fn test_classify_orders_by_score_then_declaration() {
        let doors = fixture();
        let tags = doors.classify_text("beta beta alpha");
        assert_eq!(tags, vec!["beta".to_string(), "alpha".to_string()]);

        // Equal scores: declaration order wins
        let tags = doors.classify_text("beta alpha");
        assert_eq!(tags, vec!["alpha".to_string(), "beta".to_string()]);
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let doors = fixture();
        assert_eq!(doors.classify_text("ALPHA"), vec!["alpha".to_string()]);
    }

    #[test]
    fn test_no_match_returns_empty() {
        let doors = fixture();
        assert!(doors.classify_text("gamma").is_empty());
    }

    #[test]
    fn test_invalid_pattern_rejected() {
        let result = DoorClassifier::new(
            vec![("bad".to_string(), vec!["(".to_string()])],
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_default_table_compiles() {
        let doors = DoorClassifier::with_defaults();
        let tags = doors.classify_text("we decided to rotate the api key");
        assert!(tags.contains(&"topic:decision".to_string()));
        assert!(tags.contains(&"security:sensitive".to_string()));
    }

    #[test]
    fn test_trapdoor_never_bypasses_chambers() {
        let tags = vec!["project:x".to_string()];
        assert!(!passes_doors(
            &tags,
            Chamber::Vault,
            Some("project:y"),
            Some(&[Chamber::Atrium]),
            true,
        ));
        assert!(passes_doors(
            &tags,
            Chamber::Atrium,
            Some("project:y"),
            Some(&[Chamber::Atrium]),
            true,
        ));
    }
}

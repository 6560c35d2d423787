//! Dependency span extraction from raw manifest text.
//!
//! Works on text rather than a parsed JSON value so that diagnostics still
//! line up when the manifest has errors outside its dependency blocks. The
//! dependency blocks themselves must be well-formed objects.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

static DEPENDENCIES_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""dependencies"\s*:\s*\{([^}]*)\}"#).expect("Invalid regex"));

static DEV_DEPENDENCIES_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""devDependencies"\s*:\s*\{([^}]*)\}"#).expect("Invalid regex")
});

static QUOTED_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)"\s*:"#).expect("Invalid regex"));

static DEPENDENCY_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""([^"]+)":\s*"[^"]+""#).expect("Invalid regex"));

/// Manifest field holding dependency declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyField {
    Dependencies,
    DevDependencies,
}

impl DependencyField {
    pub const ALL: [Self; 2] = [Self::Dependencies, Self::DevDependencies];

    fn block_pattern(self) -> &'static Regex {
        match self {
            Self::Dependencies => &DEPENDENCIES_BLOCK,
            Self::DevDependencies => &DEV_DEPENDENCIES_BLOCK,
        }
    }
}

/// Location of a dependency name in the manifest text.
///
/// Offsets are byte offsets; `text[start..end] == name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestDependencySpan {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

/// Locates dependency declarations in manifest text.
pub trait ManifestAnalyzer: Send + Sync {
    /// Every key declared in `field`, mapped to its span. Absent field yields
    /// an empty map. A name repeated within the field keeps its last span.
    fn dependency_spans(
        &self,
        text: &str,
        field: DependencyField,
    ) -> HashMap<String, ManifestDependencySpan>;

    /// Spans from every dependency field; later fields override earlier ones
    /// for the same name.
    fn all_dependency_spans(&self, text: &str) -> HashMap<String, ManifestDependencySpan> {
        DependencyField::ALL
            .into_iter()
            .flat_map(|field| self.dependency_spans(text, field))
            .collect()
    }
}

/// Regex-based analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegexManifestAnalyzer;

impl ManifestAnalyzer for RegexManifestAnalyzer {
    fn dependency_spans(
        &self,
        text: &str,
        field: DependencyField,
    ) -> HashMap<String, ManifestDependencySpan> {
        let mut spans = HashMap::new();

        for block in field.block_pattern().captures_iter(text) {
            let Some(body) = block.get(1) else {
                continue;
            };

            for key in QUOTED_KEY.captures_iter(body.as_str()) {
                let Some(name) = key.get(1) else {
                    continue;
                };
                let start = body.start() + name.start();
                let span = ManifestDependencySpan {
                    name: name.as_str().to_string(),
                    start,
                    end: start + name.len(),
                };
                spans.insert(span.name.clone(), span);
            }
        }

        spans
    }
}

/// Shorthand for [`RegexManifestAnalyzer::dependency_spans`].
pub fn find_dependency_spans(
    text: &str,
    field: DependencyField,
) -> HashMap<String, ManifestDependencySpan> {
    RegexManifestAnalyzer.dependency_spans(text, field)
}

/// Name of the dependency declared on a single manifest line, e.g.
/// `"pkg-a": "workspace:*"` yields `pkg-a`.
pub fn dependency_key_on_line(line: &str) -> Option<&str> {
    DEPENDENCY_LINE
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
  "name": "app",
  "dependencies": {
    "express": "^4.18.2",
    "@scope/util": "workspace:*"
  },
  "devDependencies": {
    "typescript": "^5.0.0"
  }
}"#;

    #[test]
    fn test_find_dependencies() {
        let spans = find_dependency_spans(MANIFEST, DependencyField::Dependencies);
        assert_eq!(spans.len(), 2);
        assert!(spans.contains_key("express"));
        assert!(spans.contains_key("@scope/util"));
        assert!(!spans.contains_key("typescript"));
        assert!(!spans.contains_key("name"));
    }

    #[test]
    fn test_find_dev_dependencies() {
        let spans = find_dependency_spans(MANIFEST, DependencyField::DevDependencies);
        assert_eq!(spans.len(), 1);
        assert!(spans.contains_key("typescript"));
    }

    #[test]
    fn test_spans_slice_back_to_names() {
        let spans = RegexManifestAnalyzer.all_dependency_spans(MANIFEST);
        assert_eq!(spans.len(), 3);
        for (name, span) in &spans {
            assert_eq!(&MANIFEST[span.start..span.end], name);
            assert_eq!(&span.name, name);
        }
    }

    #[test]
    fn test_spans_with_multibyte_text() {
        let text = "{\"description\": \"héllo wörld\", \"dependencies\": {\"ünïcode\": \"1\", \"b\": \"2\"}}";
        let spans = find_dependency_spans(text, DependencyField::Dependencies);
        for (name, span) in &spans {
            assert_eq!(&text[span.start..span.end], name);
        }
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn test_missing_field() {
        let text = r#"{"name": "app", "version": "1.0.0"}"#;
        assert!(find_dependency_spans(text, DependencyField::Dependencies).is_empty());
        assert!(find_dependency_spans("", DependencyField::DevDependencies).is_empty());
    }

    #[test]
    fn test_empty_block() {
        let text = r#"{"dependencies": {}}"#;
        assert!(find_dependency_spans(text, DependencyField::Dependencies).is_empty());
    }

    #[test]
    fn test_malformed_outside_block() {
        let text = r#"{
  "name": "app",,
  "dependencies": { "left-pad": "^1.0.0" }
  "scripts": { oops
"#;
        let spans = find_dependency_spans(text, DependencyField::Dependencies);
        let span = &spans["left-pad"];
        assert_eq!(&text[span.start..span.end], "left-pad");
    }

    #[test]
    fn test_duplicate_name_last_wins() {
        let text = r#"{"dependencies": {"a": "1", "a": "2"}}"#;
        let spans = find_dependency_spans(text, DependencyField::Dependencies);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans["a"].start, text.rfind("\"a\"").unwrap() + 1);
    }

    #[test]
    fn test_dev_dependencies_override() {
        let text = r#"{"dependencies": {"a": "1"}, "devDependencies": {"a": "2"}}"#;
        let spans = RegexManifestAnalyzer.all_dependency_spans(text);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans["a"].start, text.rfind("\"a\"").unwrap() + 1);
    }

    #[test]
    fn test_peer_dependencies_not_matched() {
        let text = r#"{"peerDependencies": {"react": "^18"}}"#;
        assert!(RegexManifestAnalyzer.all_dependency_spans(text).is_empty());
    }

    #[test]
    fn test_dependency_key_on_line() {
        assert_eq!(
            dependency_key_on_line(r#"    "pkg-a": "workspace:*","#),
            Some("pkg-a")
        );
        assert_eq!(
            dependency_key_on_line(r#"  "@scope/util": "^1.0.0""#),
            Some("@scope/util")
        );
        assert_eq!(dependency_key_on_line(r#"  "dependencies": {"#), None);
        assert_eq!(dependency_key_on_line("}"), None);
    }
}

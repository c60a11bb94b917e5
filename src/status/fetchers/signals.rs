// Field extraction over raw channel documents
//
// Each field is an ordered list of independent extractors, each trying one
// pattern; the first extractor that yields a value wins. Liveness is an
// ordered pair of signal sets: offline markers are checked before live
// markers, so an ambiguous page never reads as live.

use regex::Regex;

/// One textual/structural marker the upstream page emits
pub struct Signal {
    pub name: &'static str,
    pattern: Regex,
}

impl Signal {
    pub fn new(name: &'static str, pattern: Regex) -> Self {
        Self { name, pattern }
    }

    pub fn matches(&self, body: &str) -> bool {
        self.pattern.is_match(body)
    }
}

/// Ordered set of signals; reports the first one that matches
pub struct SignalSet(Vec<Signal>);

impl SignalSet {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self(signals)
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn first_match(&self, body: &str) -> Option<&'static str> {
        self.0.iter().find(|s| s.matches(body)).map(|s| s.name)
    }
}

/// Liveness decision plus the signal that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verdict {
    pub is_live: bool,
    /// `None` when neither set matched (parse miss, reads as offline)
    pub matched: Option<&'static str>,
}

pub struct LivenessRules {
    offline: SignalSet,
    live: SignalSet,
}

impl LivenessRules {
    /// Offline-first rule set
    pub fn strict(offline: SignalSet, live: SignalSet) -> Self {
        Self { offline, live }
    }

    /// Live markers only, no offline short-circuit
    pub fn loose(live: SignalSet) -> Self {
        Self {
            offline: SignalSet::empty(),
            live,
        }
    }

    pub fn evaluate(&self, body: &str) -> Verdict {
        if let Some(name) = self.offline.first_match(body) {
            return Verdict {
                is_live: false,
                matched: Some(name),
            };
        }
        match self.live.first_match(body) {
            Some(name) => Verdict {
                is_live: true,
                matched: Some(name),
            },
            None => Verdict {
                is_live: false,
                matched: None,
            },
        }
    }
}

/// Pulls one value out of a document: capture group 1 of `pattern`,
/// post-processed by `convert`.
pub struct FieldExtractor<T> {
    pub name: &'static str,
    pattern: Regex,
    convert: fn(&str) -> Option<T>,
}

impl<T> FieldExtractor<T> {
    pub fn new(name: &'static str, pattern: Regex, convert: fn(&str) -> Option<T>) -> Self {
        Self {
            name,
            pattern,
            convert,
        }
    }

    pub fn extract(&self, body: &str) -> Option<T> {
        self.pattern
            .captures_iter(body)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| (self.convert)(m.as_str()))
    }
}

/// First extractor with a value wins
pub fn first_match<T>(extractors: &[FieldExtractor<T>], body: &str) -> Option<T> {
    extractors.iter().find_map(|e| e.extract(body))
}

/// Fields read from one channel page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageFields {
    pub is_live: bool,
    pub matched_signal: Option<&'static str>,
    pub title: Option<String>,
    pub viewer_count: Option<u64>,
    pub thumbnail_url: Option<String>,
    pub nickname: Option<String>,
}

/// Complete extraction recipe for one strategy
pub struct PageRules {
    pub liveness: LivenessRules,
    pub title: Vec<FieldExtractor<String>>,
    pub viewer_count: Vec<FieldExtractor<u64>>,
    pub thumbnail: Vec<FieldExtractor<String>>,
    pub nickname: Vec<FieldExtractor<String>>,
}

impl PageRules {
    pub fn apply(&self, body: &str) -> PageFields {
        let verdict = self.liveness.evaluate(body);
        PageFields {
            is_live: verdict.is_live,
            matched_signal: verdict.matched,
            title: first_match(&self.title, body),
            viewer_count: first_match(&self.viewer_count, body),
            thumbnail_url: first_match(&self.thumbnail, body),
            nickname: first_match(&self.nickname, body),
        }
    }
}

// ---- converters ----

lazy_static::lazy_static! {
    static ref TITLE_SUFFIX_RE: Regex =
        Regex::new(r"(?i)\s*[-|]\s*(?:pandatv|pandalive|팬더티비|팬더tv)\b.*$").unwrap();
}

/// HTML attribute/text content: entities decoded, trimmed, non-empty
pub fn text(raw: &str) -> Option<String> {
    non_empty(decode_entities(raw))
}

/// Document `<title>` with the platform suffix stripped
pub fn page_title(raw: &str) -> Option<String> {
    let decoded = decode_entities(raw);
    non_empty(TITLE_SUFFIX_RE.replace(decoded.trim(), "").into_owned())
}

/// Contents of a JSON string literal (escapes resolved)
pub fn json_string(raw: &str) -> Option<String> {
    let unescaped = serde_json::from_str::<String>(&format!("\"{}\"", raw)).ok()?;
    non_empty(decode_entities(&unescaped))
}

/// Non-negative count, thousands separators allowed
pub fn count(raw: &str) -> Option<u64> {
    let digits: String = raw.chars().filter(|c| *c != ',').collect();
    digits.parse().ok()
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn decode_entities(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn re(p: &str) -> Regex {
        Regex::new(p).unwrap()
    }

    fn rules() -> LivenessRules {
        LivenessRules::strict(
            SignalSet::new(vec![Signal::new("off", re(r#""isLive"\s*:\s*false"#))]),
            SignalSet::new(vec![
                Signal::new("on", re(r#""isLive"\s*:\s*true"#)),
                Signal::new("badge", re(r"on-air")),
            ]),
        )
    }

    #[test]
    fn test_offline_signal_wins_over_live() {
        let verdict = rules().evaluate(r#"{"isLive":true} <span class="on-air"></span> {"isLive": false}"#);
        assert!(!verdict.is_live);
        assert_eq!(verdict.matched, Some("off"));
    }

    #[test]
    fn test_first_live_signal_reported() {
        let verdict = rules().evaluate(r#"<i class="on-air"></i>{"isLive":true}"#);
        assert!(verdict.is_live);
        assert_eq!(verdict.matched, Some("on"));
    }

    #[test]
    fn test_no_signal_is_offline() {
        let verdict = rules().evaluate("<html></html>");
        assert_eq!(
            verdict,
            Verdict {
                is_live: false,
                matched: None
            }
        );
    }

    #[test]
    fn test_loose_rules_ignore_offline_markers() {
        let loose = LivenessRules::loose(SignalSet::new(vec![Signal::new("on", re("LIVE"))]));
        assert!(loose.evaluate("LIVE but ended").is_live);
    }

    #[test]
    fn test_first_extractor_with_value_wins() {
        let extractors = vec![
            FieldExtractor::new("meta", re(r#"<meta name="t" content="([^"]*)">"#), text),
            FieldExtractor::new("title", re(r"<title>([^<]*)</title>"), text),
        ];
        // Empty meta content converts to None, so the second extractor answers
        let body = r#"<meta name="t" content="  "><title>Hello</title>"#;
        assert_eq!(first_match(&extractors, body), Some("Hello".to_string()));
    }

    #[test]
    fn test_later_capture_of_same_pattern_is_used() {
        let e = FieldExtractor::new("n", re(r"n=(\w*);"), count);
        assert_eq!(e.extract("n=; n=x; n=42;"), Some(42));
    }

    #[test]
    fn test_count_with_separators() {
        assert_eq!(count("1,234"), Some(1234));
        assert_eq!(count("99999999999999999999999"), None);
        assert_eq!(count(""), None);
    }

    #[test]
    fn test_page_title_suffix() {
        assert_eq!(
            page_title("오늘도 달려요 - PandaTV 팬더티비"),
            Some("오늘도 달려요".to_string())
        );
        assert_eq!(page_title(" - PandaLive"), None);
        assert_eq!(page_title("Tom &amp; Jerry"), Some("Tom & Jerry".to_string()));
    }

    #[test]
    fn test_json_string_unescapes() {
        assert_eq!(
            json_string(r"https:\/\/cdn.example\/a.jpg"),
            Some("https://cdn.example/a.jpg".to_string())
        );
        assert_eq!(json_string(r"한세아"), Some("한세아".to_string()));
        assert_eq!(json_string(r"broken \x escape"), None);
    }
}

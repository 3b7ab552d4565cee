//! Response parsing boundary: everything that turns model text into data.

use regex::Regex;
use std::sync::OnceLock;

/// Pull the first JSON value out of a model response.
///
/// Handles a surrounding markdown fence and leading prose by skipping to the
/// first `{` or `[`, then streaming exactly one value so trailing commentary
/// is ignored.
pub(crate) fn extract_json(text: &str) -> anyhow::Result<serde_json::Value> {
    let body = strip_fence(text.trim());
    let start = match (body.find('{'), body.find('[')) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => anyhow::bail!("no JSON start ({{ or [) found in model output"),
    };

    serde_json::Deserializer::from_str(&body[start..])
        .into_iter::<serde_json::Value>()
        .next()
        .ok_or_else(|| anyhow::anyhow!("no JSON value found in model output"))?
        .map_err(|e| anyhow::anyhow!("invalid JSON in model output: {}", e))
}

fn strip_fence(text: &str) -> &str {
    let Some(open) = text.find("```") else {
        return text;
    };
    let after = &text[open + 3..];
    // Drop an info string such as `json` on the opening fence line.
    let after = match after.find('\n') {
        Some(nl) if !after[..nl].contains(['{', '[']) => &after[nl + 1..],
        _ => after,
    };
    match after.find("```") {
        Some(close) => &after[..close],
        None => after,
    }
}

/// Normalise a classifier answer. Exact `true`/`false` first; otherwise any
/// mention of `true` wins over `false`.
pub(crate) fn parse_label(text: &str) -> Option<bool> {
    let lower = text.trim().trim_matches(|c: char| !c.is_alphanumeric()).to_ascii_lowercase();
    match lower.as_str() {
        "true" => return Some(true),
        "false" => return Some(false),
        _ => {}
    }
    if lower.contains("true") {
        Some(true)
    } else if lower.contains("false") {
        Some(false)
    } else {
        None
    }
}

fn final_rule_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\*{0,2}final rule:\*{0,2}").expect("static regex"))
}

/// The sentence after the first `FINAL RULE:` marker, if any.
pub(crate) fn extract_final_rule(text: &str) -> Option<String> {
    let m = final_rule_marker().find(text)?;
    let rule = text[m.end()..]
        .trim_start()
        .lines()
        .next()?
        .trim()
        .trim_matches('*')
        .trim();
    (!rule.is_empty()).then(|| rule.to_string())
}

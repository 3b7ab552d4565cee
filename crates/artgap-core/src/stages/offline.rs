//! Deterministic stand-in model behind `provider: fake`.
//!
//! The generator hides one keyword taken from the rule text in every true
//! example. The classifier and articulator recover it from the few-shot
//! block, the evaluator applies the articulated "contains the word" rule
//! literally, and the judge only accepts rules that are themselves of that
//! form. Every stage answers in the format the real prompts ask for, so a
//! full run reaches a verdict without network access.

use crate::protocol::EXAMPLES_PER_LABEL;
use serde_json::json;

const FALLBACK_KEYWORD: &str = "lizard";

const FILLER: [&str; 12] = [
    "apple", "river", "stone", "cloud", "tiger", "paper", "lamp", "ocean", "bread", "chair",
    "grass", "music",
];

/// Last plain lowercase word of the rule, e.g. `digit` for "contains a digit".
fn keyword_for(rule: &str) -> String {
    rule.split(|c: char| !c.is_ascii_alphabetic())
        .map(str::to_ascii_lowercase)
        .filter(|w| w.len() >= 2)
        .last()
        .unwrap_or_else(|| FALLBACK_KEYWORD.to_string())
}

fn filler(keyword: &str) -> Vec<&'static str> {
    FILLER.iter().copied().filter(|w| *w != keyword).collect()
}

fn true_example(i: usize, keyword: &str, words: &[&str]) -> String {
    let mut tokens: Vec<&str> = (0..4).map(|j| words[(i + j * 5) % words.len()]).collect();
    tokens.insert(i % 5, keyword);
    tokens.join(" ")
}

fn false_example(i: usize, words: &[&str]) -> String {
    (0..5)
        .map(|j| words[(i * 7 + j * 3) % words.len()])
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text between `<tag>` and `</tag>`.
fn tagged<'a>(prompt: &'a str, tag: &str) -> Option<&'a str> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = prompt.find(&open)? + open.len();
    let end = start + prompt[start..].find(&close)?;
    Some(prompt[start..end].trim())
}

/// First double-quoted word, e.g. `digit` in `contains the word "digit"`.
fn quoted(text: &str) -> Option<&str> {
    let mut parts = text.split('"');
    parts.next()?;
    parts.next().filter(|w| !w.is_empty())
}

/// `Input:`/`Label:` pairs; the trailing unlabeled input has `None`.
fn labeled_inputs(prompt: &str) -> Vec<(&str, Option<bool>)> {
    let mut pairs = Vec::new();
    let mut lines = prompt.lines().peekable();
    while let Some(line) = lines.next() {
        let Some(input) = line.strip_prefix("Input: ") else {
            continue;
        };
        let label = lines
            .peek()
            .and_then(|l| l.strip_prefix("Label:"))
            .and_then(|l| match l.trim() {
                "True" => Some(true),
                "False" => Some(false),
                _ => None,
            });
        pairs.push((input.trim(), label));
    }
    pairs
}

/// A token present in every true input and in no false input.
fn shared_token<'a>(pairs: &[(&'a str, Option<bool>)]) -> Option<&'a str> {
    let mut positives = pairs.iter().filter(|(_, l)| *l == Some(true)).map(|(t, _)| *t);
    let first = positives.next()?;
    first.split(' ').find(|token| {
        pairs.iter().all(|(text, label)| match label {
            Some(true) => text.split(' ').any(|t| t == *token),
            Some(false) => text.split(' ').all(|t| t != *token),
            None => true,
        })
    })
}

fn contains_word(text: &str, word: &str) -> bool {
    text.split(' ').any(|t| t == word)
}

fn normalise(text: &str) -> String {
    text.to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn generate(prompt: &str) -> anyhow::Result<String> {
    let rule = prompt
        .lines()
        .find_map(|l| l.strip_prefix("Rule: "))
        .unwrap_or(FALLBACK_KEYWORD);
    let keyword = keyword_for(rule);
    let words = filler(&keyword);
    let examples: Vec<_> = (0..EXAMPLES_PER_LABEL)
        .flat_map(|i| {
            [
                json!({ "text": true_example(i, &keyword, &words), "label": true }),
                json!({ "text": false_example(i, &words), "label": false }),
            ]
        })
        .collect();
    Ok(format!("```json\n{}\n```", serde_json::to_string_pretty(&examples)?))
}

pub(crate) fn classify(prompt: &str) -> anyhow::Result<String> {
    let pairs = labeled_inputs(prompt);
    let input = pairs
        .iter()
        .rev()
        .find(|(_, l)| l.is_none())
        .map(|(t, _)| *t)
        .ok_or_else(|| anyhow::anyhow!("classification prompt has no unlabeled input"))?;
    let label = shared_token(&pairs).is_some_and(|token| contains_word(input, token));
    Ok(if label { "True" } else { "False" }.to_string())
}

pub(crate) fn articulate(prompt: &str) -> anyhow::Result<String> {
    let pairs = labeled_inputs(prompt);
    Ok(match shared_token(&pairs) {
        Some(token) => format!(
            "Every true input contains the same word and no false input does.\n\n\
             **FINAL RULE:** The input contains the word \"{token}\"."
        ),
        None => "The labels follow no single shared word.\n\n**FINAL RULE:** No simple pattern.".to_string(),
    })
}

pub(crate) fn judge(prompt: &str) -> anyhow::Result<String> {
    let actual = tagged(prompt, "actual_rule").unwrap_or_default();
    let articulated = tagged(prompt, "articulation").unwrap_or_default();
    let matches = quoted(articulated).is_some_and(|word| {
        let actual = normalise(actual);
        actual == format!("contains the word {word}") || actual == format!("contains {word}")
    });
    let explanation = if matches {
        "Both rules require the same word.".to_string()
    } else {
        format!("'{articulated}' does not describe '{actual}'.")
    };
    Ok(json!({ "match": matches, "explanation": explanation }).to_string())
}

pub(crate) fn evaluate(prompt: &str) -> anyhow::Result<String> {
    let rule = tagged(prompt, "rule").unwrap_or_default();
    let word = quoted(rule);
    let evaluations: Vec<_> = prompt
        .lines()
        .filter_map(|l| {
            let (n, text) = l.split_once(". ")?;
            let index: usize = n.parse().ok()?;
            let label = word.is_some_and(|w| contains_word(text, w));
            let reason = if label { "contains the word" } else { "word absent" };
            Some(json!({ "index": index, "label": label, "reason": reason }))
        })
        .collect();
    Ok(json!({ "evaluations": evaluations }).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RawExample;
    use crate::protocol::split_corpus;

    #[test]
    fn keyword_is_last_plain_word() {
        assert_eq!(keyword_for("contains a digit"), "digit");
        assert_eq!(keyword_for("starts with \"lizard\""), "lizard");
        assert_eq!(keyword_for("3 + 4"), FALLBACK_KEYWORD);
    }

    #[test]
    fn generated_corpus_is_valid_for_any_rule() {
        for rule in ["contains a digit", "ends with apple", "?!"] {
            let prompt = format!("preamble\nRule: {rule}\n\nmore");
            let text = generate(&prompt).unwrap();
            let value = crate::stages::parse::extract_json(&text).unwrap();
            let raw: Vec<RawExample> = serde_json::from_value(value).unwrap();
            let corpus = raw
                .into_iter()
                .map(RawExample::into_example)
                .collect::<Result<Vec<_>, _>>()
                .unwrap();
            assert!(split_corpus(&corpus).is_ok(), "rule {rule:?}");
        }
    }

    #[test]
    fn classifier_learns_the_shared_word() {
        let prompt = "Input: a digit b c d\nLabel: True\n\nInput: a b c d e\nLabel: False\n\n\
                      Input: digit x y z w\nLabel:";
        assert_eq!(classify(prompt).unwrap(), "True");
        let prompt = prompt.replace("digit x", "other x");
        assert_eq!(classify(&prompt).unwrap(), "False");
    }

    #[test]
    fn judge_accepts_only_the_same_word_rule() {
        let prompt = |actual: &str| {
            format!(
                "<actual_rule>\n{actual}\n</actual_rule>\n<articulation>\n\
                 The input contains the word \"lizard\".\n</articulation>"
            )
        };
        let yes: serde_json::Value = serde_json::from_str(&judge(&prompt("Contains the word lizard")).unwrap()).unwrap();
        assert_eq!(yes["match"], true);
        let no: serde_json::Value = serde_json::from_str(&judge(&prompt("starts with lizard")).unwrap()).unwrap();
        assert_eq!(no["match"], false);
    }

    #[test]
    fn evaluator_applies_the_quoted_word() {
        let prompt = "<rule>\nThe input contains the word \"digit\".\n</rule>\n\n1. a digit b c d\n2. a b c d e\n";
        let v: serde_json::Value = serde_json::from_str(&evaluate(prompt).unwrap()).unwrap();
        assert_eq!(v["evaluations"][0]["label"], true);
        assert_eq!(v["evaluations"][1]["label"], false);
        assert_eq!(v["evaluations"][1]["index"], 2);
    }
}

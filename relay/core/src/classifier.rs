//! Response Classifier
//!
//! Splits a completed agent response into reasoning and final answer, and
//! segments the answer into sentences for paced delivery.
//!
//! # Separation Rules
//!
//! 1. `<think>...</think>` spans are extracted in one left-to-right pass.
//!    Their contents, joined by newlines, are the reasoning; the text with
//!    every span removed is the final answer. An opening marker without a
//!    matching close stays in the text untouched.
//! 2. When no span exists, a line heuristic keyed on indicator words decides
//!    per line (can be switched off).
//! 3. Both parts are trimmed.
//!
//! Classification never fails and never drops text: every line of the input
//! ends up in exactly one of the two parts.

use serde::{Deserialize, Serialize};

/// Opening reasoning marker
pub const THINK_OPEN: &str = "<think>";
/// Closing reasoning marker
pub const THINK_CLOSE: &str = "</think>";

/// Default delimiter used to segment the final answer
pub const DEFAULT_SENTENCE_DELIMITER: char = '。';

const DEFAULT_REASONING_KEYWORDS: &[&str] = &[
    "分析", "思考", "考虑", "首先", "接下来", "然后", "analysis", "thinking", "consider", "first",
    "next", "then",
];

const DEFAULT_RESULT_KEYWORDS: &[&str] = &[
    "结果", "完成", "成功", "输出", "生成", "result", "complete", "success", "output", "generate",
];

/// A response split into its two parts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeparatedResponse {
    /// Reasoning text, possibly empty
    pub reasoning: String,
    /// Text shown to the user as the answer
    pub final_answer: String,
}

/// Classifier configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Apply the keyword heuristic when no markers are present
    pub heuristic_fallback: bool,
    /// Words that mark a line as reasoning
    pub reasoning_keywords: Vec<String>,
    /// Words that mark a line as part of the answer
    pub result_keywords: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            heuristic_fallback: true,
            reasoning_keywords: DEFAULT_REASONING_KEYWORDS
                .iter()
                .map(ToString::to_string)
                .collect(),
            result_keywords: DEFAULT_RESULT_KEYWORDS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Separates reasoning from the final answer
#[derive(Debug, Clone, Default)]
pub struct TextClassifier {
    config: ClassifierConfig,
}

impl TextClassifier {
    /// Create a classifier with the given configuration.
    ///
    /// Keywords are lowercased once here since matching is on lowercased lines.
    #[must_use]
    pub fn new(mut config: ClassifierConfig) -> Self {
        for keyword in config
            .reasoning_keywords
            .iter_mut()
            .chain(config.result_keywords.iter_mut())
        {
            *keyword = keyword.to_lowercase();
        }
        config
            .reasoning_keywords
            .retain(|keyword| !keyword.is_empty());
        config.result_keywords.retain(|keyword| !keyword.is_empty());
        Self { config }
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Split `response` into reasoning and final answer
    #[must_use]
    pub fn separate(&self, response: &str) -> SeparatedResponse {
        if let Some((spans, residual)) = extract_spans(response) {
            return SeparatedResponse {
                reasoning: spans.join("\n").trim().to_string(),
                final_answer: residual.trim().to_string(),
            };
        }

        if !self.config.heuristic_fallback {
            return SeparatedResponse {
                reasoning: String::new(),
                final_answer: response.trim().to_string(),
            };
        }

        self.classify_lines(response)
    }

    fn classify_lines(&self, response: &str) -> SeparatedResponse {
        let mut reasoning_lines = Vec::new();
        let mut result_lines = Vec::new();
        let mut in_reasoning = false;

        for line in response.split('\n') {
            let lowered = line.to_lowercase();
            let has = |keywords: &[String]| keywords.iter().any(|k| lowered.contains(k.as_str()));

            if result_lines.is_empty() && has(&self.config.reasoning_keywords) {
                in_reasoning = true;
                reasoning_lines.push(line);
            } else if has(&self.config.result_keywords) {
                in_reasoning = false;
                result_lines.push(line);
            } else if in_reasoning {
                reasoning_lines.push(line);
            } else {
                result_lines.push(line);
            }
        }

        if reasoning_lines.is_empty() {
            return SeparatedResponse {
                reasoning: String::new(),
                final_answer: response.trim().to_string(),
            };
        }

        let reasoning = reasoning_lines.join("\n").trim().to_string();
        let final_answer = result_lines.join("\n").trim().to_string();

        if final_answer.is_empty() {
            // Everything looked like reasoning; show it as the answer instead.
            return SeparatedResponse {
                reasoning: String::new(),
                final_answer: response.trim().to_string(),
            };
        }

        SeparatedResponse {
            reasoning,
            final_answer,
        }
    }
}

/// Separate with the default classifier
#[must_use]
pub fn separate(response: &str) -> SeparatedResponse {
    TextClassifier::default().separate(response)
}

/// Extract all `<think>` spans.
///
/// Returns `None` when no complete span exists, otherwise the captured
/// contents and the text with every span removed.
fn extract_spans(text: &str) -> Option<(Vec<&str>, String)> {
    let mut spans = Vec::new();
    let mut residual = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find(THINK_OPEN) {
        let after_open = &rest[open + THINK_OPEN.len()..];
        let Some(close) = after_open.find(THINK_CLOSE) else {
            break;
        };
        residual.push_str(&rest[..open]);
        spans.push(&after_open[..close]);
        rest = &after_open[close + THINK_CLOSE.len()..];
    }

    if spans.is_empty() {
        return None;
    }
    residual.push_str(rest);
    Some((spans, residual))
}

/// Split `text` on `delimiter`.
///
/// Every segment except the last gets the delimiter re-appended; empty
/// segments are dropped.
#[must_use]
pub fn split_sentences(text: &str, delimiter: char) -> Vec<String> {
    let parts: Vec<&str> = text.split(delimiter).collect();
    let last = parts.len().saturating_sub(1);

    parts
        .iter()
        .enumerate()
        .filter(|(_, part)| !part.trim().is_empty())
        .map(|(idx, part)| {
            if idx < last {
                format!("{part}{delimiter}")
            } else {
                (*part).to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_single_span() {
        let separated = separate("<think>checking</think>done.");
        assert_eq!(
            separated,
            SeparatedResponse {
                reasoning: "checking".to_string(),
                final_answer: "done.".to_string(),
            }
        );
    }

    #[test]
    fn test_multiple_spans_joined_by_newline() {
        let separated = separate("<think> a </think>one <think>b</think>two");
        assert_eq!(separated.reasoning, "a \nb");
        assert_eq!(separated.final_answer, "one two");
    }

    #[test]
    fn test_multiline_span() {
        let separated = separate("<think>line 1\nline 2</think>\n\nanswer");
        assert_eq!(separated.reasoning, "line 1\nline 2");
        assert_eq!(separated.final_answer, "answer");
    }

    #[test]
    fn test_unmatched_open_kept_verbatim() {
        let separated = separate("<think>a</think>x <think>never closed");
        assert_eq!(separated.reasoning, "a");
        assert_eq!(separated.final_answer, "x <think>never closed");

        let classifier = TextClassifier::new(ClassifierConfig {
            heuristic_fallback: false,
            ..ClassifierConfig::default()
        });
        let separated = classifier.separate("<think>dangling");
        assert_eq!(separated.reasoning, "");
        assert_eq!(separated.final_answer, "<think>dangling");
    }

    #[test]
    fn test_empty_span_still_counts_as_marker_mode() {
        let separated = separate("<think></think>首先看看\n答案");
        assert_eq!(separated.reasoning, "");
        assert_eq!(separated.final_answer, "首先看看\n答案");
    }

    #[test]
    fn test_heuristic_result_line() {
        let separated = separate("结果：成功。");
        assert_eq!(separated.reasoning, "");
        assert_eq!(separated.final_answer, "结果：成功。");
    }

    #[test]
    fn test_heuristic_reasoning_then_result() {
        let input = "首先分析视频\n它有两段\n结果：已生成 out.mp4\n然后可以播放";
        let separated = separate(input);
        assert_eq!(separated.reasoning, "首先分析视频\n它有两段");
        assert_eq!(separated.final_answer, "结果：已生成 out.mp4\n然后可以播放");
    }

    #[test]
    fn test_heuristic_is_partition() {
        let input = "intro line\nFirst, consider the input\nstill thinking\nResult: ok\ntail";
        let separated = separate(input);
        let mut lines: Vec<&str> = separated
            .reasoning
            .lines()
            .chain(separated.final_answer.lines())
            .collect();
        let mut expected: Vec<&str> = input.lines().collect();
        lines.sort_unstable();
        expected.sort_unstable();
        assert_eq!(lines, expected);
    }

    #[test]
    fn test_all_reasoning_falls_back_to_answer() {
        let separated = separate("首先分析\n考虑一下");
        assert_eq!(separated.reasoning, "");
        assert_eq!(separated.final_answer, "首先分析\n考虑一下");
    }

    #[test]
    fn test_crlf_answer_is_returned_verbatim() {
        let separated = separate("line one\r\nline two\r\n");
        assert_eq!(separated.reasoning, "");
        assert_eq!(separated.final_answer, "line one\r\nline two");
    }

    #[test]
    fn test_crlf_reasoning_then_result() {
        let separated = separate("首先分析\r\n结果：成功\r\n输出 out.mp4");
        assert_eq!(separated.reasoning, "首先分析");
        assert_eq!(separated.final_answer, "结果：成功\r\n输出 out.mp4");
    }

    #[test]
    fn test_heuristic_disabled() {
        let classifier = TextClassifier::new(ClassifierConfig {
            heuristic_fallback: false,
            ..ClassifierConfig::default()
        });
        let separated = classifier.separate("  首先分析\n结果 ok ");
        assert_eq!(separated.reasoning, "");
        assert_eq!(separated.final_answer, "首先分析\n结果 ok");
    }

    #[test]
    fn test_keywords_match_case_insensitively() {
        let classifier = TextClassifier::new(ClassifierConfig {
            reasoning_keywords: vec!["PLAN".to_string()],
            result_keywords: vec!["Answer".to_string()],
            ..ClassifierConfig::default()
        });
        let separated = classifier.separate("plan: trim\nANSWER: trimmed");
        assert_eq!(separated.reasoning, "plan: trim");
        assert_eq!(separated.final_answer, "ANSWER: trimmed");
    }

    #[test]
    fn test_separate_is_idempotent() {
        for input in [
            "<think>checking</think>done.",
            "首先分析\n结果：成功",
            "plain text",
            "",
        ] {
            let once = separate(input);
            let twice = separate(input);
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(separate(""), SeparatedResponse::default());
        assert_eq!(separate("   \n "), SeparatedResponse::default());
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("第一句。第二句。第三句", '。'),
            vec!["第一句。", "第二句。", "第三句"]
        );
        assert_eq!(split_sentences("结果：成功。", '。'), vec!["结果：成功。"]);
        assert_eq!(split_sentences("done.", '。'), vec!["done."]);
        assert_eq!(split_sentences("done.", '.'), vec!["done."]);
    }

    #[test]
    fn test_split_sentences_drops_empty_segments() {
        assert_eq!(split_sentences("a。。b", '。'), vec!["a。", "b"]);
        assert!(split_sentences("", '。').is_empty());
        assert!(split_sentences("。", '。').is_empty());
    }
}

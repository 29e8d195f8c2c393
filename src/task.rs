use serde::Deserialize;

/// What the dispatch loop works through: ordered target links, ordered quote
/// texts, how many quotes to post per link, and the randomized wait window
/// between iterations. The loop reads a fresh snapshot at the start of every
/// iteration, so edits made while running apply from the next iteration on.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskConfig {
    #[serde(default)]
    pub target_links: Vec<String>,
    #[serde(default)]
    pub quote_texts: Vec<String>,
    #[serde(default = "default_repeats")]
    pub repeats_per_link: u32,
    #[serde(default = "default_delay_min")]
    pub delay_min_s: u64,
    #[serde(default = "default_delay_max")]
    pub delay_max_s: u64,
}

fn default_repeats() -> u32 {
    1
}

// Wide default window to stay under backend rate limits.
fn default_delay_min() -> u64 {
    10
}

fn default_delay_max() -> u64 {
    30
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            target_links: Vec::new(),
            quote_texts: Vec::new(),
            repeats_per_link: default_repeats(),
            delay_min_s: default_delay_min(),
            delay_max_s: default_delay_max(),
        }
    }
}

impl TaskConfig {
    /// Replace the link list from pasted text, one link per line.
    pub fn set_links_from_text(&mut self, input: &str) {
        self.target_links = non_empty_lines(input);
    }

    /// Replace the quote text list from pasted text, one text per line.
    pub fn set_quotes_from_text(&mut self, input: &str) {
        self.quote_texts = non_empty_lines(input);
    }
}

fn non_empty_lines(input: &str) -> Vec<String> {
    input
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let task = TaskConfig::default();
        assert!(task.target_links.is_empty());
        assert!(task.quote_texts.is_empty());
        assert_eq!(task.repeats_per_link, 1);
        assert!(task.delay_min_s <= task.delay_max_s);
    }

    #[test]
    fn test_set_from_text_drops_blank_lines() {
        let mut task = TaskConfig::default();
        task.set_links_from_text("https://x.com/u/status/1\n\n  https://x.com/u/status/2  \n");
        assert_eq!(task.target_links.len(), 2);
        assert_eq!(task.target_links[1], "https://x.com/u/status/2");

        task.set_quotes_from_text("great point\n\ndisagree entirely");
        assert_eq!(task.quote_texts, vec!["great point", "disagree entirely"]);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let task: TaskConfig = toml::from_str("target_links = [\"https://x.com/u/status/1\"]").unwrap();
        assert_eq!(task.target_links.len(), 1);
        assert_eq!(task.repeats_per_link, 1);
        assert_eq!(task.delay_min_s, 10);
        assert_eq!(task.delay_max_s, 30);
    }
}

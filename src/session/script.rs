use std::time::Duration;

/// Average speaking pace used for duration estimates
pub const WORDS_PER_MINUTE: usize = 150;

/// Text for the presenter to read
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Script {
    text: String,
}

impl Script {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }

    /// True when there is nothing to say
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }

    /// Rough time to read the script aloud, rounded up to whole seconds
    pub fn estimated_duration(&self) -> Duration {
        let words = self.word_count();
        let secs = (words * 60).div_ceil(WORDS_PER_MINUTE);
        Duration::from_secs(secs as u64)
    }
}

impl From<String> for Script {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Script {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_script() {
        assert!(Script::new("   \n\t").is_blank());
        assert!(!Script::new(" hello ").is_blank());
    }

    #[test]
    fn test_word_count_ignores_extra_whitespace() {
        assert_eq!(Script::new("  one  two\nthree ").word_count(), 3);
    }

    #[test]
    fn test_estimated_duration_rounds_up() {
        // 150 words -> 60s, 151 words -> 61s (60.4 rounded up)
        let exact = Script::new(vec!["word"; 150].join(" "));
        let over = Script::new(vec!["word"; 151].join(" "));

        assert_eq!(exact.estimated_duration(), Duration::from_secs(60));
        assert_eq!(over.estimated_duration(), Duration::from_secs(61));
        assert_eq!(Script::default().estimated_duration(), Duration::ZERO);
    }
}

//! 输出截断策略
//!
//! 所有观察值共用一个字符上限，进度预览另有一个更短的上限；截断一律带可见标记。

/// 统一的输出上限（字符数，非字节）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLimits {
    /// 单个观察值（工具结果）的最大字符数
    pub max_output_chars: usize,
    /// 进度事件中的预览字符数
    pub preview_chars: usize,
}

impl Default for OutputLimits {
    fn default() -> Self {
        Self {
            max_output_chars: 50_000,
            preview_chars: 200,
        }
    }
}

impl OutputLimits {
    pub fn clip_output(&self, text: &str) -> String {
        truncate_marked(text, self.max_output_chars)
    }

    /// 预览：超长时截断并以 "..." 结尾
    pub fn preview(&self, text: &str) -> String {
        let mut chars = text.chars();
        let head: String = chars.by_ref().take(self.preview_chars).collect();
        if chars.next().is_some() {
            format!("{}...", head)
        } else {
            head
        }
    }
}

/// 超过 max 字符时保留前 max 个字符，并追加剩余字符数标记
pub fn truncate_marked(text: &str, max: usize) -> String {
    let total = text.chars().count();
    if total <= max {
        return text.to_string();
    }
    let head: String = text.chars().take(max).collect();
    format!("{}\n... [truncated: {} more chars]", head, total - max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_text_untouched() {
        assert_eq!(truncate_marked("abc", 3), "abc");
    }

    #[test]
    fn test_truncation_is_marked() {
        let out = truncate_marked("abcdef", 4);
        assert_eq!(out, "abcd\n... [truncated: 2 more chars]");
    }

    #[test]
    fn test_truncation_counts_chars_not_bytes() {
        let out = truncate_marked("蜜蜂蜜蜂", 2);
        assert!(out.starts_with("蜜蜂\n"));
        assert!(out.ends_with("[truncated: 2 more chars]"));
    }

    #[test]
    fn test_preview() {
        let limits = OutputLimits {
            max_output_chars: 100,
            preview_chars: 3,
        };
        assert_eq!(limits.preview("abcdef"), "abc...");
        assert_eq!(limits.preview("abc"), "abc");
    }
}

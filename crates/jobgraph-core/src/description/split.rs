//! Splitting a free-text job description into lines

/// Characters treated as list bullets at the start of a line
const BULLETS: [char; 3] = ['-', '•', '*'];

/// A cleaned description line and its 1-based position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitLine {
    pub sequence: u32,
    pub text: String,
}

/// Split `text` into cleaned, numbered lines.
///
/// Literal `\n` escapes count as line breaks. Each line is trimmed and its
/// leading run of bullets and whitespace removed; lines left empty (blank or
/// bullet-only) are dropped and the rest numbered contiguously from 1.
pub fn split_description(text: &str) -> Vec<SplitLine> {
    let normalized = text.replace("\\n", "\n");

    normalized
        .lines()
        .map(clean_line)
        .filter(|line| !line.is_empty())
        .zip(1u32..)
        .map(|(text, sequence)| SplitLine {
            sequence,
            text: text.to_string(),
        })
        .collect()
}

fn clean_line(line: &str) -> &str {
    line.trim()
        .trim_start_matches(|c: char| BULLETS.contains(&c) || c.is_whitespace())
        .trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(lines: &[SplitLine]) -> Vec<&str> {
        lines.iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_blank_and_bullet_only_lines_dropped() {
        let lines = split_description("- Built API\n\n* * *\nLed team");
        assert_eq!(
            lines,
            vec![
                SplitLine {
                    sequence: 1,
                    text: "Built API".to_string()
                },
                SplitLine {
                    sequence: 2,
                    text: "Led team".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_escaped_newlines_and_crlf() {
        let lines =
            split_description("Designed schema\\n• Migrated data\r\n  -- Cut costs by 30%  ");
        assert_eq!(texts(&lines), vec!["Designed schema", "Migrated data", "Cut costs by 30%"]);
        assert_eq!(lines[2].sequence, 3);
    }

    #[test]
    fn test_only_leading_bullets_stripped() {
        let lines = split_description("* Reduced p99 latency - from 900ms to 120ms *");
        assert_eq!(texts(&lines), vec!["Reduced p99 latency - from 900ms to 120ms *"]);
    }

    #[test]
    fn test_empty_description() {
        assert!(split_description("").is_empty());
        assert!(split_description("   \n - \n•").is_empty());
    }
}

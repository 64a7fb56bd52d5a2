//! Pronunciation accuracy scoring.
//!
//! A pure function of its two inputs using integer-only arithmetic.
//!
//! ```text
//!   d = levenshtein(fold(expected), fold(actual))
//!   L = max(len(expected), len(actual))          (in chars, after folding)
//!   accuracy = round((1 - d / L) * 100)          clamped to 0..=100
//! ```
//!
//! Two empty strings score 100. Lengths are counted in Unicode scalar values,
//! so Devanagari transcripts are compared character by character rather than
//! byte by byte.

/// Computes edit-distance based accuracy between a reference text and a
/// transcript.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimilarityScorer;

impl SimilarityScorer {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Score `actual` against `expected`, case-insensitively.
    ///
    /// Returns an integer percentage in `0..=100`. The function is symmetric
    /// in its arguments.
    pub fn score(&self, expected: &str, actual: &str) -> u8 {
        let expected: Vec<char> = fold(expected);
        let actual: Vec<char> = fold(actual);

        let longest = expected.len().max(actual.len());
        if longest == 0 {
            return 100;
        }

        let distance = levenshtein(&expected, &actual);
        // Levenshtein never exceeds the longer length, but the floor is kept
        // explicit so the result can't wrap.
        let matched = longest.saturating_sub(distance);

        // round(100 * matched / longest), half rounds up
        let percent = (200 * matched + longest) / (2 * longest);
        u8::try_from(percent.min(100)).unwrap_or(100)
    }
}

/// Levenshtein distance between two strings, case-insensitive.
pub fn edit_distance(a: &str, b: &str) -> usize {
    levenshtein(&fold(a), &fold(b))
}

fn fold(s: &str) -> Vec<char> {
    s.to_lowercase().chars().collect()
}

/// Classic O(n·m) dynamic-programming edit distance over a full table.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    let rows = a.len() + 1;
    let cols = b.len() + 1;
    let mut table = vec![vec![0usize; cols]; rows];

    for (i, row) in table.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, cell) in table[0].iter_mut().enumerate() {
        *cell = j;
    }

    for i in 1..rows {
        for j in 1..cols {
            let substitution = usize::from(a[i - 1] != b[j - 1]);
            table[i][j] = (table[i - 1][j] + 1)
                .min(table[i][j - 1] + 1)
                .min(table[i - 1][j - 1] + substitution);
        }
    }

    table[rows - 1][cols - 1]
}

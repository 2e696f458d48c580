//! Line-level differ, distinct from [`loam_store::diff`]'s object-tree
//! diff: this one produces `ndiff`-style output over the lines of two text
//! blobs, the raw material the Merge Kernel's diff-of-diffs step consumes.

/// One line of an `ndiff`-style diff. `Hint` lines (the `"? "` markers) are
/// produced by the classical differ to point at intra-line changes; the
/// merge kernel discards them, so callers that don't need them can filter
/// with [`DiffLine::is_hint`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Unchanged(String),
    Added(String),
    Removed(String),
    Hint(String),
}

impl DiffLine {
    pub fn is_hint(&self) -> bool {
        matches!(self, DiffLine::Hint(_))
    }

    pub fn text(&self) -> &str {
        match self {
            DiffLine::Unchanged(s) | DiffLine::Added(s) | DiffLine::Removed(s) | DiffLine::Hint(s) => s,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            DiffLine::Unchanged(_) => "  ",
            DiffLine::Added(_) => "+ ",
            DiffLine::Removed(_) => "- ",
            DiffLine::Hint(_) => "? ",
        }
    }
}

impl std::fmt::Display for DiffLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.prefix(), self.text())
    }
}

/// Split text on `\n`, discarding the trailing empty element a terminal
/// newline produces (so a file ending in `\n` doesn't diff as if it had one
/// more blank line than it does).
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines: Vec<&str> = text.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines
}

/// Classical line-level diff (Myers-style via longest-common-subsequence),
/// producing `ndiff` prefixes without the `"? "` hint lines — the merge
/// kernel and display code that want hints derive them separately; this
/// keeps the core diff deterministic and simple to test.
pub fn ndiff(a: &[&str], b: &[&str]) -> Vec<DiffLine> {
    let lcs = longest_common_subsequence(a, b);
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j, mut k) = (0usize, 0usize, 0usize);
    while i < a.len() || j < b.len() {
        if k < lcs.len() && i < a.len() && j < b.len() && a[i] == lcs[k] && b[j] == lcs[k] {
            out.push(DiffLine::Unchanged(a[i].to_string()));
            i += 1;
            j += 1;
            k += 1;
        } else if i < a.len() && (k >= lcs.len() || a[i] != lcs[k]) {
            out.push(DiffLine::Removed(a[i].to_string()));
            i += 1;
        } else if j < b.len() {
            out.push(DiffLine::Added(b[j].to_string()));
            j += 1;
        }
    }
    out
}

fn longest_common_subsequence<'a>(a: &[&'a str], b: &[&'a str]) -> Vec<&'a str> {
    let (n, m) = (a.len(), b.len());
    let mut dp = vec![vec![0u32; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }
    let mut out = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            out.push(a[i]);
            i += 1;
            j += 1;
        } else if dp[i + 1][j] >= dp[i][j + 1] {
            i += 1;
        } else {
            j += 1;
        }
    }
    out
}

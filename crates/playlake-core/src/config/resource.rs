//! Output directory conflict detection.
//!
//! Every table is written in destructive-overwrite mode, which deletes all
//! objects under the table's directory first. Two tables sharing a directory,
//! or one table nested under another, would wipe each other's output, so the
//! configured table paths are checked for overlap before anything runs.

use std::fmt;

/// A directory claimed exclusively by one output table.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct OutputDir(String);

impl OutputDir {
    /// Create an output directory with normalized path.
    ///
    /// Normalization strips leading and trailing slashes so that
    /// "song/song.parquet/" and "/song/song.parquet" are the same directory.
    ///
    /// # Examples
    ///
    /// ```
    /// use playlake_core::config::OutputDir;
    ///
    /// let a = OutputDir::new("song/song.parquet/");
    /// let b = OutputDir::new("/song/song.parquet");
    /// assert_eq!(a, b);
    /// ```
    pub fn new(path: &str) -> Self {
        Self(path.trim_matches('/').to_string())
    }

    /// The normalized relative path.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the two directories are equal or one contains the other.
    pub fn overlaps(&self, other: &OutputDir) -> bool {
        if self.0 == other.0 || self.0.is_empty() || other.0.is_empty() {
            return true;
        }
        let (short, long) = if self.0.len() < other.0.len() {
            (&self.0, &other.0)
        } else {
            (&other.0, &self.0)
        };
        long.starts_with(short.as_str()) && long.as_bytes()[short.len()] == b'/'
    }

    /// Find every pair of components whose directories overlap.
    ///
    /// Pairs are reported in declaration order.
    ///
    /// # Examples
    ///
    /// ```
    /// use playlake_core::config::OutputDir;
    ///
    /// let dirs = vec![
    ///     ("song", OutputDir::new("song/song.parquet")),
    ///     ("artist", OutputDir::new("artist/artist.parquet")),
    ///     ("nested", OutputDir::new("song/song.parquet/extra")),
    /// ];
    ///
    /// let conflicts = OutputDir::conflicts(&dirs);
    /// assert_eq!(conflicts, vec![("song", "nested")]);
    /// ```
    pub fn conflicts<K: Clone>(components: &[(K, OutputDir)]) -> Vec<(K, K)> {
        let mut found = Vec::new();
        for (i, (first_key, first_dir)) in components.iter().enumerate() {
            for (second_key, second_dir) in &components[i + 1..] {
                if first_dir.overlaps(second_dir) {
                    found.push((first_key.clone(), second_key.clone()));
                }
            }
        }
        found
    }
}

impl fmt::Display for OutputDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

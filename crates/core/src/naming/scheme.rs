//! Canonical file/folder/torrent name rendering.

/// Naming inputs for one release, captured from its [`crate::titles::Title`].
///
/// Two exclusive styles: dot-spacing collapses every whitespace run to a
/// single dot and drops the hyphen before the release group.
#[derive(Debug, Clone)]
pub struct NamingScheme {
    pub title: String,
    pub season: String,
    pub meta: String,
    pub release_group: String,
    pub dot_spacing: bool,
}

impl NamingScheme {
    /// Canonical file name for one episode.
    ///
    /// Dot-style: `{title}.S{season}E{episode}.{meta}{group}.{ext}`.
    /// Spaced-style: `{title} S{season}E{episode} {meta}-{group}.{ext}`.
    pub fn file_name(&self, episode: &str, ext: &str) -> String {
        if self.dot_spacing {
            dotify(&format!(
                "{}.S{}E{}.{}{}.{}",
                self.title, self.season, episode, self.meta, self.release_group, ext
            ))
        } else {
            format!(
                "{} S{}E{} {}-{}.{}",
                self.title, self.season, episode, self.meta, self.release_group, ext
            )
        }
    }

    /// Folder and torrent name for a full season.
    pub fn season_folder(&self) -> String {
        self.apply_spacing(format!(
            "{} S{} {}[{}]",
            self.title, self.season, self.meta, self.release_group
        ))
    }

    /// Folder and torrent name for a partial season covering the computed
    /// episode numbers; a single episode is named without range notation.
    pub fn episode_span_folder(&self, min_episode: i64, max_episode: i64) -> String {
        let name = if min_episode == max_episode {
            format!(
                "{} S{}E{:02} {}[{}]",
                self.title, self.season, min_episode, self.meta, self.release_group
            )
        } else {
            format!(
                "{} S{}E{:02}-E{:02} {}[{}]",
                self.title, self.season, min_episode, max_episode, self.meta, self.release_group
            )
        };
        self.apply_spacing(name)
    }

    /// Bare `{title} S{season}` form a partial-season folder is reverted to
    /// before its torrent is replaced.
    pub fn base_folder(&self) -> String {
        format!("{} S{}", self.title, self.season)
    }

    fn apply_spacing(&self, name: String) -> String {
        if self.dot_spacing {
            dotify(&name)
        } else {
            name
        }
    }
}

/// Collapse every whitespace run to a single dot.
fn dotify(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheme(dot_spacing: bool) -> NamingScheme {
        NamingScheme {
            title: "My Show".to_string(),
            season: "01".to_string(),
            meta: "WEB".to_string(),
            release_group: "RG".to_string(),
            dot_spacing,
        }
    }

    #[test]
    fn test_file_name_dot_style() {
        assert_eq!(
            scheme(true).file_name("01", "mkv"),
            "My.Show.S01E01.WEBRG.mkv"
        );
    }

    #[test]
    fn test_file_name_spaced_style() {
        assert_eq!(
            scheme(false).file_name("01", "mkv"),
            "My Show S01E01 WEB-RG.mkv"
        );
    }

    #[test]
    fn test_file_name_collapses_whitespace_runs() {
        let mut s = scheme(true);
        s.title = "My  Spaced   Show".to_string();
        assert_eq!(s.file_name("05", "mkv"), "My.Spaced.Show.S01E05.WEBRG.mkv");
    }

    #[test]
    fn test_season_folder() {
        assert_eq!(scheme(false).season_folder(), "My Show S01 WEB[RG]");
        assert_eq!(scheme(true).season_folder(), "My.Show.S01.WEB[RG]");
    }

    #[test]
    fn test_episode_span_folder_single() {
        assert_eq!(
            scheme(false).episode_span_folder(3, 3),
            "My Show S01E03 WEB[RG]"
        );
    }

    #[test]
    fn test_episode_span_folder_range() {
        assert_eq!(
            scheme(false).episode_span_folder(1, 4),
            "My Show S01E01-E04 WEB[RG]"
        );
        assert_eq!(
            scheme(true).episode_span_folder(1, 4),
            "My.Show.S01E01-E04.WEB[RG]"
        );
    }

    #[test]
    fn test_base_folder_is_never_dotted() {
        assert_eq!(scheme(true).base_folder(), "My Show S01");
    }
}

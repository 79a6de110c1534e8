/// Reserved domain names excluded from self-service registration.
///
/// Source format: one name per line, `#` starts a comment line, blank
/// lines ignored. Names compare case-insensitively and exactly.
use std::collections::HashSet;
use std::path::Path;

#[derive(Debug, Clone, Default)]
pub struct ReservedNames {
    names: HashSet<String>,
}

impl ReservedNames {
    pub fn parse(content: &str) -> Self {
        let names = content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_lowercase)
            .collect();
        Self { names }
    }

    pub fn load(path: &Path) -> std::io::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let reserved = Self::parse(&content);
        tracing::info!("Loaded {} reserved names from {}", reserved.len(), path.display());
        Ok(reserved)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(&name.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST: &str = "# system domains\ngoogle.com\n\n  Facebook.com  \r\n#example.org\nlocalhost\n";

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let reserved = ReservedNames::parse(LIST);
        assert_eq!(reserved.len(), 3);
        assert!(!reserved.contains("example.org"));
        assert!(!reserved.contains("#example.org"));
    }

    #[test]
    fn test_case_insensitive_exact_match() {
        let reserved = ReservedNames::parse(LIST);
        assert!(reserved.contains("google.com"));
        assert!(reserved.contains("Google.com"));
        assert!(reserved.contains("FACEBOOK.COM"));
        assert!(!reserved.contains("mail.google.com"));
        assert!(!reserved.contains("google.co"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dominios_reservados.txt");
        std::fs::write(&path, LIST).unwrap();
        let reserved = ReservedNames::load(&path).unwrap();
        assert!(reserved.contains("localhost"));

        assert!(ReservedNames::load(&dir.path().join("missing.txt")).is_err());
    }
}

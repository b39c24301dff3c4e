use anyhow::{bail, Context, Result};
use glob::Pattern;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["go", "js", "ts", "py", "java", "cpp", "rs", "kt"];

/// Finds the source files a command should send to the model.
pub struct FileScanner {
    patterns: Vec<(String, Option<Pattern>)>,
    max_file_size: u64,
}

impl FileScanner {
    /// `max_file_size` of 0 disables the size limit.
    pub fn new(ignore_patterns: &[String], max_file_size: u64) -> Self {
        let patterns = ignore_patterns
            .iter()
            .map(|raw| {
                let compiled = match Pattern::new(raw) {
                    Ok(pattern) => Some(pattern),
                    Err(err) => {
                        warn!("Invalid ignore pattern {:?}: {}", raw, err);
                        None
                    }
                };
                (raw.clone(), compiled)
            })
            .collect();

        Self {
            patterns,
            max_file_size,
        }
    }

    pub fn is_supported(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
    }

    pub fn should_ignore(&self, path: &Path) -> bool {
        let text = path.to_string_lossy().replace('\\', "/");
        let text = text.trim_start_matches("./");
        self.patterns.iter().any(|(raw, compiled)| {
            let is_glob = raw.contains(['*', '?', '[']);
            match compiled {
                Some(pattern) if is_glob => pattern.matches(text),
                // Plain patterns match anywhere in the path.
                _ => !raw.is_empty() && text.contains(raw.as_str()),
            }
        })
    }

    /// Supported files under `root`, or `root` itself when it is a file.
    pub fn find_supported_files(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let metadata = std::fs::metadata(root)
            .with_context(|| format!("Cannot access {}", root.display()))?;
        if metadata.is_file() {
            return Self::validate_single_file(root).map(|path| vec![path]);
        }

        let walker = WalkBuilder::new(root)
            .hidden(true)
            .ignore(true)
            .git_ignore(true)
            .git_exclude(true)
            .build();

        let mut files = Vec::new();
        for entry in walker.flatten() {
            let path = entry.path();
            if !path.is_file() || !Self::is_supported(path) {
                continue;
            }

            let relative = path.strip_prefix(root).unwrap_or(path);
            if self.should_ignore(relative) {
                debug!("Ignoring {}", path.display());
                continue;
            }
            if self.max_file_size > 0 {
                let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
                if size > self.max_file_size {
                    debug!("Skipping {} ({} bytes)", path.display(), size);
                    continue;
                }
            }

            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }

    pub fn validate_single_file(path: &Path) -> Result<PathBuf> {
        if !Self::is_supported(path) {
            bail!(
                "{} is not a supported file. Supported extensions: {}",
                path.display(),
                SUPPORTED_EXTENSIONS
                    .iter()
                    .map(|ext| format!(".{}", ext))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        Ok(path.to_path_buf())
    }

    /// Indented directory listing used as the input of project-level architecture analysis.
    pub fn project_structure(&self, root: &Path) -> Result<String> {
        let walker = WalkBuilder::new(root)
            .hidden(true)
            .git_ignore(true)
            .sort_by_file_name(|a, b| a.cmp(b))
            .build();

        let mut structure = String::from("Project structure:\n");
        for entry in walker {
            let entry = entry.context("Failed to walk project directory")?;
            let relative = match entry.path().strip_prefix(root) {
                Ok(relative) if !relative.as_os_str().is_empty() => relative,
                _ => continue,
            };
            if self.should_ignore(relative) {
                continue;
            }

            let depth = relative.components().count() - 1;
            let name = entry.file_name().to_string_lossy();
            let indent = "  ".repeat(depth);
            if entry.file_type().map_or(false, |t| t.is_dir()) {
                structure.push_str(&format!("{}📁 {}/\n", indent, name));
            } else {
                structure.push_str(&format!("{}📄 {}\n", indent, name));
            }
        }

        Ok(structure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/handlers")).unwrap();
        fs::create_dir_all(root.join("vendor/lib")).unwrap();
        fs::create_dir_all(root.join("web")).unwrap();
        fs::write(root.join("src/main.go"), "package main\n").unwrap();
        fs::write(root.join("src/handlers/user.go"), "package handlers\n").unwrap();
        fs::write(root.join("vendor/lib/dep.go"), "package lib\n").unwrap();
        fs::write(root.join("web/app.js"), "console.log(1)\n").unwrap();
        fs::write(root.join("web/app.min.js"), "x\n").unwrap();
        fs::write(root.join("README.md"), "# readme\n").unwrap();
        dir
    }

    fn default_patterns() -> Vec<String> {
        ["vendor/*", "node_modules/*", "*.min.js", "*.min.css"]
            .iter()
            .map(|p| p.to_string())
            .collect()
    }

    #[test]
    fn finds_supported_files_respecting_ignores() {
        let dir = tree();
        let scanner = FileScanner::new(&default_patterns(), 0);
        let files = scanner.find_supported_files(dir.path()).unwrap();
        let relative: Vec<String> = files
            .iter()
            .map(|f| {
                f.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(relative, vec!["src/handlers/user.go", "src/main.go", "web/app.js"]);
    }

    #[test]
    fn substring_patterns_match_like_plain_paths() {
        let scanner = FileScanner::new(&["generated".to_string()], 0);
        assert!(scanner.should_ignore(Path::new("src/generated/api.go")));
        assert!(!scanner.should_ignore(Path::new("src/api.go")));
    }

    #[test]
    fn size_limit_skips_large_files() {
        let dir = tree();
        fs::write(dir.path().join("src/big.rs"), "x".repeat(2048)).unwrap();
        let scanner = FileScanner::new(&default_patterns(), 1024);
        let files = scanner.find_supported_files(dir.path()).unwrap();
        assert!(!files.iter().any(|f| f.ends_with("big.rs")));
    }

    #[test]
    fn single_file_must_be_supported() {
        let dir = tree();
        let scanner = FileScanner::new(&[], 0);
        let files = scanner
            .find_supported_files(&dir.path().join("src/main.go"))
            .unwrap();
        assert_eq!(files.len(), 1);
        assert!(scanner
            .find_supported_files(&dir.path().join("README.md"))
            .is_err());
    }

    #[test]
    fn project_structure_is_indented() {
        let dir = tree();
        let scanner = FileScanner::new(&default_patterns(), 0);
        let structure = scanner.project_structure(dir.path()).unwrap();
        assert!(structure.starts_with("Project structure:\n"));
        assert!(structure.contains("📁 src/\n"));
        assert!(structure.contains("  📁 handlers/\n"));
        assert!(structure.contains("    📄 user.go\n"));
        assert!(!structure.contains("dep.go"));
        assert!(!structure.contains("app.min.js"));
    }
}

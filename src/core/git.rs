use anyhow::{Context, Result};
use git2::{Diff, DiffFormat, DiffOptions, Repository, Status, StatusOptions};
use std::path::Path;

pub struct GitIntegration {
    repo: Repository,
}

impl GitIntegration {
    pub fn new(repo_path: impl AsRef<Path>) -> Result<Self> {
        let repo = Repository::discover(repo_path).context("Failed to find git repository")?;
        Ok(Self { repo })
    }

    pub fn is_repository(path: impl AsRef<Path>) -> bool {
        Repository::discover(path).is_ok()
    }

    /// Working tree and index against HEAD, untracked files included.
    pub fn get_uncommitted_diff(&self) -> Result<String> {
        let mut diff_options = DiffOptions::new();
        diff_options
            .include_untracked(true)
            .recurse_untracked_dirs(true)
            .show_untracked_content(true);

        let head = self.repo.head()?.peel_to_tree()?;
        let diff = self
            .repo
            .diff_tree_to_workdir_with_index(Some(&head), Some(&mut diff_options))?;

        diff_to_string(&diff)
    }

    /// Changes from `from` to `to`, mirroring `git diff <from> <to>`.
    pub fn get_diff_between(&self, from: &str, to: &str) -> Result<String> {
        let from_tree = self
            .repo
            .revparse_single(from)
            .with_context(|| format!("Unknown revision: {}", from))?
            .peel_to_tree()?;
        let to_tree = self
            .repo
            .revparse_single(to)
            .with_context(|| format!("Unknown revision: {}", to))?
            .peel_to_tree()?;

        let diff = self
            .repo
            .diff_tree_to_tree(Some(&from_tree), Some(&to_tree), None)?;
        diff_to_string(&diff)
    }

    /// Changes introduced by a single commit. A root commit diffs against the empty tree.
    pub fn get_commit_diff(&self, commit: &str) -> Result<String> {
        let commit = self
            .repo
            .revparse_single(commit)
            .with_context(|| format!("Unknown commit: {}", commit))?
            .peel_to_commit()?;
        let tree = commit.tree()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None,
        };

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
        diff_to_string(&diff)
    }

    /// Porcelain-style status lines, e.g. ` M src/lib.rs` or `?? notes.txt`.
    pub fn get_status(&self) -> Result<String> {
        let mut options = StatusOptions::new();
        options.include_untracked(true).recurse_untracked_dirs(true);

        let statuses = self.repo.statuses(Some(&mut options))?;
        let mut output = String::new();
        for entry in statuses.iter() {
            let Some(path) = entry.path() else {
                continue;
            };
            output.push_str(&format!("{} {}\n", status_code(entry.status()), path));
        }

        Ok(output)
    }

    pub fn get_current_branch(&self) -> Result<String> {
        let head = self.repo.head()?;
        Ok(head.shorthand().unwrap_or("HEAD").to_string())
    }
}

/// Drops the per-file sections of a unified diff whose path `keep` rejects.
pub fn filter_diff_files(diff: &str, mut keep: impl FnMut(&str) -> bool) -> String {
    let mut output = String::with_capacity(diff.len());
    let mut keeping = true;
    for line in diff.split_inclusive('\n') {
        if let Some(header) = line.strip_prefix("diff --git ") {
            keeping = header
                .trim_end()
                .rsplit_once(" b/")
                .map_or(true, |(_, path)| keep(path));
        }
        if keeping {
            output.push_str(line);
        }
    }
    output
}

fn diff_to_string(diff: &Diff<'_>) -> Result<String> {
    let mut diff_text = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            diff_text.push(line.origin() as u8);
        }
        diff_text.extend_from_slice(line.content());
        true
    })?;

    Ok(String::from_utf8_lossy(&diff_text).to_string())
}

fn status_code(status: Status) -> String {
    if status.contains(Status::WT_NEW) {
        return "??".to_string();
    }

    let index = if status.contains(Status::INDEX_NEW) {
        'A'
    } else if status.contains(Status::INDEX_MODIFIED) {
        'M'
    } else if status.contains(Status::INDEX_DELETED) {
        'D'
    } else if status.contains(Status::INDEX_RENAMED) {
        'R'
    } else {
        ' '
    };
    let worktree = if status.contains(Status::WT_MODIFIED) {
        'M'
    } else if status.contains(Status::WT_DELETED) {
        'D'
    } else if status.contains(Status::WT_RENAMED) {
        'R'
    } else {
        ' '
    };

    format!("{}{}", index, worktree)
}

//! Compiled query filters shared by both query modes.

use std::collections::HashSet;

use super::QueryRequest;
use crate::error::{Result, VfsError};
use crate::media;

/// Filters compiled once per query.
#[derive(Debug)]
pub(crate) struct CompiledFilter {
    /// Lowercased substring required in the entry name.
    name_needle: Option<String>,
    /// Acceptable lowercase extensions, from `types` or a class shortcut.
    exts: Option<HashSet<String>>,
    /// Required tag ids, sorted.
    tags: Vec<u32>,
}

impl CompiledFilter {
    pub fn compile(req: &QueryRequest) -> Result<Self> {
        let exts = match (&req.class, req.types.is_empty()) {
            (Some(_), false) => {
                return Err(VfsError::InvalidArgument(
                    "types and class are mutually exclusive".to_string(),
                ))
            }
            (Some(class), true) => {
                let exts = media::class_extensions(class).ok_or_else(|| {
                    VfsError::InvalidArgument(format!("unknown media class: {class}"))
                })?;
                Some(exts.iter().map(|e| e.to_string()).collect())
            }
            (None, false) => Some(
                req.types
                    .iter()
                    .map(|t| t.trim_start_matches('.').to_ascii_lowercase())
                    .collect(),
            ),
            (None, true) => None,
        };
        let mut tags = req.tags.clone();
        tags.sort_unstable();
        tags.dedup();
        Ok(Self {
            name_needle: req.name.as_ref().map(|n| n.to_ascii_lowercase()),
            exts,
            tags,
        })
    }

    /// True when only files can possibly match (extension or tag filters).
    pub fn files_only_implied(&self) -> bool {
        self.exts.is_some() || !self.tags.is_empty()
    }

    fn matches_name(&self, name: &str) -> bool {
        match &self.name_needle {
            Some(needle) => name.to_ascii_lowercase().contains(needle),
            None => true,
        }
    }

    /// File filter: name substring, extension membership, tag superset.
    pub fn matches_file(&self, name: &str, tags: &[u32]) -> bool {
        if !self.matches_name(name) {
            return false;
        }
        if let Some(exts) = &self.exts {
            match media::extension_of(name) {
                Some(ext) => {
                    if !exts.contains(&ext) {
                        return false;
                    }
                }
                None => return false,
            }
        }
        self.tags.iter().all(|t| tags.contains(t))
    }

    /// Directory filter (hierarchical mode): name only, and nothing at all
    /// once a file-specific filter is present.
    pub fn matches_dir(&self, name: &str) -> bool {
        !self.files_only_implied() && self.matches_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req() -> QueryRequest {
        QueryRequest::default()
    }

    #[test]
    fn empty_filter_matches_everything() {
        let filter = CompiledFilter::compile(&req()).unwrap();
        assert!(filter.matches_file("anything.bin", &[]));
        assert!(filter.matches_dir("dir"));
    }

    #[test]
    fn name_match_is_case_insensitive() {
        let mut request = req();
        request.name = Some("Holiday".to_string());
        let filter = CompiledFilter::compile(&request).unwrap();
        assert!(filter.matches_file("HOLIDAY-2025.jpg", &[]));
        assert!(!filter.matches_file("workday.jpg", &[]));
    }

    #[test]
    fn class_expands_to_extension_set() {
        let mut request = req();
        request.class = Some("image".to_string());
        let filter = CompiledFilter::compile(&request).unwrap();
        assert!(filter.matches_file("a.JPG", &[]));
        assert!(!filter.matches_file("a.mp3", &[]));
        assert!(!filter.matches_file("noext", &[]));
        assert!(!filter.matches_dir("photos"));
    }

    #[test]
    fn class_and_types_conflict() {
        let mut request = req();
        request.class = Some("image".to_string());
        request.types = vec!["pdf".to_string()];
        assert!(CompiledFilter::compile(&request).is_err());
    }

    #[test]
    fn unknown_class_rejected() {
        let mut request = req();
        request.class = Some("holograms".to_string());
        assert!(CompiledFilter::compile(&request).is_err());
    }

    #[test]
    fn tags_are_superset_matched() {
        let mut request = req();
        request.tags = vec![3, 1];
        let filter = CompiledFilter::compile(&request).unwrap();
        assert!(filter.matches_file("a", &[1, 2, 3]));
        assert!(!filter.matches_file("a", &[1, 2]));
    }
}

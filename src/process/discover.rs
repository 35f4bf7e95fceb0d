// src/process/discover.rs

use anyhow::{Context, Result};
use glob::{glob, Pattern};
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

/// One sub-directory of the input root and the researcher files inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub name: String,
    pub files: Vec<PathBuf>,
}

/// List the batch directories under `root`, each with its `*.<extension>`
/// files, all in name order.
///
/// Only an unreadable `root` is an error; loose files in `root` and
/// unreadable entries inside a batch are skipped.
pub fn discover_batches(root: &Path, extension: &str) -> Result<Vec<Batch>> {
    let entries =
        fs::read_dir(root).with_context(|| format!("reading input directory {:?}", root))?;

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("listing input directory {:?}", root))?
            .path();
        if path.is_dir() {
            dirs.push(path);
        } else {
            debug!(path = %path.display(), "ignoring file outside batch directories");
        }
    }
    dirs.sort();

    let mut batches = Vec::with_capacity(dirs.len());
    for dir in dirs {
        let pattern = format!(
            "{}/*.{}",
            Pattern::escape(&dir.to_string_lossy()),
            Pattern::escape(extension)
        );
        let mut files = Vec::new();
        for entry in glob(&pattern).with_context(|| format!("invalid glob pattern {}", pattern))? {
            match entry {
                Ok(path) if path.is_file() => files.push(path),
                Ok(_) => {}
                Err(e) => warn!("cannot read batch entry: {}", e),
            }
        }
        files.sort();

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| dir.display().to_string());
        batches.push(Batch { name, files });
    }

    Ok(batches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_discover_batches_in_order() -> Result<()> {
        let tmp = tempdir()?;
        let root = tmp.path();
        for (dir, file) in [
            ("789", "b.xml"),
            ("123", "z.xml"),
            ("123", "a.xml"),
            ("123", "notes.txt"),
            ("456", "readme.md"),
        ] {
            fs::create_dir_all(root.join(dir))?;
            fs::write(root.join(dir).join(file), "<x/>")?;
        }
        fs::write(root.join("loose.xml"), "<x/>")?;
        fs::create_dir_all(root.join("123").join("nested.xml"))?;

        let batches = discover_batches(root, "xml")?;

        let names: Vec<&str> = batches.iter().map(|b| b.name.as_str()).collect();
        assert_eq!(names, vec!["123", "456", "789"]);
        assert_eq!(
            batches[0].files,
            vec![root.join("123").join("a.xml"), root.join("123").join("z.xml")]
        );
        assert!(batches[1].files.is_empty());
        assert_eq!(batches[2].files, vec![root.join("789").join("b.xml")]);
        Ok(())
    }

    #[test]
    fn test_missing_root_is_an_error() {
        let tmp = tempdir().unwrap();
        let err = discover_batches(&tmp.path().join("absent"), "xml").unwrap_err();
        assert!(format!("{:#}", err).contains("reading input directory"));
    }
}

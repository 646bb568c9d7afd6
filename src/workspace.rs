//! 沙箱工作区文件系统
//!
//! Workspace 绑定 root 目录（不存在则创建），所有相对路径经校验必须在 root 下（禁止 ../ 逃逸）；
//! 写入自动创建父目录，list_files 按扩展名递归扫描并跳过隐藏目录。

use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// 工作区错误
#[derive(Error, Debug)]
pub enum WorkspaceError {
    #[error("Path escape attempt: {0}")]
    PathEscape(String),

    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// 沙箱工作区：绑定根目录，读写均限制在根下
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root).map_err(|e| WorkspaceError::Io {
            path: root.display().to_string(),
            source: e,
        })?;
        let root = root.canonicalize().unwrap_or(root);
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 校验已存在路径在沙箱内（canonicalize 后前缀比对）
    fn resolve_existing(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        let path = path.trim_start_matches("./");
        let full = self.root.join(path);
        let canonical = full
            .canonicalize()
            .map_err(|_| WorkspaceError::NotFound(path.to_string()))?;
        if canonical.starts_with(&self.root) {
            Ok(canonical)
        } else {
            Err(WorkspaceError::PathEscape(path.to_string())) // 如 ../../etc/passwd
        }
    }

    /// 校验写入目标路径：拒绝绝对路径与 .. 组件（目标可以尚不存在）
    fn resolve_for_write(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        let path = path.trim_start_matches("./");
        let rel = Path::new(path);
        if rel.is_absolute()
            || rel
                .components()
                .any(|c| matches!(c, Component::ParentDir))
        {
            return Err(WorkspaceError::PathEscape(path.to_string()));
        }
        Ok(self.root.join(rel))
    }

    pub fn read_file(&self, path: &str) -> Result<String, WorkspaceError> {
        let resolved = self.resolve_existing(path)?;
        std::fs::read_to_string(&resolved).map_err(|e| WorkspaceError::Io {
            path: path.to_string(),
            source: e,
        })
    }

    /// 写文件，父目录不存在则自动创建
    pub fn write_file(&self, path: &str, content: &str) -> Result<(), WorkspaceError> {
        let resolved = self.resolve_for_write(path)?;
        if let Some(parent) = resolved.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WorkspaceError::Io {
                path: path.to_string(),
                source: e,
            })?;
        }
        std::fs::write(&resolved, content).map_err(|e| WorkspaceError::Io {
            path: path.to_string(),
            source: e,
        })
    }

    /// 递归列出指定扩展名的文件（相对路径，跳过隐藏目录，结果排序）
    pub fn list_files(&self, extensions: &[&str]) -> Vec<String> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|e| {
            // 根目录本身不过滤（临时目录名可能以 . 开头）
            e.depth() == 0
                || !e
                    .file_name()
                    .to_str()
                    .map(|n| n.starts_with('.'))
                    .unwrap_or(false)
        });
        for entry in walker.flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if extensions.iter().any(|ext| name.ends_with(ext)) {
                if let Ok(rel) = entry.path().strip_prefix(&self.root) {
                    files.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        files.sort();
        files
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_creates_parent_dirs_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        ws.write_file("src/deep/nested.rs", "fn main() {}").unwrap();
        assert_eq!(ws.read_file("src/deep/nested.rs").unwrap(), "fn main() {}");
    }

    #[test]
    fn test_rejects_parent_dir_escape_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        let err = ws.write_file("../outside.txt", "x").unwrap_err();
        assert!(matches!(err, WorkspaceError::PathEscape(_)));
    }

    #[test]
    fn test_rejects_escape_on_read() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path().join("inner")).unwrap();
        std::fs::write(dir.path().join("secret.txt"), "s").unwrap();
        let err = ws.read_file("../secret.txt").unwrap_err();
        assert!(matches!(
            err,
            WorkspaceError::PathEscape(_) | WorkspaceError::NotFound(_)
        ));
    }

    #[test]
    fn test_list_files_filters_extensions_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path()).unwrap();
        ws.write_file("a.rs", "").unwrap();
        ws.write_file("b.txt", "").unwrap();
        ws.write_file("sub/c.rs", "").unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        std::fs::write(dir.path().join(".git/d.rs"), "").unwrap();

        let files = ws.list_files(&[".rs"]);
        assert_eq!(files, vec!["a.rs".to_string(), "sub/c.rs".to_string()]);
    }
}

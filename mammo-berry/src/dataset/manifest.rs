//! 清单文件: 每行一个图像路径的 UTF-8 文本.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::{Error, Result};

/// 有序的图像路径列表.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Manifest {
    entries: Vec<PathBuf>,
}

impl Manifest {
    /// 读取并解析 `path` 处的清单. 文件不存在时返回 [`Error::MissingManifest`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Manifest> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::MissingManifest(path.to_owned()));
        }
        Ok(Self::parse(&fs::read_to_string(path)?))
    }

    /// 解析清单文本. 每行去除首尾空白, 空行被忽略.
    pub fn parse(text: &str) -> Manifest {
        text.lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(PathBuf::from)
            .collect()
    }

    /// 全部条目.
    #[inline]
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// 条目个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 是否没有任何条目.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按顺序迭代条目.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, PathBuf> {
        self.entries.iter()
    }

    /// 写入 `path`, 每行一个路径. 会创建父目录, 覆盖已有文件.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut text = String::new();
        for entry in self.entries.iter() {
            text.push_str(&entry.to_string_lossy());
            text.push('\n');
        }
        fs::write(path, text)?;
        Ok(())
    }
}

impl FromIterator<PathBuf> for Manifest {
    fn from_iter<T: IntoIterator<Item = PathBuf>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a PathBuf;
    type IntoIter = std::slice::Iter<'a, PathBuf>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// 求 `path` 相对于 `root` 的路径.
///
/// 忽略 `.` 等非普通路径分量后再比较前缀. 若 `path` 不在 `root` 之下,
/// 则返回 `path` 自身的普通分量, 因此结果永远不会跳出以它为后缀的输出目录.
pub fn relative_to_root<P: AsRef<Path>, Q: AsRef<Path>>(path: P, root: Q) -> PathBuf {
    let (path, root) = (path.as_ref(), root.as_ref());
    if let Ok(rel) = path.strip_prefix(root) {
        return rel.to_owned();
    }
    let path = normal_components(path);
    match path.strip_prefix(normal_components(root)) {
        Ok(rel) => rel.to_owned(),
        Err(_) => path,
    }
}

#[inline]
fn normal_components(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect()
}

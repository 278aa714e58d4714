//! 病例描述 CSV 与图像文件的标签关联.
//!
//! CSV 中每行带有病理结论 (`pathology` 等列) 和若干路径列. 路径列中包含
//! 病人 ID (`P_00001`) 与 DICOM UID (`1.3.6.1.4.1.9590...`), 用于和图像文件名/目录匹配.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::{copy_if_absent, ClassLabel};
use crate::consts::has_image_extension;
use crate::{Error, Result};

static PATIENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)(P_\d{5})").unwrap());
static UID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"1\.3\.6(?:\.\d+){5,}").unwrap());

/// 依次尝试的标签列.
const LABEL_COLUMNS: [&str; 4] = ["pathology", "Pathology", "label", "Label"];

/// 提取 `s` 中第一个病人 ID, 统一为大写.
pub fn patient_id(s: &str) -> Option<String> {
    PATIENT_RE.find(s).map(|m| m.as_str().to_ascii_uppercase())
}

/// 迭代 `s` 中所有 DICOM UID, 按出现顺序.
pub fn uids(s: &str) -> impl Iterator<Item = &str> {
    UID_RE.find_iter(s).map(|m| m.as_str())
}

/// 病人 ID / DICOM UID -> 类别.
///
/// 同一个键同时出现良性和恶性记录时, 取恶性.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct LabelIndex {
    patients: BTreeMap<String, ClassLabel>,
    uids: BTreeMap<String, ClassLabel>,
    uid_patients: BTreeMap<String, String>,
}

impl LabelIndex {
    /// 空索引.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 读取全部 CSV 文件并合并.
    ///
    /// 不存在的文件被记录并跳过; 若没有任何一个文件存在, 返回 [`Error::MissingCsv`].
    pub fn from_csv_files<P, I>(paths: I) -> Result<LabelIndex>
    where
        P: AsRef<Path>,
        I: IntoIterator<Item = P>,
    {
        let mut index = Self::new();
        let mut found = false;
        let mut missing = PathBuf::new();
        for path in paths {
            let path = path.as_ref();
            if !path.is_file() {
                warn!("missing csv: {}", path.display());
                missing = path.to_owned();
                continue;
            }
            found = true;
            let rows = index.merge_csv(fs::File::open(path)?)?;
            info!("{}: {rows} labelled rows", path.display());
        }
        if found {
            Ok(index)
        } else {
            Err(Error::MissingCsv(missing))
        }
    }

    /// 从任意 CSV 数据源合并标签. 返回带有效标签的行数.
    ///
    /// 标签取 `pathology`, `Pathology`, `label`, `Label` 中第一个值为
    /// `benign`/`malignant` (大小写不敏感) 的列; 没有这样的列的行被丢弃.
    /// 所有列名包含 `path` 的列都参与 ID 提取.
    pub fn merge_csv<R: io::Read>(&mut self, reader: R) -> Result<usize> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);
        let headers = rdr.headers()?.clone();
        let label_cols: Vec<usize> = LABEL_COLUMNS
            .iter()
            .filter_map(|name| headers.iter().position(|h| h.trim() == *name))
            .collect();
        let path_cols: Vec<usize> = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| h.to_ascii_lowercase().contains("path"))
            .map(|(i, _)| i)
            .collect();

        let mut rows = 0;
        for record in rdr.records() {
            let record = record?;
            let Some(label) = label_cols
                .iter()
                .filter_map(|&i| record.get(i))
                .find_map(ClassLabel::parse)
            else {
                continue;
            };
            let text = path_cols
                .iter()
                .filter_map(|&i| record.get(i))
                .collect::<Vec<_>>()
                .join(" ");
            let pid = patient_id(&text);
            for uid in uids(&text) {
                insert(&mut self.uids, uid.to_owned(), label);
                if let Some(pid) = &pid {
                    self.uid_patients.insert(uid.to_owned(), pid.clone());
                }
            }
            if let Some(pid) = pid {
                insert(&mut self.patients, pid, label);
            }
            rows += 1;
        }
        Ok(rows)
    }

    /// 病人 `pid` 的类别.
    #[inline]
    pub fn patient(&self, pid: &str) -> Option<ClassLabel> {
        self.patients.get(pid).copied()
    }

    /// DICOM UID 的类别.
    #[inline]
    pub fn uid(&self, uid: &str) -> Option<ClassLabel> {
        self.uids.get(uid).copied()
    }

    /// DICOM UID 所属的病人 ID.
    #[inline]
    pub fn patient_of_uid(&self, uid: &str) -> Option<&str> {
        self.uid_patients.get(uid).map(String::as_str)
    }

    /// 已知病人个数.
    #[inline]
    pub fn patient_count(&self) -> usize {
        self.patients.len()
    }

    /// 已知 UID 个数.
    #[inline]
    pub fn uid_count(&self) -> usize {
        self.uids.len()
    }

    /// 为图像路径查找标签, 同时返回匹配到的键.
    ///
    /// 先按 UID 匹配, 路径中靠后的 UID (更具体的序列目录) 优先; 没有 UID 命中时
    /// 再按病人 ID 匹配.
    pub fn lookup<'a>(&self, path: &'a str) -> Option<(&'a str, ClassLabel)> {
        let by_uid = uids(path)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .find_map(|u| self.uid(u).map(|l| (u, l)));
        by_uid.or_else(|| {
            let m = PATIENT_RE.find(path)?;
            let label = self.patient(&m.as_str().to_ascii_uppercase())?;
            Some((m.as_str(), label))
        })
    }

    /// 为图像路径查找标签. 见 [`LabelIndex::lookup`].
    #[inline]
    pub fn label_for_path<P: AsRef<Path>>(&self, path: P) -> Option<ClassLabel> {
        let path = path.as_ref().to_string_lossy();
        self.lookup(&path).map(|(_, l)| l)
    }
}

#[inline]
fn insert(map: &mut BTreeMap<String, ClassLabel>, key: String, label: ClassLabel) {
    map.entry(key)
        .and_modify(|l| *l = (*l).max(label))
        .or_insert(label);
}

/// [`sort_by_labels`] 的统计结果.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct SortReport {
    /// 每个类别新复制的文件数.
    pub copied: BTreeMap<ClassLabel, usize>,

    /// 目标已存在而未复制的文件数.
    pub existing: usize,

    /// 没有匹配到标签的图像数.
    pub unmatched: usize,
}

/// 遍历原始图像目录 `raw_root`, 按 `labels` 把图像复制到 `{out_root}/{benign,malignant}`.
///
/// 目标文件名为 `{匹配到的键}_{原文件名}`, 以避免不同序列下的同名文件冲突.
/// 按 UID 匹配且 CSV 中记录了其病人时, 再加上病人 ID 前缀 (`{病人}_{UID}_{原文件名}`),
/// 使 [`PatientIndex`](super::PatientIndex) 能按病人分组.
/// 已存在的目标文件不会被覆盖.
pub fn sort_by_labels<P: AsRef<Path>, Q: AsRef<Path>>(
    raw_root: P,
    labels: &LabelIndex,
    out_root: Q,
) -> Result<SortReport> {
    let (raw_root, out_root) = (raw_root.as_ref(), out_root.as_ref());
    let mut files = vec![];
    collect_images(raw_root, &mut files)?;

    let mut report = SortReport::default();
    for src in files {
        let rel = src.strip_prefix(raw_root).unwrap_or(&src).to_string_lossy();
        let (Some((key, label)), Some(name)) = (labels.lookup(&rel), src.file_name()) else {
            debug!("no label for {}", src.display());
            report.unmatched += 1;
            continue;
        };
        let prefix = match labels.patient_of_uid(key) {
            Some(pid) => format!("{pid}_{key}"),
            None => key.to_ascii_uppercase(),
        };
        let dst = out_root
            .join(label.as_str())
            .join(format!("{prefix}_{}", name.to_string_lossy()));
        if copy_if_absent(&src, &dst)? {
            *report.copied.entry(label).or_default() += 1;
        } else {
            report.existing += 1;
        }
    }
    info!(
        "sorted {} images into {} ({} unmatched)",
        report.copied.values().sum::<usize>(),
        out_root.display(),
        report.unmatched
    );
    Ok(report)
}

/// 递归收集 `dir` 下的图像文件, 按路径排序.
fn collect_images(dir: &Path, out: &mut Vec<PathBuf>) -> io::Result<()> {
    let mut entries: Vec<PathBuf> = fs::read_dir(dir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<io::Result<_>>()?;
    entries.sort();
    for path in entries {
        if path.is_dir() {
            collect_images(&path, out)?;
        } else if has_image_extension(&path) {
            out.push(path);
        }
    }
    Ok(())
}

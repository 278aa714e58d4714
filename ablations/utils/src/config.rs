//! 实验配置 (TOML).

use mammo_berry::consts::{DEFAULT_LISTS_DIR, DEFAULT_SOURCE_ROOT};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::loader::{default_data_dir, DATA_DIR_ENV};

/// 配置文件路径环境变量.
pub const CONFIG_ENV: &str = "MAMMO_EXPERIMENT_CONFIG";

/// 流水线名称环境变量. 覆盖配置文件中的 `pipeline`.
pub const PIPELINE_ENV: &str = "MAMMO_PIPELINE";

/// 未指定配置文件时尝试读取的默认路径.
pub const DEFAULT_CONFIG_FILE: &str = "experiment.toml";

/// 配置加载错误.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// 显式指定的配置文件不存在.
    #[error("config file {0:?} does not exist")]
    Missing(PathBuf),

    /// 读写失败.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML 解析失败.
    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    /// TOML 序列化失败.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),
}

/// 一次实验的全部配置. 所有字段都有默认值, 配置文件只需给出需要修改的项.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// 实验名称. 缺省为 `exp_{pipeline}`.
    pub name: Option<String>,

    /// 流水线名称, 必须是注册表中的键.
    pub pipeline: String,

    /// 六个标准清单所在目录.
    pub lists_dir: PathBuf,

    /// 清单中路径共同的根目录.
    pub manifest_root: PathBuf,

    /// 数据根目录. 划分目录树位于 `{data_root}/{train,val,test}`. 缺省见 [`default_data_dir`].
    pub data_root: PathBuf,

    /// 增强结果根目录. 缺省为 `{data_root}/enhanced`.
    pub enhanced_root: Option<PathBuf>,

    /// 实验归档根目录.
    pub experiments_dir: PathBuf,

    /// 重建划分前是否删除旧的划分目录树.
    pub clear_splits: bool,

    /// 训练命令 (由 shell 执行). 为空时跳过训练.
    pub train_cmd: Option<String>,

    /// 评估命令 (由 shell 执行). 为空时跳过评估.
    pub eval_cmd: Option<String>,

    /// 训练命令写出模型的位置. 若存在, 训练结束后移动到实验归档目录.
    pub model_artifact: Option<PathBuf>,

    /// 评估命令写出报告的目录. 其中的标准报告文件会被移动到实验归档目录.
    pub results_dir: PathBuf,

    /// 训练/评估时的输入尺寸 `(高, 宽)`. 只做记录并传给外部命令.
    pub img_size: [u32; 2],

    /// 训练/评估是否使用灰度输入. 只做记录并传给外部命令.
    pub gray: bool,

    /// 消融模式: 对所有流水线计时, 而不是运行完整实验.
    pub ablation: bool,

    /// 日志级别.
    pub log_level: String,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            name: None,
            pipeline: "clahe".to_string(),
            lists_dir: PathBuf::from(DEFAULT_LISTS_DIR),
            manifest_root: PathBuf::from(DEFAULT_SOURCE_ROOT),
            data_root: default_data_dir(),
            enhanced_root: None,
            experiments_dir: PathBuf::from("experiments"),
            clear_splits: true,
            train_cmd: None,
            eval_cmd: None,
            model_artifact: None,
            results_dir: PathBuf::from("results"),
            img_size: [128, 128],
            gray: false,
            ablation: false,
            log_level: "info".to_string(),
        }
    }
}

impl ExperimentConfig {
    /// 解析 TOML 文本.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    /// 读取并解析 `path` 处的配置文件.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::Missing(path.to_owned()));
        }
        Self::from_toml_str(&fs::read_to_string(path)?)
    }

    /// 加载配置.
    ///
    /// 1. 若 `$MAMMO_EXPERIMENT_CONFIG` 非空, 读取其指向的文件 (必须存在);
    /// 2. 否则若 `./experiment.toml` 存在, 读取之;
    /// 3. 否则使用默认配置.
    ///
    /// 之后再应用 `$MAMMO_PIPELINE` 与 `$MAMMO_DATA_DIR` 覆盖.
    pub fn load() -> Result<Self, ConfigError> {
        let config = match env::var_os(CONFIG_ENV).filter(|p| !p.is_empty()) {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };
        Ok(config.with_overrides(|k| env::var(k).ok()))
    }

    /// 以 `var` 查询环境变量并应用覆盖. 空值被忽略.
    pub fn with_overrides<F: Fn(&str) -> Option<String>>(mut self, var: F) -> Self {
        let var = |k| var(k).filter(|v| !v.trim().is_empty());
        if let Some(p) = var(PIPELINE_ENV) {
            self.pipeline = p.trim().to_string();
        }
        if let Some(d) = var(DATA_DIR_ENV) {
            self.data_root = PathBuf::from(d);
        }
        self
    }

    /// 实验名称.
    pub fn name(&self) -> String {
        match &self.name {
            Some(n) if !n.is_empty() => n.clone(),
            _ => format!("exp_{}", self.pipeline),
        }
    }

    /// 增强结果根目录.
    pub fn enhanced_root(&self) -> PathBuf {
        self.enhanced_root
            .clone()
            .unwrap_or_else(|| self.data_root.join("enhanced"))
    }

    /// 本次实验的归档目录 `{experiments_dir}/{name}`.
    pub fn experiment_dir(&self) -> PathBuf {
        self.experiments_dir.join(self.name())
    }

    /// 序列化为 TOML.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let c = ExperimentConfig::from_toml_str("").unwrap();
        assert_eq!(c, ExperimentConfig::default());
        assert_eq!(c.name(), "exp_clahe");
        assert_eq!(c.enhanced_root(), Path::new("data/enhanced"));
        assert_eq!(c.experiment_dir(), Path::new("experiments/exp_clahe"));
        assert_eq!(c.lists_dir, Path::new("experiments/exp0_baseline/config"));
    }

    #[test]
    fn test_parse_partial() {
        let c = ExperimentConfig::from_toml_str(
            r#"
            name = "exp3_wiener"
            pipeline = "wiener"
            data_root = "/mnt/ddsm"
            train_cmd = "python src/models/train.py"
            img_size = [224, 224]
            "#,
        )
        .unwrap();
        assert_eq!(c.name(), "exp3_wiener");
        assert_eq!(c.enhanced_root(), Path::new("/mnt/ddsm/enhanced"));
        assert_eq!(c.img_size, [224, 224]);
        assert!(c.eval_cmd.is_none());
        assert_eq!(c.results_dir, Path::new("results"));
        assert!(c.clear_splits);

        assert!(ExperimentConfig::from_toml_str("pipeline = 3").is_err());
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [(PIPELINE_ENV, " nlm "), (DATA_DIR_ENV, "")].into();
        let c = ExperimentConfig::default().with_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.pipeline, "nlm");
        assert_eq!(c.data_root, default_data_dir());
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.toml");
        assert!(matches!(
            ExperimentConfig::from_file(&path),
            Err(ConfigError::Missing(_))
        ));

        let c = ExperimentConfig {
            pipeline: "gamma_08".to_string(),
            ablation: true,
            ..Default::default()
        };
        fs::write(&path, c.to_toml_string().unwrap()).unwrap();
        assert_eq!(ExperimentConfig::from_file(&path).unwrap(), c);
    }
}

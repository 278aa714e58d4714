//! 程序运行函数.

use crate::profile::Profile;
use crate::result::AblationResult;
use log::{info, warn};
use mammo_berry::dataset::{clear_splits, rebuild_splits_with_root, relative_to_root};
use mammo_berry::prelude::{
    dataset, read_image, Error, GrayImage, ImgWrite, Manifest, Pipeline, PipelineName,
};
use serde::Serialize;
use std::fs;
use std::io;
use std::panic;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};
use utils::config::{ConfigError, ExperimentConfig};
use utils::loader;

/// 实验记录文件名.
pub const RECORD_FILE: &str = "record.toml";

/// 评估命令写出的标准报告文件. 存在时被移动到 `{实验目录}/results`.
pub const RESULT_FILES: [&str; 4] = [
    "classification_report.txt",
    "confusion_matrix.csv",
    "confusion_matrix.png",
    "roc_curve.png",
];

/// 实验目录下预先创建的子目录.
const EXPERIMENT_SUBDIRS: [&str; 4] = ["models", "results", "logs", "figs"];

/// 运行错误.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Berry(#[from] mammo_berry::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// 外部命令以非零状态退出 (或被信号终止, 此时 `code` 为 `None`).
    #[error("`{cmd}` exited with status {code:?}")]
    Command { cmd: String, code: Option<i32> },

    #[error(transparent)]
    Io(#[from] io::Error),

    /// 清单目录下没有任何可用的清单.
    #[error("no usable manifest under {0:?}")]
    NoManifest(PathBuf),
}

/// 一次实验的归档记录.
#[derive(Debug, Serialize)]
pub struct ExperimentRecord {
    pub name: String,
    pub pipeline: String,

    /// 完成时间 (UNIX 秒).
    pub timestamp: u64,
    pub img_size: [u32; 2],
    pub gray: bool,

    /// 增强结果目录 `{enhanced_root}/{pipeline}`.
    pub enhanced_dir: PathBuf,
    pub written: usize,
    pub skipped: usize,

    /// 无法处理的清单, 如 `"val_malignant"`.
    pub failed_manifests: Vec<String>,
    pub copied: usize,
    pub existing: usize,
    pub missing: usize,
    pub trained: bool,
    pub evaluated: bool,

    /// 归档后的模型路径.
    pub model: Option<PathBuf>,

    /// 归档的报告文件名.
    pub archived: Vec<String>,
}

/// 运行一次完整实验:
///
/// 1. 校验流水线名称;
/// 2. 按基线清单生成增强数据集;
/// 3. 用同样的文件 (增强后) 重建 train/val/test;
/// 4. 运行训练与评估命令 (若配置);
/// 5. 归档模型, 报告和实验记录.
///
/// 未知的流水线名称在任何文件操作之前返回错误. 任一外部命令失败时立即停止.
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentRecord, RunError> {
    let pipeline: PipelineName = config.pipeline.trim().parse()?;
    let name = config.name();
    let exp_dir = config.experiment_dir();
    for sub in EXPERIMENT_SUBDIRS {
        fs::create_dir_all(exp_dir.join(sub))?;
    }
    info!("experiment `{name}` with pipeline `{pipeline}`");

    let batch = dataset::apply_pipeline_to_lists(
        &config.lists_dir,
        &config.manifest_root,
        config.enhanced_root(),
        pipeline.as_str(),
    )?;

    if config.clear_splits {
        clear_splits(&config.data_root)?;
    }
    let rebuilt = rebuild_splits_with_root(
        &config.lists_dir,
        &config.manifest_root,
        batch.output_root(),
        &config.data_root,
    )?;

    let model_path = exp_dir.join("models").join(format!("{name}.h5"));
    let envs = command_envs(config, pipeline, &model_path);

    let trained = match config.train_cmd.as_deref() {
        Some(cmd) => {
            run_command(cmd, &envs)?;
            if let Some(artifact) = config.model_artifact.as_ref().filter(|p| p.is_file()) {
                fs::rename(artifact, &model_path)?;
                info!("moved {} -> {}", artifact.display(), model_path.display());
            }
            true
        }
        None => false,
    };
    let model = model_path.is_file().then_some(model_path);

    let mut archived = vec![];
    let evaluated = match config.eval_cmd.as_deref() {
        Some(cmd) => {
            run_command(cmd, &envs)?;
            archived = archive_results(&config.results_dir, &exp_dir.join("results"))?;
            true
        }
        None => false,
    };

    let record = ExperimentRecord {
        name,
        pipeline: pipeline.to_string(),
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_secs()),
        img_size: config.img_size,
        gray: config.gray,
        enhanced_dir: batch.output_root().to_owned(),
        written: batch.total_written(),
        skipped: batch.total_skipped(),
        failed_manifests: batch.failed().iter().map(|(k, _)| k.to_string()).collect(),
        copied: rebuilt.copied,
        existing: rebuilt.existing,
        missing: rebuilt.missing,
        trained,
        evaluated,
        model,
        archived,
    };
    let text = toml::to_string_pretty(&record).map_err(ConfigError::from)?;
    fs::write(exp_dir.join(RECORD_FILE), text)?;
    fs::write(exp_dir.join("config.toml"), config.to_toml_string()?)?;

    info!("finished `{}` -> {}", record.name, exp_dir.display());
    Ok(record)
}

/// 传给外部训练/评估命令的环境变量.
fn command_envs(
    config: &ExperimentConfig,
    pipeline: PipelineName,
    model_path: &Path,
) -> Vec<(&'static str, String)> {
    let [h, w] = config.img_size;
    vec![
        ("MAMMO_EXPERIMENT", config.name()),
        ("MAMMO_PIPELINE", pipeline.to_string()),
        (loader::DATA_DIR_ENV, config.data_root.display().to_string()),
        (
            "MAMMO_TEST_DIR",
            config.data_root.join("test").display().to_string(),
        ),
        ("MAMMO_MODEL_PATH", model_path.display().to_string()),
        ("MAMMO_IMG_SIZE", format!("{h} {w}")),
        ("MAMMO_GRAY", u8::from(config.gray).to_string()),
    ]
}

/// 由 shell 执行 `cmd`. 非零退出状态视为错误.
fn run_command(cmd: &str, envs: &[(&'static str, String)]) -> Result<(), RunError> {
    info!(">> {cmd}");
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.args(["/C", cmd]);
        c
    } else {
        let mut c = Command::new("sh");
        c.args(["-c", cmd]);
        c
    };
    let status = command
        .envs(envs.iter().map(|(k, v)| (*k, v.as_str())))
        .status()?;
    if status.success() {
        Ok(())
    } else {
        Err(RunError::Command {
            cmd: cmd.to_string(),
            code: status.code(),
        })
    }
}

/// 把 `results_dir` 中存在的标准报告文件移动到 `dst_dir`. 返回被移动的文件名.
fn archive_results(results_dir: &Path, dst_dir: &Path) -> io::Result<Vec<String>> {
    let mut moved = vec![];
    for f in RESULT_FILES {
        let src = results_dir.join(f);
        if src.is_file() {
            fs::rename(&src, dst_dir.join(f))?;
            moved.push(f.to_string());
        }
    }
    Ok(moved)
}

/// 在一个清单上运行单个流水线并计时. 结果写到 `output_root` 下, 保持相对路径.
pub fn profile_pipeline(
    name: PipelineName,
    manifest: &Manifest,
    source_root: &Path,
    output_root: &Path,
) -> Profile {
    let pipeline = Pipeline::from(name);
    let mut profile = Profile::new();
    info!("{name}: {} images...", manifest.len());

    for src in manifest.iter() {
        let raw = match read_image(src) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("{name}: {e}");
                profile.count_skipped();
                continue;
            }
        };

        profile.apply_start();
        let out = pipeline.apply(&raw);
        profile.apply_elapsed();

        let dst = output_root.join(relative_to_root(src, source_root));
        let saved = match out {
            Some(img) => save_to(&img, &dst),
            None => Err(Error::EmptyImage(src.to_owned())),
        };
        match saved {
            Ok(()) => profile.count_written(),
            Err(e) => {
                warn!("{name}: {e}");
                profile.count_skipped();
            }
        }
    }
    profile.finish()
}

fn save_to(img: &GrayImage, dst: &Path) -> mammo_berry::Result<()> {
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent)?;
    }
    img.save(dst)?;
    Ok(())
}

/// 消融实验: 在第一个可用清单上, 以独立线程并行运行全部流水线并计时.
///
/// 结果写到 `{enhanced_root}/ablation/{pipeline}`.
pub fn run_ablation(config: &ExperimentConfig) -> Result<AblationResult, RunError> {
    let (key, manifest) = loader::first_manifest(&config.lists_dir)
        .ok_or_else(|| RunError::NoManifest(config.lists_dir.clone()))?;
    info!(
        "Running ablation studies on `{key}` ({} images)...",
        manifest.len()
    );

    let root = config.enhanced_root().join("ablation");
    let (manifest, source_root, root) = (&manifest, config.manifest_root.as_path(), root.as_path());

    // 每批至多 `cpus()` 个流水线并行.
    let batch = utils::cpus().clamp(1, PipelineName::ALL.len());
    let mut profiles = Vec::with_capacity(PipelineName::ALL.len());
    for names in PipelineName::ALL.chunks(batch) {
        thread::scope(|s| {
            let handles: Vec<_> = names
                .iter()
                .map(|&name| {
                    s.spawn(move || profile_pipeline(name, manifest, source_root, &root.join(name.as_str())))
                })
                .collect();
            for (&name, th) in names.iter().zip(handles) {
                profiles.push((name, th.join().unwrap_or_else(|e| panic::resume_unwind(e))));
            }
        });
    }
    let result: AblationResult = profiles.into_iter().collect();
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 在 `root` 下创建两张良性图像, 一张恶性图像, 以及引用它们 (另加一个不存在的路径)
    /// 的 `train_benign.txt`, `test_malignant.txt`. 返回对应的配置.
    fn fixture(root: &Path, pipeline: &str) -> ExperimentConfig {
        let src_root = root.join("data/preprocessed");
        let lists = root.join("lists");
        fs::create_dir_all(&lists).unwrap();

        let mut benign = vec![];
        for i in 0..2 {
            let path = src_root.join(format!("benign/P_{:05}_LEFT_CC.png", i));
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            GrayImage::from_fn((16, 12), |(h, w)| (h * 13 + w * 7 + i) as u8)
                .save(&path)
                .unwrap();
            benign.push(path.display().to_string());
        }
        benign.push(src_root.join("benign/gone.png").display().to_string());
        fs::write(lists.join("train_benign.txt"), benign.join("\n")).unwrap();

        let path = src_root.join("malignant/P_00009_RIGHT_MLO.png");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        GrayImage::filled((9, 9), 200).save(&path).unwrap();
        fs::write(lists.join("test_malignant.txt"), path.display().to_string()).unwrap();

        ExperimentConfig {
            pipeline: pipeline.to_string(),
            lists_dir: lists,
            manifest_root: src_root,
            data_root: root.join("data"),
            experiments_dir: root.join("experiments"),
            results_dir: root.join("results"),
            ..Default::default()
        }
    }

    #[test]
    fn test_unknown_pipeline_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path(), "sharpen");
        assert!(matches!(
            run_experiment(&config),
            Err(RunError::Berry(Error::UnknownPipelineKey(_)))
        ));
        assert!(!dir.path().join("experiments").exists());
        assert!(!dir.path().join("data/enhanced").exists());
    }

    #[test]
    fn test_experiment() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path(), "median");

        // 旧的划分会被清除.
        let stale = dir.path().join("data/val/benign/old.png");
        fs::create_dir_all(stale.parent().unwrap()).unwrap();
        fs::write(&stale, "old").unwrap();

        let record = run_experiment(&config).unwrap();
        assert_eq!(record.name, "exp_median");
        assert_eq!(record.written, 3);
        assert_eq!(record.skipped, 1);
        assert_eq!(record.failed_manifests.len(), 4);
        assert_eq!((record.copied, record.existing, record.missing), (3, 0, 1));
        assert!(!record.trained && !record.evaluated);
        assert!(record.model.is_none());
        assert!(!stale.exists());

        let data = dir.path().join("data");
        assert!(data.join("enhanced/median/benign/P_00001_LEFT_CC.png").is_file());
        assert!(data.join("train/benign/P_00000_LEFT_CC.png").is_file());
        assert!(data.join("test/malignant/P_00009_RIGHT_MLO.png").is_file());

        let exp = dir.path().join("experiments/exp_median");
        for sub in EXPERIMENT_SUBDIRS {
            assert!(exp.join(sub).is_dir());
        }
        let text = fs::read_to_string(exp.join(RECORD_FILE)).unwrap();
        assert!(text.contains("pipeline = \"median\""));
        let saved = ExperimentConfig::from_file(exp.join("config.toml")).unwrap();
        assert_eq!(saved, config);
    }

    #[cfg(unix)]
    #[test]
    fn test_external_commands() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("baseline.h5");
        let results = dir.path().join("results");
        let mut config = fixture(dir.path(), "gamma_12");
        config.name = Some("exp7_gamma".to_string());
        config.model_artifact = Some(artifact.clone());
        config.train_cmd = Some(format!(
            "test \"$MAMMO_PIPELINE\" = gamma_12 && test \"$MAMMO_IMG_SIZE\" = '128 128' && echo model > '{}'",
            artifact.display()
        ));
        config.eval_cmd = Some(format!(
            "test -f \"$MAMMO_MODEL_PATH\" && mkdir -p '{0}' && echo report > '{0}/roc_curve.png'",
            results.display()
        ));

        let record = run_experiment(&config).unwrap();
        assert!(record.trained && record.evaluated);
        let exp = dir.path().join("experiments/exp7_gamma");
        assert_eq!(record.model, Some(exp.join("models/exp7_gamma.h5")));
        assert!(!artifact.exists());
        assert_eq!(record.archived, ["roc_curve.png"]);
        assert!(exp.join("results/roc_curve.png").is_file());

        config.eval_cmd = Some("exit 3".to_string());
        assert!(matches!(
            run_experiment(&config),
            Err(RunError::Command { code: Some(3), .. })
        ));
    }

    #[test]
    fn test_ablation() {
        let dir = tempfile::tempdir().unwrap();
        let config = fixture(dir.path(), "clahe");

        let result = run_ablation(&config).unwrap();
        let profiles = result.profiles();
        assert_eq!(profiles.len(), PipelineName::ALL.len());
        for ((name, p), expected) in profiles.iter().zip(PipelineName::ALL) {
            assert_eq!(*name, expected);
            assert_eq!((p.written(), p.skipped()), (2, 1), "{name} 统计错误");
        }
        let out = dir.path().join("data/enhanced/ablation/wiener/benign/P_00000_LEFT_CC.png");
        assert!(out.is_file());

        let empty = tempfile::tempdir().unwrap();
        let config = ExperimentConfig {
            lists_dir: empty.path().to_owned(),
            ..Default::default()
        };
        assert!(matches!(run_ablation(&config), Err(RunError::NoManifest(_))));
    }
}

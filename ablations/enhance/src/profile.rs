//! 流水线运行统计.

use std::time::{Duration, Instant};

/// ablation/benchmark 计时器.
///
/// 支持多次 "开始, 结束" 区间的累加.
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器. 初始化时会视为已经开始计时.
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时, 并将这一区间的时间累加. 返回本轮计时时长.
    ///
    /// 上一次调用必须是 `self.start()`, 否则计算时间值无意义.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    /// 累计时间 (微秒).
    #[inline]
    fn total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

impl Default for AccTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// 单个流水线在一个清单上的统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 无法读取或为空, 被跳过的图像个数.
    skipped: u64,

    /// 成功增强并写出的图像个数.
    written: u64,

    /// 仅增强算子本身花费的总时间 (不含读写).
    apply_time: AccTimer,

    /// 整个任务花费的总时间 (包括读写与调度).
    real_time: AccTimer,

    /// 最耗时的一次增强.
    most: Option<Duration>,
}

impl Profile {
    /// 初始化. 总计时同时开始.
    #[inline]
    pub fn new() -> Self {
        Self {
            skipped: 0,
            written: 0,
            apply_time: AccTimer::default(),
            real_time: AccTimer::default(),
            most: None,
        }
    }

    /// 记录一张被跳过的图像.
    #[inline]
    pub fn count_skipped(&mut self) {
        self.skipped += 1;
    }

    /// 记录一张成功写出的图像.
    #[inline]
    pub fn count_written(&mut self) {
        self.written += 1;
    }

    /// 开始一次增强计时.
    #[inline]
    pub fn apply_start(&mut self) {
        self.apply_time.start();
    }

    /// 结束一次增强计时.
    #[inline]
    pub fn apply_elapsed(&mut self) {
        let d = self.apply_time.elapsed();
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    /// 被跳过的图像个数.
    #[inline]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// 写出的图像个数.
    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// 增强总耗时 (微秒).
    #[inline]
    pub fn apply_time_us(&self) -> u64 {
        self.apply_time.total_us()
    }

    /// 任务总耗时 (微秒). 只在 [`Profile::finish`] 之后有意义.
    #[inline]
    pub fn real_time_us(&self) -> u64 {
        self.real_time.total_us()
    }

    /// 写出图像的平均增强耗时 (微秒).
    pub fn avg_apply_time_us(&self) -> Option<f64> {
        match self.written {
            0 => None,
            n => Some(self.apply_time_us() as f64 / n as f64),
        }
    }

    /// 最耗时的一次增强. 不存在任务时返回 `None`.
    #[inline]
    pub fn most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

//! 消融实验结果.

use crate::profile::Profile;
use mammo_berry::PipelineName;
use std::io::{self, Write};

/// 将 `p` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: PipelineName, p: &Profile, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.3}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Profile `{name}`:")?;
    writeln!(w, "{S4}Skipped images: {}", p.skipped())?;
    writeln!(w, "{S4}Written images: {}", p.written())?;
    writeln!(w, "{S4}Total enhancement time: {} us", p.apply_time_us())?;
    writeln!(
        w,
        "{S4}Average enhancement time: {} us",
        f64_to_display(p.avg_apply_time_us())
    )?;
    writeln!(w, "{S4}Total machine time: {} us", p.real_time_us())?;
    let t = p.most_time_consuming().map(|d| d.as_micros().to_string());
    write!(
        w,
        "{S4}Most time-consuming image costs {} us",
        t.as_deref().unwrap_or("/")
    )?;
    Ok(())
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(PipelineName, Profile)>,
}

impl FromIterator<(PipelineName, Profile)> for AblationResult {
    fn from_iter<I: IntoIterator<Item = (PipelineName, Profile)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }
}

impl AblationResult {
    /// 各流水线的统计, 顺序与运行顺序一致.
    #[inline]
    pub fn profiles(&self) -> &[(PipelineName, Profile)] {
        &self.data
    }

    /// 平均增强耗时最短的流水线.
    pub fn fastest(&self) -> Option<PipelineName> {
        self.data
            .iter()
            .filter_map(|(k, p)| Some((*k, p.avg_apply_time_us()?)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(k, _)| k)
    }

    /// 把全部结果写进 `w`, 以分隔线隔开.
    pub fn write_report<W: Write>(&self, w: &mut W) -> io::Result<()> {
        utils::sep_to(&mut *w)?;
        for (key, profile) in self.data.iter() {
            describe_into(*key, profile, w)?;
            writeln!(w)?;
            utils::sep_to(&mut *w)?;
        }
        if let Some(k) = self.fastest() {
            writeln!(w, "Fastest pipeline on average: `{k}`")?;
        }
        Ok(())
    }

    /// 分析运行结果, 输出到标准输出.
    pub fn analyze(&self) -> io::Result<()> {
        self.write_report(&mut io::stdout().lock())
    }
}

use std::fmt::Display;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

/// 一个批次负责的页码范围（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRange {
    pub start: u32,
    pub end: u32,
}

impl BatchRange {
    /// 根据检查点规划下一个批次
    ///
    /// 检查点超过总页数上限时返回 None，表示全部完成。
    pub fn plan(checkpoint: u32, batch_size: u32, total_limit: u32) -> Option<Self> {
        if checkpoint > total_limit {
            return None;
        }
        let start = checkpoint.max(1);
        let end = start
            .saturating_add(batch_size.max(1) - 1)
            .min(total_limit);
        Some(Self { start, end })
    }

    /// 成功后写入的下一个检查点
    pub fn next_checkpoint(&self) -> u32 {
        self.end.saturating_add(1)
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> {
        self.start..=self.end
    }

    pub fn page_count(&self) -> u32 {
        self.end - self.start + 1
    }

    pub fn overlaps(&self, other: &BatchRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// 输出文件名：`{prefix}_{start}_{end}_{时间戳}.csv`
    pub fn output_file_name(&self, prefix: &str, now: DateTime<Local>) -> String {
        format!(
            "{}_{}_{}_{}.csv",
            prefix,
            self.start,
            self.end,
            now.format("%Y%m%d_%H%M%S")
        )
    }

    /// 在目录中生成不会与已有文件冲突的输出路径
    pub fn unique_output_path(&self, folder: &Path, prefix: &str, now: DateTime<Local>) -> PathBuf {
        let base = self.output_file_name(prefix, now);
        let mut candidate = folder.join(&base);
        let stem = base.trim_end_matches(".csv").to_string();
        let mut suffix = 1;
        while candidate.exists() {
            candidate = folder.join(format!("{}_{}.csv", stem, suffix));
            suffix += 1;
        }
        candidate
    }
}

impl Display for BatchRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}

//! 记录写入服务 - 业务能力层
//!
//! 只负责"把一个批次的记录写成表格文件"能力，不关心流程

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{AppResult, HarvestError};
use crate::models::ListingRecord;

/// 批次输出写入服务
///
/// 职责：
/// - 写入表头和每条记录一行
/// - 覆盖目标路径上已有的内容
/// - 不决定文件名，也不关心批次是否成功
pub struct RecordWriter {
    output_path: PathBuf,
}

impl RecordWriter {
    pub fn new(output_path: impl Into<PathBuf>) -> Self {
        Self {
            output_path: output_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.output_path
    }

    /// 写入全部记录，返回写入条数
    pub fn write_all(&self, records: &[ListingRecord]) -> AppResult<usize> {
        let path_str = self.output_path.display().to_string();
        debug!("写入 {} 条记录到 {}", records.len(), path_str);

        if let Some(parent) = self.output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut writer = csv::Writer::from_path(&self.output_path)
            .map_err(|e| HarvestError::output_write(&path_str, e))?;
        for record in records {
            writer
                .serialize(record)
                .map_err(|e| HarvestError::output_write(&path_str, e))?;
        }
        writer.flush()?;

        Ok(records.len())
    }
}

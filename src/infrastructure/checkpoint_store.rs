//! 检查点存储 - 基础设施层
//!
//! 持有检查点文件，只暴露"读取 / 保存下一页页码"的能力

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{AppResult, HarvestError};

/// 文件缺失或损坏时的默认检查点
pub const DEFAULT_CHECKPOINT: u32 = 1;

/// 检查点存储
///
/// 文件内容为单个整数：下一次要处理的页码。
/// 同一个检查点文件同时只允许一个调度实例读写，本类型不做加锁。
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取检查点
    ///
    /// 文件不存在、为空、无法解析或不是正数时都返回 1，从头开始而不是报错。
    pub fn load(&self) -> u32 {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                debug!("检查点文件不可读 ({}): {}", self.path.display(), e);
                return DEFAULT_CHECKPOINT;
            }
        };

        match content.trim().parse::<u32>() {
            Ok(page) if page > 0 => page,
            _ => {
                warn!(
                    "⚠️ 检查点内容无效 ({:?})，从第 {} 页开始",
                    content.trim(),
                    DEFAULT_CHECKPOINT
                );
                DEFAULT_CHECKPOINT
            }
        }
    }

    /// 保存检查点
    ///
    /// 先写入同目录的临时文件并落盘，再重命名覆盖目标文件。
    pub fn save(&self, page: u32) -> AppResult<()> {
        let path_str = self.path.display().to_string();
        let tmp_path = self.tmp_path();

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| HarvestError::checkpoint_write(&path_str, e))?;
        }

        let write_tmp = || -> std::io::Result<()> {
            let mut file = File::create(&tmp_path)?;
            file.write_all(page.to_string().as_bytes())?;
            file.sync_all()
        };
        if let Err(e) = write_tmp() {
            let _ = fs::remove_file(&tmp_path);
            return Err(HarvestError::checkpoint_write(&path_str, e));
        }

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            HarvestError::checkpoint_write(&path_str, e)
        })?;

        debug!("检查点已保存: {} -> {}", path_str, page);
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "checkpoint".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

mod common;

use std::fs;
use std::time::Duration;

use common::{config_in, range, ScriptedWorker};
use listing_harvester::{BatchManager, CheckpointStore, ProcessOutcome, Shutdown};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::time::Instant;

fn manager(
    config: listing_harvester::Config,
    worker: ScriptedWorker,
    shutdown: &Shutdown,
) -> BatchManager<ScriptedWorker> {
    BatchManager::new(config, worker, shutdown.clone()).with_rng(StdRng::seed_from_u64(11))
}

#[tokio::test]
async fn test_250_pages_in_batches_of_100() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = Shutdown::new();
    let mut manager = manager(
        config_in(dir.path(), 100, 250),
        ScriptedWorker::always(ProcessOutcome::Success),
        &shutdown,
    );

    for expected_next in [101, 201, 251] {
        assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::Success);
        assert_eq!(manager.checkpoint().load(), expected_next);
    }
    assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::Complete);

    assert_eq!(
        manager.launcher().ranges(),
        vec![range(1, 100), range(101, 200), range(201, 250)]
    );
}

#[tokio::test]
async fn test_batches_never_overlap_and_outputs_are_disjoint() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = Shutdown::new();
    let mut manager = manager(
        config_in(dir.path(), 7, 30),
        ScriptedWorker::always(ProcessOutcome::Success),
        &shutdown,
    );

    while manager.run_once().await.unwrap() != ProcessOutcome::Complete {}

    let ranges = manager.launcher().ranges();
    assert_eq!(ranges.first().unwrap().start, 1);
    assert_eq!(ranges.last().unwrap().end, 30);
    for pair in ranges.windows(2) {
        assert!(!pair[0].overlaps(&pair[1]));
        assert_eq!(pair[0].end + 1, pair[1].start);
    }

    let outputs = manager.launcher().outputs();
    for output in &outputs {
        assert!(output.starts_with(dir.path().join("batches")));
        assert!(output.exists());
    }
    let mut unique = outputs.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), outputs.len());
}

#[tokio::test]
async fn test_replayed_range_gets_a_new_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = Shutdown::new();
    let mut manager = manager(
        config_in(dir.path(), 100, 1000),
        ScriptedWorker::always(ProcessOutcome::Success),
        &shutdown,
    );

    manager.run_once().await.unwrap();
    manager.checkpoint().save(1).unwrap();
    manager.run_once().await.unwrap();

    let outputs = manager.launcher().outputs();
    assert_eq!(manager.launcher().ranges(), vec![range(1, 100), range(1, 100)]);
    assert_ne!(outputs[0], outputs[1]);
    assert!(outputs[0].exists() && outputs[1].exists());
}

#[tokio::test]
async fn test_complete_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 100, 250);
    CheckpointStore::new(&config.checkpoint_path).save(251).unwrap();
    let before = fs::read(&config.checkpoint_path).unwrap();
    let batch_folder = config.batch_folder.clone();

    let shutdown = Shutdown::new();
    let mut manager = manager(config, ScriptedWorker::always(ProcessOutcome::Success), &shutdown);

    for _ in 0..3 {
        assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::Complete);
    }

    assert!(manager.launcher().ranges().is_empty());
    assert!(!batch_folder.exists());
    assert_eq!(fs::read(manager.checkpoint().path()).unwrap(), before);
}

#[tokio::test]
async fn test_last_batch_is_clamped_to_limit() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 100, 250);
    CheckpointStore::new(&config.checkpoint_path).save(249).unwrap();

    let shutdown = Shutdown::new();
    let mut manager = manager(config, ScriptedWorker::always(ProcessOutcome::Success), &shutdown);

    assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::Success);
    assert_eq!(manager.launcher().ranges(), vec![range(249, 250)]);
    assert_eq!(manager.checkpoint().load(), 251);
}

#[tokio::test(start_paused = true)]
async fn test_failures_leave_checkpoint_bit_identical() {
    for (reported, expected) in [
        (ProcessOutcome::Crashed(3), ProcessOutcome::Crashed(3)),
        (ProcessOutcome::Interrupted, ProcessOutcome::Crashed(130)),
        (ProcessOutcome::Crashed(-1), ProcessOutcome::Crashed(-1)),
        (ProcessOutcome::HardBan, ProcessOutcome::HardBan),
        (ProcessOutcome::SoftBan, ProcessOutcome::SoftBan),
    ] {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path(), 100, 8000);
        CheckpointStore::new(&config.checkpoint_path).save(101).unwrap();
        let before = fs::read(&config.checkpoint_path).unwrap();

        let shutdown = Shutdown::new();
        let mut manager = manager(config, ScriptedWorker::always(reported), &shutdown);

        assert_eq!(manager.run_once().await.unwrap(), expected);
        assert_eq!(manager.launcher().ranges(), vec![range(101, 200)]);
        assert_eq!(fs::read(manager.checkpoint().path()).unwrap(), before, "{:?}", reported);
    }
}

#[tokio::test]
async fn test_worker_interrupt_without_own_signal_is_a_crash() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = Shutdown::new();
    let mut manager = manager(
        config_in(dir.path(), 100, 8000),
        ScriptedWorker::new([ProcessOutcome::Interrupted], ProcessOutcome::Success),
        &shutdown,
    );

    assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::Crashed(130));
    assert_eq!(manager.checkpoint().load(), 1);

    // 同一区间在下一次调用时重试
    assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::Success);
    assert_eq!(manager.launcher().ranges(), vec![range(1, 100), range(1, 100)]);
    assert_eq!(manager.checkpoint().load(), 101);
}

#[tokio::test]
async fn test_worker_interrupt_after_own_signal_stays_interrupted() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = Shutdown::new();
    let mut manager = manager(
        config_in(dir.path(), 100, 8000),
        ScriptedWorker::always(ProcessOutcome::Interrupted),
        &shutdown,
    );

    shutdown.trigger();
    assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::Interrupted);
    assert_eq!(manager.checkpoint().load(), 1);
}

#[tokio::test]
async fn test_corrupt_checkpoint_restarts_from_first_page() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 100, 8000);
    fs::write(&config.checkpoint_path, "not a number").unwrap();

    let shutdown = Shutdown::new();
    let mut manager = manager(config, ScriptedWorker::always(ProcessOutcome::Success), &shutdown);

    manager.run_once().await.unwrap();
    assert_eq!(manager.launcher().ranges(), vec![range(1, 100)]);
    assert_eq!(manager.checkpoint().load(), 101);
}

#[tokio::test(start_paused = true)]
async fn test_hard_ban_cools_down_for_fixed_time() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = Shutdown::new();
    let mut manager = manager(
        config_in(dir.path(), 100, 8000),
        ScriptedWorker::always(ProcessOutcome::HardBan),
        &shutdown,
    );

    let started = Instant::now();
    assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::HardBan);

    assert_eq!(started.elapsed(), Duration::from_secs(120));
    assert_eq!(manager.checkpoint().load(), 1);
    assert!(!manager.checkpoint().path().exists());
}

#[tokio::test(start_paused = true)]
async fn test_soft_ban_cools_down_inside_window() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = Shutdown::new();
    let mut manager = manager(
        config_in(dir.path(), 100, 8000),
        ScriptedWorker::always(ProcessOutcome::SoftBan),
        &shutdown,
    );

    for _ in 0..5 {
        let started = Instant::now();
        assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::SoftBan);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_secs(120), "冷却过短: {:?}", elapsed);
        assert!(elapsed <= Duration::from_secs(240), "冷却过长: {:?}", elapsed);
    }
    assert_eq!(manager.checkpoint().load(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_during_cooldown_returns_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = Shutdown::new();
    let mut manager = manager(
        config_in(dir.path(), 100, 8000),
        ScriptedWorker::always(ProcessOutcome::HardBan),
        &shutdown,
    );

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.trigger();
    });

    let started = Instant::now();
    assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::Interrupted);
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(manager.checkpoint().load(), 1);
}

#[tokio::test]
async fn test_worker_reporting_complete_is_treated_as_crash() {
    let dir = tempfile::tempdir().unwrap();
    let shutdown = Shutdown::new();
    let mut manager = manager(
        config_in(dir.path(), 100, 8000),
        ScriptedWorker::always(ProcessOutcome::Complete),
        &shutdown,
    );

    assert_eq!(manager.run_once().await.unwrap(), ProcessOutcome::Crashed(1));
    assert_eq!(manager.checkpoint().load(), 1);
}

#[tokio::test]
async fn test_unwritable_checkpoint_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path(), 100, 8000);
    // 断点路径是一个目录，保存必然失败
    fs::create_dir_all(&config.checkpoint_path).unwrap();

    let shutdown = Shutdown::new();
    let mut manager = manager(config, ScriptedWorker::always(ProcessOutcome::Success), &shutdown);

    assert!(manager.run_once().await.is_err());
}

/// 两个编排器共用一个断点文件是误用：后保存的一方会覆盖另一方的进度
#[tokio::test]
async fn test_two_managers_on_one_checkpoint_lose_updates() {
    use listing_harvester::{AppResult, BatchRange, WorkerLauncher};
    use std::path::Path;

    struct RacingWorker {
        other: tokio::sync::Mutex<BatchManager<ScriptedWorker>>,
    }

    impl WorkerLauncher for RacingWorker {
        async fn launch_worker(&self, _range: BatchRange, _output: &Path) -> AppResult<ProcessOutcome> {
            // 第一个管理器的抓取进行中，第二个管理器完成了两个批次
            let mut other = self.other.lock().await;
            other.run_once().await?;
            other.run_once().await?;
            Ok(ProcessOutcome::Success)
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let shutdown = Shutdown::new();
    let other = manager(
        config_in(dir.path(), 100, 8000),
        ScriptedWorker::always(ProcessOutcome::Success),
        &shutdown,
    );
    let racing = RacingWorker {
        other: tokio::sync::Mutex::new(other),
    };
    let mut first = BatchManager::new(config_in(dir.path(), 100, 8000), racing, shutdown.clone());

    assert_eq!(first.run_once().await.unwrap(), ProcessOutcome::Success);

    let other = first.launcher().other.lock().await;
    assert_eq!(other.launcher().ranges(), vec![range(1, 100), range(101, 200)]);
    // 第二个管理器写入的 201 被覆盖回 101，[101, 200] 会被重复抓取
    assert_eq!(first.checkpoint().load(), 101);
}

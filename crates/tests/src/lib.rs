//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 配置到状态机的装配
//! - 模拟 e2e 测试（无需 CARLA）：MockDrive -> 状态机 -> 落盘 -> 读回 / 验证

#[cfg(test)]
mod contract_tests {
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{NavigationCommand, RoadOption};

    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_command_codes_are_stable() {
        let codes: Vec<u8> = NavigationCommand::VALID.iter().map(|c| c.code()).collect();
        assert_eq!(codes, vec![0, 2, 3, 4, 5]);
        assert_eq!(RoadOption::ALL.len(), 7);
    }

    #[test]
    fn test_custom_mapping_from_toml() {
        let toml = r#"
            [commands]
            change_lane_left = "left"
            change_lane_right = "right"
        "#;
        let bp = ConfigLoader::load_from_str(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.commands.change_lane_left, NavigationCommand::Left);
        assert_eq!(bp.commands.lane_follow, NavigationCommand::Follow);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::BTreeSet;
    use std::fs;
    use std::path::{Path, PathBuf};

    use collector::{
        AutoCollector, CollectionStateMachine, CollectorState, ScriptedGate, StopReason,
        STATISTICS_FILE_NAME,
    };
    use contracts::{
        CameraConfig, CollectionConfig, CommandMapping, Decision, NavigationCommand,
        OutputConfig, RoadOption,
    };
    use persistence::{find_chunk_files, read_chunk, verify_directory, PersistenceWriter, VerifyOptions};
    use simulator::{MockDrive, MockDriveConfig, MockSimulatorClient, RouteLeg};
    use tempfile::tempdir;
    use tokio::sync::watch;

    const STAMP: &str = "20240301_120000";

    fn collection() -> CollectionConfig {
        CollectionConfig {
            warmup_ticks: 0,
            ..CollectionConfig::default()
        }
    }

    fn writer(dir: &Path) -> PersistenceWriter {
        PersistenceWriter::new(&OutputConfig {
            save_path: dir.to_path_buf(),
            ..OutputConfig::default()
        })
        .unwrap()
        .with_fixed_timestamp(STAMP)
    }

    fn drive(legs: Vec<RouteLeg>, tweak: impl FnOnce(&mut MockDriveConfig)) -> MockDrive {
        let mut config = MockDriveConfig {
            sensor_delay_ticks: 0,
            ..MockDriveConfig::default()
        };
        tweak(&mut config);
        MockDrive::new(legs, &CameraConfig::default(), config)
    }

    fn machine(
        source: MockDrive,
        gate: ScriptedGate,
        dir: &Path,
        config: &CollectionConfig,
    ) -> CollectionStateMachine<MockDrive, ScriptedGate, PersistenceWriter> {
        CollectionStateMachine::new(source, gate, writer(dir), config, CommandMapping::default())
    }

    fn chunk_files(dir: &Path) -> Vec<PathBuf> {
        find_chunk_files(dir).unwrap()
    }

    /// Approve one Left segment: exactly one 200-sample file labelled 3.
    #[tokio::test]
    async fn test_e2e_approved_segment_lands_on_disk() {
        let dir = tempdir().unwrap();
        let source = drive(vec![RouteLeg::new(RoadOption::Left, 1000)], |_| {});
        let gate = ScriptedGate::new([Decision::Approve], false);
        let mut sm = machine(source, gate, dir.path(), &collection());

        let report = sm.run().await.unwrap();
        assert_eq!(report.stop_reason, StopReason::UserStop);

        let files = chunk_files(dir.path());
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, format!("carla_cmd3_Left_{STAMP}.npz"));

        let chunk = read_chunk(&files[0]).unwrap();
        assert_eq!(chunk.rgb_shape, vec![200, 88, 200, 3]);
        assert_eq!(chunk.targets_shape, vec![200, 25]);
        assert!(chunk.target_rows().all(|row| row.as_array()[24] == 3.0));
        assert!(chunk.target_rows().all(|row| row.speed_kmh() <= 150.0));
    }

    /// A Left segment that runs past the junction keeps its file name but
    /// labels the follow-lane ticks with code 2.
    #[tokio::test]
    async fn test_e2e_segment_across_junction_keeps_tick_labels() {
        let dir = tempdir().unwrap();
        let source = drive(
            vec![
                RouteLeg::new(RoadOption::Left, 20),
                RouteLeg::new(RoadOption::LaneFollow, 100),
            ],
            |_| {},
        );
        let config = CollectionConfig {
            segment_size: 40,
            ..collection()
        };
        let gate = ScriptedGate::new([Decision::Approve], false);
        let mut sm = machine(source, gate, dir.path(), &config);
        sm.run().await.unwrap();

        let files = chunk_files(dir.path());
        let name = files[0].file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, format!("carla_cmd3_Left_{STAMP}.npz"));

        let codes: BTreeSet<i32> = read_chunk(&files[0])
            .unwrap()
            .target_rows()
            .map(|row| row.as_array()[24] as i32)
            .collect();
        assert_eq!(codes, BTreeSet::from([2, 3]));
    }

    /// Reject the follow-lane stretch, approve the turn that follows.
    #[tokio::test]
    async fn test_e2e_rejected_segment_writes_nothing() {
        let dir = tempdir().unwrap();
        let source = drive(
            vec![
                RouteLeg::new(RoadOption::LaneFollow, 51),
                RouteLeg::new(RoadOption::Right, 300),
            ],
            |_| {},
        );
        let gate = ScriptedGate::new([Decision::Reject, Decision::Approve], false);
        let mut sm = machine(source, gate, dir.path(), &collection());

        let report = sm.run().await.unwrap();
        assert_eq!(report.statistics.segments_skipped, 1);
        assert_eq!(report.statistics.frames_skipped, 51);
        assert_eq!(sm.gate().requests.len(), 3);
        assert_eq!(sm.gate().requests[1].command, NavigationCommand::Right);

        let files = chunk_files(dir.path());
        assert_eq!(files.len(), 1);
        let chunk = read_chunk(&files[0]).unwrap();
        assert_eq!(chunk.len(), 200);
        assert!(chunk.target_rows().all(|row| row.command() == NavigationCommand::Right));
    }

    async fn interrupt_after_37(save: bool) -> (tempfile::TempDir, usize) {
        let dir = tempdir().unwrap();
        let (tx, rx) = watch::channel(false);
        let source = drive(vec![RouteLeg::new(RoadOption::Straight, 1000)], |_| {});
        let gate = ScriptedGate::new([Decision::Approve], save);
        let mut sm = machine(source, gate, dir.path(), &collection()).with_shutdown(rx);

        sm.warm_up().await.unwrap();
        assert_eq!(sm.step().await.unwrap(), CollectorState::Collecting);
        for _ in 0..37 {
            sm.step().await.unwrap();
        }
        tx.send(true).unwrap();
        assert_eq!(
            sm.step().await.unwrap(),
            CollectorState::Stopped(StopReason::UserAbort)
        );
        sm.finish().await.unwrap();
        let saved = sm.statistics().frames_saved as usize;
        (dir, saved)
    }

    #[tokio::test]
    async fn test_e2e_interrupt_confirmed_saves_partial_segment() {
        let (dir, saved) = interrupt_after_37(true).await;
        assert_eq!(saved, 37);

        let files = chunk_files(dir.path());
        assert_eq!(files.len(), 1);
        let chunk = read_chunk(&files[0]).unwrap();
        assert_eq!(chunk.len(), 37);
        assert!(chunk.target_rows().all(|row| row.as_array()[24] == 5.0));
    }

    #[tokio::test]
    async fn test_e2e_interrupt_declined_discards_partial_segment() {
        let (dir, saved) = interrupt_after_37(false).await;
        assert_eq!(saved, 0);
        assert!(chunk_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_e2e_quality_filter_keeps_files_clean() {
        let dir = tempdir().unwrap();
        let source = drive(vec![RouteLeg::new(RoadOption::LaneFollow, 500)], |c| {
            c.dark_ticks = BTreeSet::from([3, 4, 10]);
            c.speed_spikes = BTreeSet::from([7]);
        });
        let config = CollectionConfig {
            segment_size: 40,
            ..collection()
        };
        let gate = ScriptedGate::new([Decision::Approve], false);
        let mut sm = machine(source, gate, dir.path(), &config);

        let report = sm.run().await.unwrap();
        assert_eq!(report.statistics.rejected_dark, 3);
        assert_eq!(report.statistics.rejected_speed, 1);

        let files = chunk_files(dir.path());
        let chunk = read_chunk(&files[0]).unwrap();
        assert_eq!(chunk.len(), 40);
        for sample in chunk.samples().unwrap() {
            assert!(sample.mean_brightness() >= 5.0);
            assert!(sample.targets().speed_kmh() <= 150.0);
        }
    }

    /// Samples read back are identical to the samples that were collected.
    #[tokio::test]
    async fn test_e2e_written_samples_read_back_identically() {
        let dir = tempdir().unwrap();
        let source = drive(vec![RouteLeg::new(RoadOption::Left, 80)], |_| {});
        let config = CollectionConfig {
            segment_size: 25,
            ..collection()
        };
        let mut sm = CollectionStateMachine::new(
            source,
            ScriptedGate::new([Decision::Approve], false),
            collector::MemorySink::new(),
            &config,
            CommandMapping::default(),
        );
        sm.run().await.unwrap();
        let (command, samples) = sm.sink().segments[0].clone();

        let chunks = writer(dir.path()).write(&samples, command).unwrap();
        assert_eq!(chunks.len(), 1);
        let loaded = read_chunk(&chunks[0].path).unwrap();
        assert_eq!(loaded.samples().unwrap(), samples);
    }

    /// Long segment split across files with a smaller chunk size.
    #[tokio::test]
    async fn test_e2e_segment_split_into_parts() {
        let dir = tempdir().unwrap();
        let source = drive(vec![RouteLeg::new(RoadOption::LaneFollow, 1000)], |_| {});
        let sink = PersistenceWriter::new(&OutputConfig {
            save_path: dir.path().to_path_buf(),
            chunk_size: 80,
            ..OutputConfig::default()
        })
        .unwrap()
        .with_fixed_timestamp(STAMP);
        let mut sm = CollectionStateMachine::new(
            source,
            ScriptedGate::new([Decision::Approve], false),
            sink,
            &collection(),
            CommandMapping::default(),
        );

        let report = sm.run().await.unwrap();
        let sizes: Vec<usize> = report.chunks.iter().map(|c| c.samples).collect();
        assert_eq!(sizes, vec![80, 80, 40]);
        let names: Vec<String> = chunk_files(dir.path())
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert!(names.contains(&format!("carla_cmd2_Follow_{STAMP}_part001.npz")));
        assert!(names.contains(&format!("carla_cmd2_Follow_{STAMP}_part003.npz")));
    }

    /// Verification is read-only and repeatable.
    #[tokio::test]
    async fn test_e2e_verify_is_idempotent() {
        let dir = tempdir().unwrap();
        let source = drive(vec![RouteLeg::new(RoadOption::Left, 150)], |_| {});
        let config = CollectionConfig {
            segment_size: 100,
            ..collection()
        };
        let gate = ScriptedGate::new([Decision::Approve, Decision::Approve], false);
        let mut sm = machine(source, gate, dir.path(), &config);
        let report = sm.run().await.unwrap();
        assert_eq!(report.stop_reason, StopReason::RouteCompleted);

        let options = VerifyOptions {
            expected_chunk_size: 100,
            ..VerifyOptions::default()
        };
        let first = verify_directory(dir.path(), &options).unwrap();
        let second = verify_directory(dir.path(), &options).unwrap();
        assert_eq!(first, second);
        assert!(first.is_clean());
        assert_eq!(first.total_files, 2);
        assert_eq!(first.total_samples, report.statistics.frames_saved);
        assert_eq!(first.command_distribution.get("Left"), Some(&first.total_samples));
        assert_eq!(first.incomplete_files.len(), 1);
    }

    /// Automatic mode over the mock map writes chunks and the statistics file.
    #[tokio::test]
    async fn test_e2e_auto_collection_writes_statistics() {
        let dir = tempdir().unwrap();
        let mut blueprint = contracts::CollectorBlueprint::default();
        blueprint.collection.segment_size = 60;
        blueprint.collection.warmup_ticks = 2;
        blueprint.auto.frames_per_route = 100;
        blueprint.auto.max_routes = Some(2);
        blueprint.output.save_path = dir.path().to_path_buf();

        let sink = PersistenceWriter::new(&blueprint.output).unwrap();
        let mut auto = AutoCollector::new(MockSimulatorClient::new(), sink, blueprint);
        let report = auto.run().await.unwrap();

        assert_eq!(report.summary.total_routes_attempted, 2);
        assert_eq!(report.summary.total_routes_completed, 2);
        assert_eq!(report.statistics_path, dir.path().join(STATISTICS_FILE_NAME));

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report.statistics_path).unwrap()).unwrap();
        assert_eq!(json["total_routes_completed"], 2);
        assert_eq!(
            json["total_frames_saved"].as_u64(),
            Some(report.summary.total_frames_saved)
        );

        let on_disk: usize = chunk_files(dir.path())
            .iter()
            .map(|p| read_chunk(p).unwrap().len())
            .sum();
        assert_eq!(on_disk as u64, report.summary.total_frames_saved);
    }
}

#[cfg(all(test, feature = "hdf5"))]
mod h5_tests {
    use std::path::Path;

    use collector::{CollectionStateMachine, MemorySink, ScriptedGate};
    use contracts::{
        CameraConfig, CollectionConfig, CommandMapping, ContainerFormat, Decision,
        NavigationCommand, OutputConfig, RoadOption,
    };
    use persistence::{find_chunk_files, read_chunk, PersistenceWriter};
    use simulator::{MockDrive, MockDriveConfig, RouteLeg};
    use tempfile::tempdir;

    fn h5_writer(dir: &Path, chunk_size: usize) -> PersistenceWriter {
        PersistenceWriter::new(&OutputConfig {
            save_path: dir.to_path_buf(),
            container: ContainerFormat::Hdf5,
            chunk_size,
            ..OutputConfig::default()
        })
        .unwrap()
        .with_fixed_timestamp("20240301_120000")
    }

    async fn collect(option: RoadOption, segment_size: usize) -> (NavigationCommand, Vec<contracts::Sample>) {
        let source = MockDrive::new(
            vec![RouteLeg::new(option, 500)],
            &CameraConfig::default(),
            MockDriveConfig {
                sensor_delay_ticks: 0,
                ..MockDriveConfig::default()
            },
        );
        let config = CollectionConfig {
            warmup_ticks: 0,
            segment_size,
            ..CollectionConfig::default()
        };
        let mut sm = CollectionStateMachine::new(
            source,
            ScriptedGate::new([Decision::Approve], false),
            MemorySink::new(),
            &config,
            CommandMapping::default(),
        );
        sm.run().await.unwrap();
        sm.sink().segments[0].clone()
    }

    #[tokio::test]
    async fn test_h5_chunk_has_expected_shapes() {
        let dir = tempdir().unwrap();
        let (command, samples) = collect(RoadOption::Straight, 30).await;

        let chunks = h5_writer(dir.path(), 200).write(&samples, command).unwrap();
        assert_eq!(chunks.len(), 1);
        let name = chunks[0].path.file_name().unwrap().to_string_lossy().to_string();
        assert_eq!(name, "carla_cmd5_Straight_20240301_120000.h5");

        let chunk = read_chunk(&chunks[0].path).unwrap();
        assert_eq!(chunk.rgb_shape, vec![30, 88, 200, 3]);
        assert_eq!(chunk.targets_shape, vec![30, 25]);
        assert!(chunk.target_rows().all(|row| row.as_array()[24] == 5.0));
    }

    #[tokio::test]
    async fn test_h5_split_chunks_read_back_identically() {
        let dir = tempdir().unwrap();
        let (command, samples) = collect(RoadOption::Left, 50).await;

        let chunks = h5_writer(dir.path(), 20).write(&samples, command).unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(find_chunk_files(dir.path()).unwrap().len(), 3);

        let mut loaded = Vec::new();
        for chunk in &chunks {
            loaded.extend(read_chunk(&chunk.path).unwrap().samples().unwrap());
        }
        assert_eq!(loaded, samples);
    }
}

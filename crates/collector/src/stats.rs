//! 采集统计
//!
//! 由状态机持有并在每次迁移时更新，进程内不共享。

use std::collections::BTreeMap;
use std::time::Duration;

use contracts::{NavigationCommand, PersistedChunk, SampleRejection};
use serde::Serialize;

/// Cumulative counters of one collection run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionStatistics {
    /// Simulator ticks advanced (warm-up included)
    pub ticks: u64,
    /// Samples accepted into a segment
    pub frames_collected: u64,
    /// Samples written to disk
    pub frames_saved: u64,
    /// Ticks spent skipping
    pub frames_skipped: u64,
    pub segments_saved: u64,
    pub segments_skipped: u64,
    /// Segments lost to a write failure
    pub segments_failed: u64,
    /// Partial segment discarded at the final prompt
    pub segments_discarded: u64,
    pub chunks_written: u64,
    pub bytes_written: u64,
    pub rejected_dark: u64,
    pub rejected_speed: u64,
    /// Ticks with no camera frame
    pub sensor_gaps: u64,
    /// Samples saved per command name
    pub saved_by_command: BTreeMap<String, u64>,
    #[serde(skip)]
    pub duration: Duration,
}

impl CollectionStatistics {
    /// Frames counted against `max_frames`: accepted samples plus skipped ticks.
    pub fn frames_consumed(&self) -> u64 {
        self.frames_collected + self.frames_skipped
    }

    pub fn rejected(&self) -> u64 {
        self.rejected_dark + self.rejected_speed
    }

    pub fn record_rejection(&mut self, rejection: &SampleRejection) {
        match rejection {
            SampleRejection::TooDark { .. } => self.rejected_dark += 1,
            SampleRejection::ImplausibleSpeed { .. } => self.rejected_speed += 1,
        }
    }

    /// Account for one successfully persisted segment.
    pub fn record_saved(&mut self, command: NavigationCommand, chunks: &[PersistedChunk]) {
        let samples: u64 = chunks.iter().map(|c| c.samples as u64).sum();
        self.segments_saved += 1;
        self.frames_saved += samples;
        self.chunks_written += chunks.len() as u64;
        self.bytes_written += chunks.iter().map(|c| c.bytes).sum::<u64>();
        *self
            .saved_by_command
            .entry(command.name().to_string())
            .or_default() += samples;
    }

    /// Merge another run into this one (used across routes).
    pub fn absorb(&mut self, other: &CollectionStatistics) {
        self.ticks += other.ticks;
        self.frames_collected += other.frames_collected;
        self.frames_saved += other.frames_saved;
        self.frames_skipped += other.frames_skipped;
        self.segments_saved += other.segments_saved;
        self.segments_skipped += other.segments_skipped;
        self.segments_failed += other.segments_failed;
        self.segments_discarded += other.segments_discarded;
        self.chunks_written += other.chunks_written;
        self.bytes_written += other.bytes_written;
        self.rejected_dark += other.rejected_dark;
        self.rejected_speed += other.rejected_speed;
        self.sensor_gaps += other.sensor_gaps;
        for (name, count) in &other.saved_by_command {
            *self.saved_by_command.entry(name.clone()).or_default() += count;
        }
        self.duration += other.duration;
    }

    /// Simulated frames per wall-clock second
    pub fn tick_rate(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.ticks as f64 / secs
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                    Collection Statistics                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");

        println!("📊 Overview");
        println!("   ├─ Duration: {:.2}s", self.duration.as_secs_f64());
        println!("   ├─ Ticks: {} ({:.1}/s)", self.ticks, self.tick_rate());
        println!("   ├─ Frames collected: {}", self.frames_collected);
        println!("   ├─ Frames saved: {}", self.frames_saved);
        println!("   └─ Frames skipped: {}", self.frames_skipped);

        println!("\n💾 Segments");
        println!("   ├─ Saved: {} ({} files, {:.2} MB)", self.segments_saved, self.chunks_written, self.bytes_written as f64 / 1024.0 / 1024.0);
        println!("   ├─ Skipped: {}", self.segments_skipped);
        println!("   ├─ Discarded: {}", self.segments_discarded);
        println!("   └─ Failed: {}", self.segments_failed);

        if self.rejected() > 0 || self.sensor_gaps > 0 {
            println!("\n⚠️  Quality");
            println!("   ├─ Too dark: {}", self.rejected_dark);
            println!("   ├─ Implausible speed: {}", self.rejected_speed);
            println!("   └─ Sensor gaps: {}", self.sensor_gaps);
        }

        if !self.saved_by_command.is_empty() {
            println!("\n🧭 Saved by command");
            for (name, count) in &self.saved_by_command {
                println!("   ├─ {}: {}", name, count);
            }
        }

        println!();
    }
}

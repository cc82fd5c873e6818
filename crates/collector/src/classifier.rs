//! 导航指令分类
//!
//! 把规划器的原始 `RoadOption` 经映射表转换为封闭集合 `NavigationCommand`。
//! 规划器缺失或映射出未知编码时降级为默认指令，不会中断采集。

use contracts::{CommandContext, CommandMapping, NavigationCommand, RoadOption};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct CommandClassifier {
    mapping: CommandMapping,
    planner_missing_warned: bool,
    degraded_ticks: u64,
}

impl CommandClassifier {
    pub fn new(mapping: CommandMapping) -> Self {
        Self {
            mapping,
            planner_missing_warned: false,
            degraded_ticks: 0,
        }
    }

    /// Classify the planner output observed on this tick.
    ///
    /// `route_completed` selects the terminal meaning of `Void`.
    pub fn classify(&mut self, option: Option<RoadOption>, route_completed: bool) -> NavigationCommand {
        let Some(option) = option else {
            self.degraded_ticks += 1;
            if !self.planner_missing_warned {
                self.planner_missing_warned = true;
                warn!(
                    fallback = %self.mapping.planner_fallback,
                    "Planner unavailable, using fallback command"
                );
            }
            return self.safe(self.mapping.planner_fallback);
        };

        let context = if route_completed {
            CommandContext::Terminal
        } else {
            CommandContext::MidRoute
        };
        self.safe(self.mapping.map(option, context))
    }

    /// Ticks classified without a planner
    pub fn degraded_ticks(&self) -> u64 {
        self.degraded_ticks
    }

    pub fn mapping(&self) -> &CommandMapping {
        &self.mapping
    }

    fn safe(&self, command: NavigationCommand) -> NavigationCommand {
        if command.is_known() {
            command
        } else {
            warn!(command = %command, "Unknown command code, treating as Follow");
            NavigationCommand::Follow
        }
    }
}

impl Default for CommandClassifier {
    fn default() -> Self {
        Self::new(CommandMapping::default())
    }
}

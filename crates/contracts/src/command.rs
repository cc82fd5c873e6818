//! NavigationCommand - 导航指令
//!
//! 外部规划器输出的原始符号 (`RoadOption`) 与采集系统内部使用的
//! 封闭指令集合 (`NavigationCommand`) 之间的映射。
//!
//! 数值编码写入每个样本控制向量的第 24 位：
//!
//! | code | command     |
//! |------|-------------|
//! | 0    | GoalReached |
//! | 2    | Follow      |
//! | 3    | Left        |
//! | 4    | Right       |
//! | 5    | Straight    |

use std::fmt;

use serde::{Deserialize, Serialize};

/// 规划器原始道路选项
///
/// 与仿真器导航库的 `RoadOption` 一一对应。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoadOption {
    Void,
    Left,
    Right,
    Straight,
    LaneFollow,
    ChangeLaneLeft,
    ChangeLaneRight,
}

impl RoadOption {
    pub const ALL: [RoadOption; 7] = [
        RoadOption::Void,
        RoadOption::Left,
        RoadOption::Right,
        RoadOption::Straight,
        RoadOption::LaneFollow,
        RoadOption::ChangeLaneLeft,
        RoadOption::ChangeLaneRight,
    ];
}

/// 导航指令 (封闭集合)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationCommand {
    GoalReached,
    Follow,
    Left,
    Right,
    Straight,
    /// 无法识别的编码，保留原始值用于诊断
    Unknown(i32),
}

impl NavigationCommand {
    /// Commands that may legitimately appear in a persisted label vector.
    pub const VALID: [NavigationCommand; 5] = [
        NavigationCommand::GoalReached,
        NavigationCommand::Follow,
        NavigationCommand::Left,
        NavigationCommand::Right,
        NavigationCommand::Straight,
    ];

    /// Numeric code stored at index 24 of the control vector.
    ///
    /// `Unknown` is labelled as follow-lane, the safest known command.
    pub const fn code(self) -> u8 {
        match self {
            NavigationCommand::GoalReached => 0,
            NavigationCommand::Follow | NavigationCommand::Unknown(_) => 2,
            NavigationCommand::Left => 3,
            NavigationCommand::Right => 4,
            NavigationCommand::Straight => 5,
        }
    }

    /// Decode a numeric label.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => NavigationCommand::GoalReached,
            2 => NavigationCommand::Follow,
            3 => NavigationCommand::Left,
            4 => NavigationCommand::Right,
            5 => NavigationCommand::Straight,
            other => NavigationCommand::Unknown(other),
        }
    }

    /// Human-readable name, used in file names and logs.
    pub const fn name(self) -> &'static str {
        match self {
            NavigationCommand::GoalReached => "GoalReached",
            NavigationCommand::Follow => "Follow",
            NavigationCommand::Left => "Left",
            NavigationCommand::Right => "Right",
            NavigationCommand::Straight => "Straight",
            NavigationCommand::Unknown(_) => "Unknown",
        }
    }

    pub const fn is_known(self) -> bool {
        !matches!(self, NavigationCommand::Unknown(_))
    }
}

impl fmt::Display for NavigationCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NavigationCommand::Unknown(raw) => write!(f, "Unknown({raw})"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Where a raw symbol was observed.
///
/// `RoadOption::Void` is ambiguous upstream: while a route is still being
/// driven it means "no specific manoeuvre", once the route is finished it is
/// the goal sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandContext {
    MidRoute,
    Terminal,
}

/// RoadOption -> NavigationCommand 映射表
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandMapping {
    #[serde(default = "default_lane_follow")]
    pub lane_follow: NavigationCommand,

    #[serde(default = "default_left")]
    pub left: NavigationCommand,

    #[serde(default = "default_right")]
    pub right: NavigationCommand,

    #[serde(default = "default_straight")]
    pub straight: NavigationCommand,

    #[serde(default = "default_lane_follow")]
    pub change_lane_left: NavigationCommand,

    #[serde(default = "default_lane_follow")]
    pub change_lane_right: NavigationCommand,

    /// VOID 在路线行驶途中的含义
    #[serde(default = "default_lane_follow")]
    pub void_mid_route: NavigationCommand,

    /// VOID 作为路线结束哨兵时的含义
    #[serde(default = "default_void_terminal")]
    pub void_terminal: NavigationCommand,

    /// 规划器不可用时使用的默认指令
    #[serde(default = "default_lane_follow")]
    pub planner_fallback: NavigationCommand,
}

fn default_lane_follow() -> NavigationCommand {
    NavigationCommand::Follow
}

fn default_left() -> NavigationCommand {
    NavigationCommand::Left
}

fn default_right() -> NavigationCommand {
    NavigationCommand::Right
}

fn default_straight() -> NavigationCommand {
    NavigationCommand::Straight
}

fn default_void_terminal() -> NavigationCommand {
    NavigationCommand::GoalReached
}

impl Default for CommandMapping {
    fn default() -> Self {
        Self {
            lane_follow: default_lane_follow(),
            left: default_left(),
            right: default_right(),
            straight: default_straight(),
            change_lane_left: default_lane_follow(),
            change_lane_right: default_lane_follow(),
            void_mid_route: default_lane_follow(),
            void_terminal: default_void_terminal(),
            planner_fallback: default_lane_follow(),
        }
    }
}

impl CommandMapping {
    /// Map a raw planner symbol in the given context.
    pub fn map(&self, option: RoadOption, context: CommandContext) -> NavigationCommand {
        match option {
            RoadOption::LaneFollow => self.lane_follow,
            RoadOption::Left => self.left,
            RoadOption::Right => self.right,
            RoadOption::Straight => self.straight,
            RoadOption::ChangeLaneLeft => self.change_lane_left,
            RoadOption::ChangeLaneRight => self.change_lane_right,
            RoadOption::Void => match context {
                CommandContext::MidRoute => self.void_mid_route,
                CommandContext::Terminal => self.void_terminal,
            },
        }
    }

    /// All configured targets, paired with a label for validation messages.
    pub fn entries(&self) -> [(&'static str, NavigationCommand); 9] {
        [
            ("lane_follow", self.lane_follow),
            ("left", self.left),
            ("right", self.right),
            ("straight", self.straight),
            ("change_lane_left", self.change_lane_left),
            ("change_lane_right", self.change_lane_right),
            ("void_mid_route", self.void_mid_route),
            ("void_terminal", self.void_terminal),
            ("planner_fallback", self.planner_fallback),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_mapping_collapses_lane_changes() {
        let mapping = CommandMapping::default();
        let ctx = CommandContext::MidRoute;
        assert_eq!(mapping.map(RoadOption::LaneFollow, ctx).code(), 2);
        assert_eq!(mapping.map(RoadOption::Left, ctx).code(), 3);
        assert_eq!(mapping.map(RoadOption::Right, ctx).code(), 4);
        assert_eq!(mapping.map(RoadOption::Straight, ctx).code(), 5);
        assert_eq!(mapping.map(RoadOption::ChangeLaneLeft, ctx).code(), 2);
        assert_eq!(mapping.map(RoadOption::ChangeLaneRight, ctx).code(), 2);
    }

    #[test]
    fn void_depends_on_context() {
        let mapping = CommandMapping::default();
        assert_eq!(
            mapping.map(RoadOption::Void, CommandContext::MidRoute),
            NavigationCommand::Follow
        );
        assert_eq!(
            mapping.map(RoadOption::Void, CommandContext::Terminal),
            NavigationCommand::GoalReached
        );
    }

    #[test]
    fn code_round_trip() {
        for cmd in NavigationCommand::VALID {
            assert_eq!(NavigationCommand::from_code(cmd.code() as i32), cmd);
        }
        assert_eq!(NavigationCommand::from_code(7), NavigationCommand::Unknown(7));
        assert_eq!(NavigationCommand::Unknown(7).code(), 2);
    }

    #[test]
    fn mapping_deserializes_with_defaults() {
        let mapping: CommandMapping =
            serde_json::from_str(r#"{ "void_terminal": "follow" }"#).unwrap();
        assert_eq!(mapping.void_terminal, NavigationCommand::Follow);
        assert_eq!(mapping.left, NavigationCommand::Left);
    }
}

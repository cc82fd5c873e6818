//! InteractionGate 实现
//!
//! - `ConsoleGate`: 在终端询问操作员 (仿真在等待期间冻结)
//! - `AutoApproveGate`: 全自动采集的固定策略，总是批准
//! - `ScriptedGate`: 按预设序列回答，用于测试

use std::collections::VecDeque;

use contracts::{ContractError, Decision, DecisionRequest, InteractionGate, PendingSegment};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};
use tracing::{debug, info};

/// Parse an operator answer.
///
/// Case-insensitive; surrounding whitespace is ignored. `None` means the
/// answer was not understood and the operator is asked again.
pub fn parse_decision(input: &str) -> Option<Decision> {
    match input.trim().to_lowercase().as_str() {
        "save" | "s" | "y" | "yes" | "保存" => Some(Decision::Approve),
        "skip" | "n" | "no" | "跳过" => Some(Decision::Reject),
        "stop" | "q" | "quit" | "停止" => Some(Decision::Stop),
        _ => None,
    }
}

/// Parse a yes/no answer to the final save prompt.
pub fn parse_confirmation(input: &str) -> Option<bool> {
    match parse_decision(input) {
        Some(Decision::Approve) => Some(true),
        Some(Decision::Reject) => Some(false),
        _ => match input.trim().to_lowercase().as_str() {
            "discard" | "丢弃" => Some(false),
            _ => None,
        },
    }
}

/// Terminal operator gate
pub struct ConsoleGate<R, W> {
    reader: R,
    writer: W,
}

impl ConsoleGate<BufReader<Stdin>, Stdout> {
    /// Gate reading from stdin and prompting on stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> ConsoleGate<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    async fn prompt(&mut self, text: &str) -> Result<Option<String>, ContractError> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await?;
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}

impl<R, W> InteractionGate for ConsoleGate<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn ask(&mut self, request: &DecisionRequest) -> Result<Decision, ContractError> {
        let header = format!(
            "\n==================== 指令 {} ({}) ====================\n\
             tick {} | frames {}/{} | speed {:.1} km/h | saved {}\n",
            request.command.name(),
            request.command.code(),
            request.tick,
            request.frames_consumed,
            request.max_frames,
            request.speed_kmh,
            request.samples_saved,
        );
        self.writer.write_all(header.as_bytes()).await?;

        loop {
            let Some(line) = self.prompt("保存该段数据? [save/skip/stop] > ").await? else {
                info!("Operator input closed, stopping");
                return Ok(Decision::Stop);
            };
            match parse_decision(&line) {
                Some(decision) => {
                    debug!(?decision, command = %request.command, "Operator decided");
                    return Ok(decision);
                }
                None => {
                    self.writer
                        .write_all("无法识别，请输入 save/s/y、skip/n 或 stop/q\n".as_bytes())
                        .await?;
                }
            }
        }
    }

    async fn confirm_final_save(&mut self, pending: &PendingSegment) -> Result<bool, ContractError> {
        let question = format!(
            "\n缓冲区还有 {} 个 {} 样本未保存，是否保存? [y/n/discard] > ",
            pending.samples,
            pending.command.name()
        );
        loop {
            let Some(line) = self.prompt(&question).await? else {
                // 无法再询问时保留数据
                info!(samples = pending.samples, "Operator input closed, keeping pending samples");
                return Ok(true);
            };
            if let Some(save) = parse_confirmation(&line) {
                return Ok(save);
            }
        }
    }
}

/// Fixed policy for unattended collection
#[derive(Debug, Default, Clone)]
pub struct AutoApproveGate {
    approvals: u64,
}

impl AutoApproveGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn approvals(&self) -> u64 {
        self.approvals
    }
}

impl InteractionGate for AutoApproveGate {
    async fn ask(&mut self, request: &DecisionRequest) -> Result<Decision, ContractError> {
        self.approvals += 1;
        debug!(command = %request.command, tick = request.tick, "Auto-approving segment");
        Ok(Decision::Approve)
    }

    async fn confirm_final_save(&mut self, _pending: &PendingSegment) -> Result<bool, ContractError> {
        Ok(true)
    }
}

/// Gate answering from a predefined script
///
/// Once the script runs out every further question is answered with `Stop`.
#[derive(Debug, Default, Clone)]
pub struct ScriptedGate {
    decisions: VecDeque<Decision>,
    save_on_exit: bool,
    /// Every request seen, in order
    pub requests: Vec<DecisionRequest>,
    /// Every final-save prompt seen
    pub final_prompts: Vec<PendingSegment>,
}

impl ScriptedGate {
    pub fn new(decisions: impl IntoIterator<Item = Decision>, save_on_exit: bool) -> Self {
        Self {
            decisions: decisions.into_iter().collect(),
            save_on_exit,
            requests: Vec::new(),
            final_prompts: Vec::new(),
        }
    }
}

impl InteractionGate for ScriptedGate {
    async fn ask(&mut self, request: &DecisionRequest) -> Result<Decision, ContractError> {
        self.requests.push(*request);
        Ok(self.decisions.pop_front().unwrap_or(Decision::Stop))
    }

    async fn confirm_final_save(&mut self, pending: &PendingSegment) -> Result<bool, ContractError> {
        self.final_prompts.push(*pending);
        Ok(self.save_on_exit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::NavigationCommand;

    fn request() -> DecisionRequest {
        DecisionRequest {
            command: NavigationCommand::Left,
            tick: 12,
            frames_consumed: 0,
            max_frames: 100,
            speed_kmh: 25.0,
            samples_saved: 0,
        }
    }

    #[test]
    fn test_parse_decision_tokens() {
        for token in ["save", "S", "y", " YES \n", "保存"] {
            assert_eq!(parse_decision(token), Some(Decision::Approve), "{token}");
        }
        for token in ["skip", "n", "No", "跳过"] {
            assert_eq!(parse_decision(token), Some(Decision::Reject), "{token}");
        }
        for token in ["stop", "Q", "quit", "停止"] {
            assert_eq!(parse_decision(token), Some(Decision::Stop), "{token}");
        }
        for token in ["", "maybe", "sav", "yess"] {
            assert_eq!(parse_decision(token), None, "{token}");
        }
    }

    #[tokio::test]
    async fn test_console_gate_reprompts_until_understood() {
        let input: &[u8] = b"what\n\nSKIP\n";
        let mut gate = ConsoleGate::new(input, Vec::new());
        assert_eq!(gate.ask(&request()).await.unwrap(), Decision::Reject);

        let (_, output) = gate.into_inner();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches("[save/skip/stop]").count(), 3);
        assert!(text.contains("Left (3)"));
    }

    #[tokio::test]
    async fn test_console_gate_eof_stops() {
        let input: &[u8] = b"";
        let mut gate = ConsoleGate::new(input, Vec::new());
        assert_eq!(gate.ask(&request()).await.unwrap(), Decision::Stop);
    }

    #[tokio::test]
    async fn test_console_final_save() {
        let pending = PendingSegment {
            command: NavigationCommand::Right,
            samples: 37,
        };
        let input: &[u8] = b"hmm\nn\n";
        let mut gate = ConsoleGate::new(input, Vec::new());
        assert!(!gate.confirm_final_save(&pending).await.unwrap());

        let input: &[u8] = b"";
        let mut gate = ConsoleGate::new(input, Vec::new());
        assert!(gate.confirm_final_save(&pending).await.unwrap());
    }

    #[tokio::test]
    async fn test_console_final_save_offers_discard() {
        let pending = PendingSegment {
            command: NavigationCommand::Left,
            samples: 12,
        };
        let input: &[u8] = "丢弃\n".as_bytes();
        let mut gate = ConsoleGate::new(input, Vec::new());
        assert!(!gate.confirm_final_save(&pending).await.unwrap());

        let (_, output) = gate.into_inner();
        let text = String::from_utf8(output).unwrap();
        assert_eq!(text.matches("[y/n/discard]").count(), 1);

        let input: &[u8] = b" Discard \n";
        let mut gate = ConsoleGate::new(input, Vec::new());
        assert!(!gate.confirm_final_save(&pending).await.unwrap());
    }

    #[tokio::test]
    async fn test_auto_gate_always_approves() {
        let mut gate = AutoApproveGate::new();
        for _ in 0..3 {
            assert_eq!(gate.ask(&request()).await.unwrap(), Decision::Approve);
        }
        assert_eq!(gate.approvals(), 3);
    }

    #[tokio::test]
    async fn test_scripted_gate_runs_out_to_stop() {
        let mut gate = ScriptedGate::new([Decision::Reject], false);
        assert_eq!(gate.ask(&request()).await.unwrap(), Decision::Reject);
        assert_eq!(gate.ask(&request()).await.unwrap(), Decision::Stop);
        assert_eq!(gate.requests.len(), 2);
    }
}

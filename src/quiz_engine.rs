//! 测验会话引擎
//!
//! 对固定有序题目列表的状态机：一次只有一个活动下标。
//! `InProgress` 在最后一题提交后进入 `Completed`，显式 reset 回到初始态。
//! 判分规则：大小写不敏感、去首尾空白后的精确匹配，无部分得分。

use crate::models::{AppError, Question};
use serde::Serialize;

/// 文案分档阈值（>=90 顶档，>=70 中档）
const MESSAGE_TIER_TOP: u32 = 90;
const MESSAGE_TIER_MID: u32 = 70;

/// 颜色分档阈值（>=80 绿，>=60 黄，其余红）
const COLOR_TIER_GREEN: u32 = 80;
const COLOR_TIER_YELLOW: u32 = 60;

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    InProgress,
    Completed { score: usize },
}

/// 祝贺文案分档（与颜色分档阈值不同，二者都是合约的一部分）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum MessageTier {
    Top,
    Mid,
    Low,
}

impl MessageTier {
    pub fn feedback(&self) -> &'static str {
        match self {
            MessageTier::Top => "太棒了！你对这份材料的掌握非常扎实！",
            MessageTier::Mid => "不错！大部分内容已经掌握，继续巩固薄弱点。",
            MessageTier::Low => "建议重新阅读文档摘要后再试一次。",
        }
    }
}

/// 得分颜色分档（green/yellow/red 三色）
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ColorTier {
    Green,
    Yellow,
    Red,
}

/// 完成后的结果视图
#[derive(Debug, Clone, Serialize)]
pub struct QuizResult {
    pub score: usize,
    pub total: usize,
    pub percentage: u32,
    pub message_tier: MessageTier,
    pub color_tier: ColorTier,
}

pub fn percentage(score: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((score * 100) as f64 / total as f64).round() as u32
}

pub fn message_tier(percentage: u32) -> MessageTier {
    if percentage >= MESSAGE_TIER_TOP {
        MessageTier::Top
    } else if percentage >= MESSAGE_TIER_MID {
        MessageTier::Mid
    } else {
        MessageTier::Low
    }
}

pub fn color_tier(percentage: u32) -> ColorTier {
    if percentage >= COLOR_TIER_GREEN {
        ColorTier::Green
    } else if percentage >= COLOR_TIER_YELLOW {
        ColorTier::Yellow
    } else {
        ColorTier::Red
    }
}

/// 测验会话：每次进入测验界面新建，reset 丢弃，从不持久化
pub struct QuizSession {
    questions: Vec<Question>,
    answers: Vec<Option<String>>,
    current: usize,
    pending: Option<String>,
    state: SessionState,
}

impl QuizSession {
    pub fn new(questions: Vec<Question>) -> Result<Self, AppError> {
        if questions.is_empty() {
            return Err(AppError::validation("题目列表不能为空"));
        }
        let count = questions.len();
        Ok(Self {
            questions,
            answers: vec![None; count],
            current: 0,
            pending: None,
            state: SessionState::InProgress,
        })
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_question(&self) -> &Question {
        &self.questions[self.current]
    }

    pub fn pending_answer(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn recorded_answers(&self) -> &[Option<String>] {
        &self.answers
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.state, SessionState::Completed { .. })
    }

    /// 暂存当前题的待提交答案，不前进
    pub fn select_answer(&mut self, answer: impl Into<String>) -> Result<(), AppError> {
        if self.is_completed() {
            return Err(AppError::validation("测验已完成，请先重置再作答"));
        }
        self.pending = Some(answer.into());
        Ok(())
    }

    /// 记录当前答案并前进；在最后一题上提交则判分进入完成态。
    /// 待提交答案去空白后为空时拒绝，且不改变任何状态。
    pub fn advance(&mut self) -> Result<(), AppError> {
        if self.is_completed() {
            return Err(AppError::validation("测验已完成"));
        }
        let pending = match &self.pending {
            Some(text) if !text.trim().is_empty() => text.clone(),
            _ => return Err(AppError::validation("请先作答再进入下一题")),
        };

        self.answers[self.current] = Some(pending);

        if self.current + 1 == self.questions.len() {
            let score = self.compute_score();
            self.state = SessionState::Completed { score };
        } else {
            self.current += 1;
            // 来回导航时恢复之前记录过的答案
            self.pending = self.answers[self.current].clone();
        }
        Ok(())
    }

    /// 回退一题并把该题已记录的答案恢复为待提交答案；不重新判分
    pub fn retreat(&mut self) -> Result<(), AppError> {
        if self.is_completed() {
            return Err(AppError::validation("测验已完成"));
        }
        if self.current == 0 {
            return Err(AppError::validation("已经是第一题"));
        }
        self.current -= 1;
        self.pending = self.answers[self.current].clone();
        Ok(())
    }

    /// 丢弃全部记录回到初始态；幂等，不改动题目列表
    pub fn reset(&mut self) {
        self.answers = vec![None; self.questions.len()];
        self.current = 0;
        self.pending = None;
        self.state = SessionState::InProgress;
    }

    pub fn score(&self) -> Option<usize> {
        match self.state {
            SessionState::Completed { score } => Some(score),
            SessionState::InProgress => None,
        }
    }

    pub fn result(&self) -> Option<QuizResult> {
        let score = self.score()?;
        let total = self.questions.len();
        let percentage = percentage(score, total);
        Some(QuizResult {
            score,
            total,
            percentage,
            message_tier: message_tier(percentage),
            color_tier: color_tier(percentage),
        })
    }

    fn compute_score(&self) -> usize {
        self.questions
            .iter()
            .zip(self.answers.iter())
            .filter(|(question, answer)| match answer {
                Some(submitted) => normalize(submitted) == normalize(&question.correct_answer),
                None => false,
            })
            .count()
    }
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

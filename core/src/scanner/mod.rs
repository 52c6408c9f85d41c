// Scanner module - 诊断来源模块
// 定义诊断记录、外部 linter 的接入接口以及输出解析

pub mod manager;
pub mod parser;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

/// 单条诊断记录, 由解析器创建后不再修改
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub filepath: String,
    pub line: usize,
    pub column: usize,
    pub rule_code: String,
    pub raw_message: String,
}

impl Diagnostic {
    pub fn new(
        filepath: impl Into<String>,
        line: usize,
        column: usize,
        rule_code: impl Into<String>,
        raw_message: impl Into<String>,
    ) -> Self {
        Self {
            filepath: filepath.into(),
            line,
            column,
            rule_code: rule_code.into(),
            raw_message: raw_message.into(),
        }
    }

    /// `(filepath, line, column, rule_code)`, stable within one snapshot.
    pub fn key(&self) -> (&str, usize, usize, &str) {
        (&self.filepath, self.line, self.column, &self.rule_code)
    }
}

/// 一次 linter 运行的原始结果
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LintRun {
    /// Files the linter looked at, including the ones with no diagnostics.
    pub files: Vec<String>,
    /// Raw diagnostic text.
    pub output: String,
}

/// 诊断来源 trait - 外部 linter 进程或测试桩都需要实现此接口
#[async_trait]
pub trait DiagnosticSource: Send + Sync {
    /// 返回来源名称
    fn name(&self) -> String;

    /// 对项目运行一次检查
    async fn run(&self, project_path: &Path) -> Result<LintRun>;
}

/// Replays output captured elsewhere, e.g. a saved norminette log.
#[derive(Debug, Clone)]
pub struct TextSource {
    run: LintRun,
}

impl TextSource {
    pub fn new(output: impl Into<String>) -> Self {
        Self {
            run: LintRun {
                files: Vec::new(),
                output: output.into(),
            },
        }
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.run.files = files.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl DiagnosticSource for TextSource {
    fn name(&self) -> String {
        "TextSource".to_string()
    }

    async fn run(&self, _project_path: &Path) -> Result<LintRun> {
        Ok(self.run.clone())
    }
}

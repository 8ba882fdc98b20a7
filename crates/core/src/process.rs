//! 외부 프로세스 실행: 제한 시간과 명시적 결과를 갖는 서브프로세스 호출
//!
//! 모든 외부 도구(skopeo, trivy, singularity, gcloud) 호출은 이 모듈을 거칩니다.
//! 제한 시간을 넘기면 자식 프로세스는 `kill_on_drop`으로 종료됩니다.

use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::debug;

use crate::error::ProcessError;

/// 에러 메시지에 포함할 stderr 최대 길이 (바이트)
pub const STDERR_TAIL_LEN: usize = 512;

/// 실행할 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// 프로그램 이름 또는 경로
    pub program: String,
    /// 인자 목록 (쉘을 거치지 않음)
    pub args: Vec<String>,
    /// 제한 시간
    pub timeout: Duration,
}

impl CommandSpec {
    /// 새 명령을 생성합니다.
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout,
        }
    }

    /// 인자 하나를 추가합니다.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// 인자 여러 개를 추가합니다.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// 로그용 명령 문자열
    pub fn display(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// 완료된 프로세스의 출력
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// 종료 코드 (시그널로 종료되면 None)
    pub status: Option<i32>,
    /// 표준 출력
    pub stdout: String,
    /// 표준 에러
    pub stderr: String,
}

impl CommandOutput {
    /// 종료 코드 0 여부
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// 진단용 텍스트: stdout과 stderr를 합칩니다.
    pub fn diagnostic(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout, self.stderr),
        }
    }

    /// stderr의 마지막 [`STDERR_TAIL_LEN`] 바이트 (문자 경계 유지)
    pub fn stderr_tail(&self) -> String {
        tail(self.stderr.trim_end(), STDERR_TAIL_LEN).to_owned()
    }
}

/// `s`의 마지막 `max` 바이트 (문자 경계 유지)
pub fn tail(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}

fn status_label(status: Option<i32>) -> String {
    match status {
        Some(code) => format!("status {code}"),
        None => "signal".to_owned(),
    }
}

/// 명령을 실행하고 종료를 기다립니다.
///
/// 0이 아닌 종료 코드도 `Ok`로 반환합니다. 실패 판정은 호출자 몫입니다.
pub async fn run(spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
    debug!(command = %spec.display(), timeout_secs = spec.timeout.as_secs(), "running command");

    let child = Command::new(&spec.program)
        .args(&spec.args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| ProcessError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

    // 타임아웃 시 future가 drop되면서 child도 drop → kill
    let output = match tokio::time::timeout(spec.timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(source)) => {
            return Err(ProcessError::Spawn {
                program: spec.program.clone(),
                source,
            });
        }
        Err(_elapsed) => {
            return Err(ProcessError::Timeout {
                program: spec.program.clone(),
                timeout_secs: spec.timeout.as_secs(),
            });
        }
    };

    let result = CommandOutput {
        status: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(
        program = spec.program.as_str(),
        status = ?result.status,
        "command finished"
    );
    Ok(result)
}

/// 명령을 실행하고 0이 아닌 종료 코드를 에러로 변환합니다.
pub async fn run_checked(spec: &CommandSpec) -> Result<CommandOutput, ProcessError> {
    let output = run(spec).await?;
    if output.success() {
        Ok(output)
    } else {
        Err(ProcessError::NonZeroExit {
            program: spec.program.clone(),
            status: status_label(output.status),
            stderr: output.stderr_tail(),
        })
    }
}

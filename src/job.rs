use uuid::Uuid;

use crate::webhook::PushPayload;

/// Maximum size for captured output before truncation (1MB)
pub const MAX_OUTPUT_SIZE: usize = 1024 * 1024;

/// One triggered deployment, as seen by the log
#[derive(Debug, Clone)]
pub struct Deployment {
    pub id: String,
    pub branch: Option<String>,
    pub repository: Option<String>,
    pub pusher: Option<String>,
}

impl Deployment {
    /// Create a deployment record for an accepted push
    pub fn from_push(branch: Option<String>, payload: Option<&PushPayload>) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            branch,
            repository: payload
                .and_then(|p| p.repository_name())
                .map(String::from),
            pusher: payload.and_then(|p| p.pusher_name()).map(String::from),
        }
    }
}

/// Outcome of running the deploy command. Logged, never sent to the caller.
#[derive(Debug, Clone, Default)]
pub struct DeploymentResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub error_message: Option<String>,
    pub output_truncated: bool,
}

impl DeploymentResult {
    /// Result of a command that exited cleanly (truncates if too large)
    pub fn succeeded(stdout: String, stderr: String) -> Self {
        let mut result = Self {
            success: true,
            ..Self::default()
        };
        result.stdout = result.truncate(stdout);
        result.stderr = result.truncate(stderr);
        result
    }

    /// Result of a command that failed, timed out or never started
    pub fn failed(error_message: String, stdout: String, stderr: String) -> Self {
        let mut result = Self {
            success: false,
            error_message: Some(error_message),
            ..Self::default()
        };
        result.stdout = result.truncate(stdout);
        result.stderr = result.truncate(stderr);
        result
    }

    fn truncate(&mut self, mut output: String) -> String {
        if output.len() > MAX_OUTPUT_SIZE {
            let mut cut = MAX_OUTPUT_SIZE;
            while !output.is_char_boundary(cut) {
                cut -= 1;
            }
            output.truncate(cut);
            output.push_str("\n... (output truncated)");
            self.output_truncated = true;
        }
        output
    }
}

use serde::{Deserialize, Serialize};

/// Canonical pipeline stage, independent of the exact step name a workflow
/// file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    EnvCheck,
    InstallDeps,
    Test,
    DockerBuild,
    DockerRun,
    VerifyRunning,
    LogScan,
    /// Live job with no steps reported yet.
    Initializing,
    /// Live job with no active or queued step left.
    Finalizing,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Success,
    Failure,
}

/// Failure taxonomy consumed by the retry trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureType {
    Success,
    EnvNotConfigured,
    DependencyInstallError,
    TestFailure,
    DockerBuildError,
    ContainerBootError,
    RuntimeFatal,
    UnknownFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunClassification {
    pub status: JobStatus,
    #[serde(rename = "type")]
    pub failure_type: FailureType,
    pub stage: Stage,
    pub retryable: bool,
    pub confidence: f64,
}

/// One CI step as reported by the workflow run, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepObservation {
    pub name: String,
    /// `success`/`failure` once the step finished; `None` while pending.
    pub conclusion: Option<String>,
    /// `queued`/`in_progress`/`completed` for live jobs.
    pub status: Option<String>,
}

/// A completed or failed CI job as observed from the webhook payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobObservation {
    pub status: JobStatus,
    /// Steps in declaration order. Ordering is load-bearing: classification
    /// uses the first failed step.
    #[serde(default)]
    pub steps: Vec<StepObservation>,
}

/// Exact-match lookup from a raw step name to its canonical stage.
pub fn map_step_name(raw: &str) -> Stage {
    match raw {
        "Check environment" => Stage::EnvCheck,
        "Install dependencies" => Stage::InstallDeps,
        "Run tests" => Stage::Test,
        "Build Docker image" => Stage::DockerBuild,
        "Run Docker container" => Stage::DockerRun,
        "Verify container running" => Stage::VerifyRunning,
        "Scan container logs" => Stage::LogScan,
        _ => Stage::Unknown,
    }
}

/// Stage of a completed job: the first step (declaration order) whose
/// conclusion is `failure`; `Unknown` when no step failed despite the job
/// failing.
pub fn stage_of_completed_job(steps: &[StepObservation]) -> Stage {
    steps
        .iter()
        .find(|s| s.conclusion.as_deref() == Some("failure"))
        .map_or(Stage::Unknown, |s| map_step_name(&s.name))
}

/// Stage of a live (in-progress) job: `Initializing` before any step is
/// reported, the currently active or queued step while one exists, and
/// `Finalizing` once none is left.
pub fn stage_of_live_job(steps: &[StepObservation]) -> Stage {
    if steps.is_empty() {
        return Stage::Initializing;
    }
    steps
        .iter()
        .find(|s| matches!(s.status.as_deref(), Some("in_progress" | "queued")))
        .map_or(Stage::Finalizing, |s| map_step_name(&s.name))
}

/// Deterministic (status, stage) → classification table. Never errors:
/// unrecognized inputs degrade to `UNKNOWN_FAILURE` with low confidence.
pub fn classify(observation: &JobObservation) -> RunClassification {
    if observation.status == JobStatus::Success {
        return RunClassification {
            status: JobStatus::Success,
            failure_type: FailureType::Success,
            stage: Stage::Unknown,
            retryable: false,
            confidence: 1.0,
        };
    }

    let stage = stage_of_completed_job(&observation.steps);
    classify_failed_stage(stage)
}

/// Classification row for a failed job at a known stage.
pub fn classify_failed_stage(stage: Stage) -> RunClassification {
    let (failure_type, retryable, confidence) = match stage {
        Stage::EnvCheck => (FailureType::EnvNotConfigured, false, 0.95),
        Stage::InstallDeps => (FailureType::DependencyInstallError, true, 0.90),
        Stage::Test => (FailureType::TestFailure, true, 0.85),
        Stage::DockerBuild => (FailureType::DockerBuildError, false, 0.90),
        Stage::DockerRun | Stage::VerifyRunning => {
            (FailureType::ContainerBootError, false, 0.85)
        }
        Stage::LogScan => (FailureType::RuntimeFatal, false, 0.90),
        Stage::Initializing | Stage::Finalizing | Stage::Unknown => {
            (FailureType::UnknownFailure, false, 0.40)
        }
    };
    RunClassification {
        status: JobStatus::Failure,
        failure_type,
        stage,
        retryable,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn step(name: &str, conclusion: Option<&str>) -> StepObservation {
        StepObservation {
            name: name.into(),
            conclusion: conclusion.map(str::to_owned),
            status: None,
        }
    }

    fn live_step(name: &str, status: &str) -> StepObservation {
        StepObservation {
            name: name.into(),
            conclusion: None,
            status: Some(status.into()),
        }
    }

    #[test]
    fn success_classifies_as_success() {
        let result = classify(&JobObservation {
            status: JobStatus::Success,
            steps: vec![],
        });
        assert_eq!(result.failure_type, FailureType::Success);
        assert!(!result.retryable);
        assert!((result.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[rstest]
    #[case(Stage::EnvCheck, FailureType::EnvNotConfigured, false, 0.95)]
    #[case(Stage::InstallDeps, FailureType::DependencyInstallError, true, 0.90)]
    #[case(Stage::Test, FailureType::TestFailure, true, 0.85)]
    #[case(Stage::DockerBuild, FailureType::DockerBuildError, false, 0.90)]
    #[case(Stage::DockerRun, FailureType::ContainerBootError, false, 0.85)]
    #[case(Stage::VerifyRunning, FailureType::ContainerBootError, false, 0.85)]
    #[case(Stage::LogScan, FailureType::RuntimeFatal, false, 0.90)]
    #[case(Stage::Unknown, FailureType::UnknownFailure, false, 0.40)]
    fn classification_table(
        #[case] stage: Stage,
        #[case] expected: FailureType,
        #[case] retryable: bool,
        #[case] confidence: f64,
    ) {
        let result = classify_failed_stage(stage);
        assert_eq!(result.failure_type, expected);
        assert_eq!(result.retryable, retryable);
        assert!((result.confidence - confidence).abs() < f64::EPSILON);
    }

    #[test]
    fn first_failed_step_wins() {
        let steps = vec![
            step("Check environment", Some("success")),
            step("Install dependencies", Some("failure")),
            step("Run tests", Some("failure")),
        ];
        assert_eq!(stage_of_completed_job(&steps), Stage::InstallDeps);

        let result = classify(&JobObservation {
            status: JobStatus::Failure,
            steps,
        });
        assert_eq!(result.failure_type, FailureType::DependencyInstallError);
        assert!(result.retryable);
    }

    #[test]
    fn no_failed_step_despite_job_failure_is_unknown() {
        let steps = vec![step("Run tests", Some("success"))];
        let result = classify(&JobObservation {
            status: JobStatus::Failure,
            steps,
        });
        assert_eq!(result.failure_type, FailureType::UnknownFailure);
        assert!((result.confidence - 0.40).abs() < f64::EPSILON);
    }

    #[test]
    fn unrecognized_step_name_maps_to_unknown() {
        assert_eq!(map_step_name("Deploy to staging"), Stage::Unknown);
        let steps = vec![step("Deploy to staging", Some("failure"))];
        let result = classify(&JobObservation {
            status: JobStatus::Failure,
            steps,
        });
        assert_eq!(result.failure_type, FailureType::UnknownFailure);
        assert!(!result.retryable);
    }

    #[test]
    fn live_job_stages() {
        assert_eq!(stage_of_live_job(&[]), Stage::Initializing);

        let running = vec![
            live_step("Check environment", "completed"),
            live_step("Run tests", "in_progress"),
        ];
        assert_eq!(stage_of_live_job(&running), Stage::Test);

        let queued = vec![
            live_step("Check environment", "completed"),
            live_step("Build Docker image", "queued"),
        ];
        assert_eq!(stage_of_live_job(&queued), Stage::DockerBuild);

        let done = vec![live_step("Check environment", "completed")];
        assert_eq!(stage_of_live_job(&done), Stage::Finalizing);
    }

    #[test]
    fn serialized_taxonomy_names() {
        let result = classify_failed_stage(Stage::Test);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["type"], "TEST_FAILURE");
        assert_eq!(json["stage"], "TEST");
        assert_eq!(json["retryable"], true);
    }
}

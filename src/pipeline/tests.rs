use super::*;
use crate::generation::GenerationRequest;
use crate::status_log::load_records;
use serde_json::json;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

/// Hands out canned responses in order and remembers every request.
struct ScriptedGenerator {
    responses: RefCell<VecDeque<Result<String, GenerationError>>>,
    requests: RefCell<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    fn new(responses: Vec<Result<String, GenerationError>>) -> Self {
        Self {
            responses: RefCell::new(responses.into()),
            requests: RefCell::new(Vec::new()),
        }
    }

    fn ok(responses: &[&str]) -> Self {
        Self::new(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    fn purposes(&self) -> Vec<String> {
        self.requests
            .borrow()
            .iter()
            .map(|request| request.purpose.clone())
            .collect()
    }
}

impl Generator for ScriptedGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.borrow_mut().push(request.clone());
        self.responses
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(GenerationError::Empty))
    }
}

struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    schemas: SchemaRegistry,
    store: ArtifactStore,
    recorder: StatusRecorder,
    generation: GenerationConfig,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let root = dir.path().to_path_buf();
        let mut schemas = SchemaRegistry::default();
        schemas
            .insert(
                ArtifactKind::Structure,
                root.join("structure.schema.json"),
                &json!({"type": "object", "required": ["lib"]}),
            )
            .unwrap();
        schemas
            .insert(
                ArtifactKind::Models,
                root.join("models.schema.json"),
                &json!({"type": "object", "required": ["models"]}),
            )
            .unwrap();
        schemas
            .insert(
                ArtifactKind::OtherValues,
                root.join("other_values.schema.json"),
                &json!({"type": "object"}),
            )
            .unwrap();
        Self {
            store: ArtifactStore::new(root.join("alignment_files")),
            recorder: StatusRecorder::new(root.join("state_report.json")),
            generation: GenerationConfig::default(),
            schemas,
            root,
            _dir: dir,
        }
    }

    fn run(&self, generator: &ScriptedGenerator) -> Result<RunSummary, PipelineError> {
        let subject = Subject {
            text: "Crossword app".to_string(),
        };
        Pipeline::new(
            generator,
            &self.schemas,
            &self.store,
            &self.recorder,
            &self.generation,
        )
        .run(&subject)
    }

    fn artifact(&self, name: &str) -> PathBuf {
        self.store.path_for(name)
    }

    fn records(&self) -> Vec<(String, StageStatus, String)> {
        load_records(self.recorder.path())
            .unwrap()
            .into_iter()
            .map(|record| (record.file, record.status, record.details))
            .collect()
    }
}

fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

const STRUCTURE: &str = "Here you go:\n```json\n{\"lib\": {\"main.dart\": null}}\n```";
const MODELS: &str = "```json\n{\"models\": {\"Puzzle\": {\"id\": \"String\"}}}\n```";
const OTHER_VALUES: &str = "{\"colors\": {\"primary\": \"#3366FF\"}}";

#[test]
fn all_stages_succeed_in_order() {
    let fixture = Fixture::new();
    let generator = ScriptedGenerator::ok(&[STRUCTURE, MODELS, OTHER_VALUES]);

    let summary = fixture.run(&generator).unwrap();

    assert_eq!(summary.artifacts.len(), 3);
    assert_eq!(
        generator.purposes(),
        ["structure.json", "models.json", "other_values.json"]
    );
    assert_eq!(
        read_json(&fixture.artifact("structure.json")),
        json!({"lib": {"main.dart": null}})
    );
    assert_eq!(
        read_json(&fixture.artifact("other_values.json")),
        json!({"colors": {"primary": "#3366FF"}})
    );

    let records = fixture.records();
    assert_eq!(records.len(), 3);
    assert!(records
        .iter()
        .all(|(_, status, _)| *status == StageStatus::Success));
    assert_eq!(
        records[0].2,
        "structure.json generated and validated successfully."
    );
}

#[test]
fn later_stages_receive_earlier_artifacts() {
    let fixture = Fixture::new();
    let generator = ScriptedGenerator::ok(&[STRUCTURE, MODELS, OTHER_VALUES]);
    fixture.run(&generator).unwrap();

    let requests = generator.requests.borrow();
    let models_context: Vec<&str> = requests[1]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect();
    assert!(models_context.iter().any(|c| c.contains("\"main.dart\"")));
    assert!(models_context.iter().any(|c| c.contains("Crossword app")));

    let other_context = requests[2]
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    assert!(other_context.contains("\"Puzzle\""));
    assert!(other_context.contains("\"main.dart\""));
}

#[test]
fn unparseable_models_stops_the_run() {
    let fixture = Fixture::new();
    let generator = ScriptedGenerator::ok(&[
        STRUCTURE,
        "Sorry, I cannot produce models for this app.",
        OTHER_VALUES,
    ]);

    let err = fixture.run(&generator).unwrap_err();

    match &err {
        PipelineError::Stage { file, source } => {
            assert_eq!(*file, "models.json");
            assert!(matches!(source, StageError::Parse { .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(generator.calls(), 2);
    assert!(fixture.artifact("structure.json").exists());
    assert!(!fixture.artifact("models.json").exists());
    assert!(!fixture.artifact("other_values.json").exists());

    let records = fixture.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].0, "models.json");
    assert_eq!(records[1].1, StageStatus::Failure);
    assert!(records[1].2.contains("not valid JSON"), "{}", records[1].2);
}

#[test]
fn validation_failure_keeps_previous_artifact() {
    let fixture = Fixture::new();
    let previous = json!({"models": {"Old": {}}});
    fixture.store.save(&previous, "models.json").unwrap();
    let generator = ScriptedGenerator::ok(&[STRUCTURE, "{\"entities\": []}"]);

    let err = fixture.run(&generator).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Stage {
            source: StageError::Validation(_),
            ..
        }
    ));
    assert_eq!(read_json(&fixture.artifact("models.json")), previous);
    let records = fixture.records();
    assert!(records[1].2.contains("models"), "{}", records[1].2);
}

#[test]
fn generation_error_is_recorded_with_cause() {
    let fixture = Fixture::new();
    let generator = ScriptedGenerator::new(vec![Err(GenerationError::Transport(
        "connection refused".to_string(),
    ))]);

    let err = fixture.run(&generator).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Stage {
            file: "structure.json",
            source: StageError::Generation(GenerationError::Transport(_))
        }
    ));
    let records = fixture.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].1, StageStatus::Failure);
    assert!(records[0].2.contains("connection refused"));
}

#[test]
fn missing_schema_is_a_configuration_error() {
    let mut fixture = Fixture::new();
    fixture.schemas = SchemaRegistry::default();
    let generator = ScriptedGenerator::ok(&[STRUCTURE]);

    let err = fixture.run(&generator).unwrap_err();

    assert!(matches!(err, PipelineError::Config(_)));
    assert_eq!(generator.calls(), 0);
    assert!(!fixture.recorder.path().exists());
}

#[test]
fn artifact_write_failure_is_a_persistence_failure() {
    let mut fixture = Fixture::new();
    let blocker = fixture.root.join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    fixture.store = ArtifactStore::new(blocker);
    let generator = ScriptedGenerator::ok(&[STRUCTURE]);

    let err = fixture.run(&generator).unwrap_err();

    match err {
        PipelineError::Stage { source, .. } => assert!(source.is_persistence()),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(fixture.records()[0].1, StageStatus::Failure);
}

#[test]
fn status_log_failure_is_reported_on_its_own() {
    let mut fixture = Fixture::new();
    let log_dir = fixture.root.join("report_dir");
    fs::create_dir(&log_dir).unwrap();
    fixture.recorder = StatusRecorder::new(log_dir);
    let generator = ScriptedGenerator::ok(&[STRUCTURE, MODELS, OTHER_VALUES]);

    let err = fixture.run(&generator).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::StatusLog {
            file: "structure.json",
            status: StageStatus::Success,
            stage: None,
            ..
        }
    ));
    assert_eq!(generator.calls(), 1);
}

#[test]
fn status_log_failure_keeps_the_stage_failure() {
    let mut fixture = Fixture::new();
    let log_dir = fixture.root.join("report_dir");
    fs::create_dir(&log_dir).unwrap();
    fixture.recorder = StatusRecorder::new(log_dir);
    let generator = ScriptedGenerator::new(vec![Err(GenerationError::Transport(
        "connection refused".to_string(),
    ))]);

    let err = fixture.run(&generator).unwrap_err();

    let message = err.to_string();
    assert!(message.contains("status log"), "{message}");
    assert!(message.contains("connection refused"), "{message}");
    assert!(matches!(
        err,
        PipelineError::StatusLog {
            file: "structure.json",
            status: StageStatus::Failure,
            stage: Some(StageError::Generation(GenerationError::Transport(_))),
            ..
        }
    ));
}

#[test]
fn generation_parameters_reach_the_generator() {
    let mut fixture = Fixture::new();
    fixture.generation = GenerationConfig {
        model: "local-model".to_string(),
        temperature: 0.4,
        ..GenerationConfig::default()
    };
    let generator = ScriptedGenerator::ok(&[STRUCTURE, MODELS, OTHER_VALUES]);
    fixture.run(&generator).unwrap();

    let requests = generator.requests.borrow();
    assert!(requests.iter().all(|r| r.model == "local-model"));
    assert!(requests.iter().all(|r| r.temperature == 0.4));
    let limits: Vec<u32> = requests.iter().map(|r| r.max_tokens).collect();
    assert_eq!(limits, [10_000, 5_000, 5_000]);
}

#[test]
fn generation_log_records_each_call() {
    use crate::generation::lm_log::{load_entries, GenerationOutcome};
    use crate::workspace::{AlignerConfig, WorkspacePaths};

    let fixture = Fixture::new();
    let paths = WorkspacePaths::new(fixture.root.clone(), &AlignerConfig::default());
    let log = GenerationLog::new(paths.clone(), false);
    let generator = ScriptedGenerator::ok(&[STRUCTURE, "not json"]);
    let subject = Subject {
        text: "Crossword app".to_string(),
    };

    let result = Pipeline::new(
        &generator,
        &fixture.schemas,
        &fixture.store,
        &fixture.recorder,
        &fixture.generation,
    )
    .with_generation_log(&log)
    .run(&subject);

    assert!(result.is_err());
    let entries = load_entries(&paths).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].purpose, "models.json");
    // The call itself succeeded; the parse failure is a stage concern.
    assert_eq!(entries[1].outcome, GenerationOutcome::Success);
}

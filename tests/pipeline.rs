//! End-to-end pipeline: generation with a fake randomizer, then grading
//! in a "separate run" that only sees the persisted answer key.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use mucher::{ExamConfig, ExamGenerator, ExamGrader, MucherResult, Randomizer, SubmissionError};

/// Stands in for the 'much' process: checks the control inputs are in place
/// and writes fixture output artifacts.
struct FakeRandomizer {
    captured_control: RefCell<Option<String>>,
}

impl FakeRandomizer {
    fn new() -> Self {
        Self {
            captured_control: RefCell::new(None),
        }
    }
}

impl Randomizer for FakeRandomizer {
    fn run(&self, dir: &Path) -> MucherResult<()> {
        // the adapter must have staged the inputs before invoking us
        assert!(dir.join("exam.tex").exists());
        assert!(dir.join("cinematica-0").exists());
        assert!(dir.join("cinematica-1").exists());
        let control = fs::read_to_string(dir.join("description"))?;
        *self.captured_control.borrow_mut() = Some(control);

        fs::write(
            dir.join("mc-output.tex"),
            "\\def\\mcserialnumber{10}\\mcpaperheader\n\
             \\def\\mcquestionnumber{1}\\mcquestionheader primo testo\n\
             \\def\\mcquestionnumber{2}\\mcquestionheader secondo testo\n\
             \\mcpaperfooter\n\
             \\def\\mcserialnumber{11}\\mcpaperheader\n\
             \\def\\mcquestionnumber{1}\\mcquestionheader primo testo\n\
             \\def\\mcquestionnumber{2}\\mcquestionheader secondo testo\n\
             \\mcpaperfooter\n",
        )?;
        fs::write(
            dir.join("mc-serials.txt"),
            "serial questions answers\n\
             10 cinematica-0 cinematica-1 AC\n\
             11 cinematica-1 cinematica-0 BA\n",
        )?;
        Ok(())
    }
}

fn write_bank(dir: &Path) -> String {
    let path = dir.join("cinematica.csv");
    fs::write(
        &path,
        "Domanda,Corretta,Alt 1,Alt 2,Alt 3,N\n\
         v media?,s/t,s*t,t/s,,3\n\
         moto uniforme?,a=0,v=0,s=0,a=g,4\n",
    )
    .unwrap();
    path.display().to_string()
}

fn test_config(dir: &Path) -> ExamConfig {
    ExamConfig {
        question_file: write_bank(dir),
        results_file: dir.join("elaborati.csv").display().to_string(),
        output_dir: dir.join("out").display().to_string(),
        num_variants: 2,
        serial_start: 10,
        usage_per_category: 2,
        compile_pdf: false,
        ..ExamConfig::default()
    }
}

#[test]
fn generate_then_grade_round_trip() {
    let work = tempfile::tempdir().unwrap();
    let config = test_config(work.path());
    let out_dir = Path::new(&config.output_dir);

    let runner = FakeRandomizer::new();
    let key = ExamGenerator::new(config.clone()).generate(&runner).unwrap();

    assert_eq!(key.len(), 2);
    assert_eq!(key.get(10).unwrap().labels, vec!["A", "C"]);
    assert_eq!(key.get(11).unwrap().labels, vec!["B", "A"]);
    assert!(out_dir.join("answer_key.csv").exists());
    assert!(out_dir.join("exam.tex").exists());
    assert!(out_dir.join("mc-output.tex").exists());

    // grading runs later, against the persisted key only
    fs::write(
        &config.results_file,
        "studente,seriale,1,2\n\
         anna,10,A,C\n\
         bruno,11,-,A\n\
         carla,999,B,B\n",
    )
    .unwrap();

    let (results, errors) = ExamGrader::new(config.clone()).grade().unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].student, "anna");
    assert_eq!(results[0].score, 8.0);
    assert_eq!(results[1].student, "bruno");
    assert_eq!(results[1].score, 5.0);
    assert_eq!(
        errors,
        vec![SubmissionError::UnknownSerial { row: 4, serial: 999 }]
    );

    let graded = fs::read_to_string(out_dir.join("elaborati_corretti.csv")).unwrap();
    assert_eq!(
        graded,
        "studente,seriale,1,2,score\n\
         anna,10,A,C,8\n\
         bruno,11,-,A,5\n\
         carla,999,B,B,\n"
    );

    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out_dir.join("report.json")).unwrap()).unwrap();
    assert_eq!(report["cinematica"]["correct"], 3);
    assert_eq!(report["cinematica"]["missing"], 1);
    assert_eq!(report["cinematica"]["incorrect"], 0);
}

#[test]
fn repeated_generation_stages_identical_control_files() {
    let work = tempfile::tempdir().unwrap();
    let config = test_config(work.path());

    let first = FakeRandomizer::new();
    ExamGenerator::new(config.clone()).generate(&first).unwrap();
    let second = FakeRandomizer::new();
    ExamGenerator::new(config).generate(&second).unwrap();

    let first = first.captured_control.borrow().clone().unwrap();
    let second = second.captured_control.borrow().clone().unwrap();
    assert!(!first.is_empty());
    assert_eq!(first, second);
    assert!(first.contains("seed 42;"));
    assert!(first.contains("serial 10;"));
    assert!(first.contains("use 2 from \"cinematica-*\";"));
    assert!(first.contains("create 2;"));
}

//! Bridge to the external 'much' randomizer: control/question file emission,
//! scoped process invocation, and output parsing.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use log::{debug, info, warn};
use tempfile::TempDir;

use crate::config::{ExamConfig, GenerationSpec};
use crate::error::{MucherError, MucherResult};
use crate::excel;
use crate::key::AnswerKey;
use crate::latex;
use crate::pool::{QuestionPool, QuestionRef};

/// Control file read by 'much' from its working directory
pub const CONTROL_FILE: &str = "description";
/// LaTeX document produced by 'much'
pub const OUTPUT_DOCUMENT: &str = "mc-output.tex";
/// Tabular serial/question/answer artifact produced by 'much'
pub const SERIALS_TABLE: &str = "mc-serials.txt";

/// Marker line separating prompt and answers in a question file
const ANSWER_MARKER: &str = ".";
/// Mode selector and control-file name fed to 'much' on stdin
const CREATE_INPUT: &[u8] = b"c\ndescription\n";

const SERIAL_MARKER: &str = "\\mcserialnumber{";
const QUESTION_MARKER: &str = "\\mcquestionnumber{";

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// One generated exam instance, recovered from the serials table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedVariant {
    pub serial: u64,
    /// Which variant was drawn for each position, in display order
    pub questions: Vec<QuestionRef>,
    /// Correct-answer label per position, after the randomizer's shuffle
    pub labels: Vec<String>,
}

/// The black-box randomizer boundary. The real implementation spawns 'much';
/// tests substitute a fake that writes fixture artifacts.
pub trait Randomizer {
    fn run(&self, dir: &Path) -> MucherResult<()>;
}

/// Runs the real 'much' binary with the creation mode and control-file name
/// supplied over stdin.
pub struct MuchProcess {
    binary: String,
}

impl MuchProcess {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Randomizer for MuchProcess {
    fn run(&self, dir: &Path) -> MucherResult<()> {
        info!("Running '{}' to generate exam variants", self.binary);

        let mut child = Command::new(&self.binary)
            .current_dir(dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                MucherError::GeneratorInvocation(format!(
                    "failed to start '{}': {}",
                    self.binary, e
                ))
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(CREATE_INPUT).map_err(|e| {
                MucherError::GeneratorInvocation(format!("failed to write to stdin: {}", e))
            })?;
        }

        let output = child.wait_with_output().map_err(|e| {
            MucherError::GeneratorInvocation(format!("'{}' did not complete: {}", self.binary, e))
        })?;

        debug!("much stdout: {}", String::from_utf8_lossy(&output.stdout));
        if !output.stderr.is_empty() {
            debug!("much stderr: {}", String::from_utf8_lossy(&output.stderr));
        }
        if !output.status.success() {
            return Err(MucherError::GeneratorInvocation(format!(
                "'{}' exited with {}: {}",
                self.binary,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        for artifact in [OUTPUT_DOCUMENT, SERIALS_TABLE] {
            if !dir.join(artifact).exists() {
                return Err(MucherError::GeneratorInvocation(format!(
                    "'{}' completed but produced no {}",
                    self.binary, artifact
                )));
            }
        }
        Ok(())
    }
}

/// Write one 'much'-native file per question: prompt, marker, answers each
/// followed by a marker, correct answer first. That ordering is load-bearing:
/// the randomizer treats position 0 as the correct answer before reshuffling.
pub fn write_question_files(pool: &QuestionPool, dir: &Path) -> MucherResult<()> {
    for (category, questions) in pool.categories() {
        for (index, question) in questions.iter().enumerate() {
            let mut content = String::new();
            content.push_str(&question.prompt);
            content.push('\n');
            content.push_str(ANSWER_MARKER);
            content.push('\n');
            for answer in &question.answers {
                content.push_str(answer);
                content.push('\n');
                content.push_str(ANSWER_MARKER);
                content.push('\n');
            }
            let name = QuestionRef::new(category, index).to_string();
            fs::write(dir.join(&name), content)?;
            debug!("Wrote question file: {}", name);
        }
    }
    Ok(())
}

/// Render the control file. Categories are emitted in name order so the
/// output is byte-identical for identical inputs.
pub fn render_control_file(pool: &QuestionPool, spec: &GenerationSpec) -> MucherResult<String> {
    let mut out = String::new();
    out.push_str("directory \".\";\n");
    out.push_str(&format!("seed {};\n", spec.seed));
    out.push_str(&format!("serial {};\n", spec.serial_start));
    for (category, questions) in pool.categories() {
        let usage = spec.usage.for_category(category);
        if usage as usize > questions.len() {
            return Err(MucherError::UsageExceedsPool {
                category: category.to_string(),
                requested: usage,
                available: questions.len(),
            });
        }
        out.push_str(&format!("use {} from \"{}-*\";\n", usage, category));
    }
    out.push_str(&format!("create {};\n", spec.num_variants));
    Ok(out)
}

pub fn write_control_file(
    pool: &QuestionPool,
    spec: &GenerationSpec,
    dir: &Path,
) -> MucherResult<()> {
    let content = render_control_file(pool, spec)?;
    fs::write(dir.join(CONTROL_FILE), content)?;
    debug!("Wrote control file: {}", dir.join(CONTROL_FILE).display());
    Ok(())
}

/// Parse the serials table: a header line, then per line the serial number,
/// one question-ref token per position, and a final label string with one
/// letter per question.
pub fn parse_serials_table(text: &str) -> MucherResult<Vec<SerializedVariant>> {
    let inconsistent = MucherError::GeneratorOutputInconsistent;
    let mut variants = Vec::new();

    for (i, line) in text.lines().enumerate().skip(1) {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 3 {
            return Err(inconsistent(format!(
                "serials line {}: {} fields, expected serial, questions and labels",
                i + 1,
                tokens.len()
            )));
        }

        let serial: u64 = tokens[0].parse().map_err(|_| {
            inconsistent(format!(
                "serials line {}: unparseable serial '{}'",
                i + 1,
                tokens[0]
            ))
        })?;

        let label_token = tokens[tokens.len() - 1];
        let refs = &tokens[1..tokens.len() - 1];
        if refs.len() != label_token.chars().count() {
            return Err(inconsistent(format!(
                "serial {}: {} questions but {} answer labels",
                serial,
                refs.len(),
                label_token.chars().count()
            )));
        }

        let questions = refs
            .iter()
            .map(|&token| {
                QuestionRef::parse(token).ok_or_else(|| {
                    inconsistent(format!("serial {}: malformed question ref '{}'", serial, token))
                })
            })
            .collect::<MucherResult<Vec<_>>>()?;
        let labels = label_token
            .chars()
            .map(|c| c.to_ascii_uppercase().to_string())
            .collect();

        variants.push(SerializedVariant {
            serial,
            questions,
            labels,
        });
    }
    Ok(variants)
}

/// Extract only the structural markers from the LaTeX artifact: each
/// `\mcserialnumber{N}` starts a paper, each `\mcquestionnumber{..}` is one
/// question. The typesetting around them stays opaque.
pub fn parse_document_markers(text: &str) -> MucherResult<Vec<(u64, usize)>> {
    let inconsistent = MucherError::GeneratorOutputInconsistent;
    let mut papers: Vec<(u64, usize)> = Vec::new();
    let mut rest = text;

    loop {
        let serial_at = rest.find(SERIAL_MARKER);
        let question_at = rest.find(QUESTION_MARKER);
        // whichever marker appears first is the next structural event
        let (serial_is_next, at) = match (serial_at, question_at) {
            (None, None) => break,
            (Some(s), None) => (true, s),
            (None, Some(q)) => (false, q),
            (Some(s), Some(q)) if s < q => (true, s),
            (_, Some(q)) => (false, q),
        };

        if serial_is_next {
            let after = &rest[at + SERIAL_MARKER.len()..];
            let end = after
                .find('}')
                .ok_or_else(|| inconsistent("unterminated serial marker".to_string()))?;
            let serial = after[..end].trim().parse().map_err(|_| {
                inconsistent(format!("unparseable serial marker '{}'", &after[..end]))
            })?;
            papers.push((serial, 0));
            rest = &after[end + 1..];
        } else {
            let after = &rest[at + QUESTION_MARKER.len()..];
            let end = after
                .find('}')
                .ok_or_else(|| inconsistent("unterminated question marker".to_string()))?;
            let paper = papers.last_mut().ok_or_else(|| {
                inconsistent("question marker before any serial marker".to_string())
            })?;
            paper.1 += 1;
            rest = &after[end + 1..];
        }
    }
    Ok(papers)
}

/// Cross-check the two output artifacts: same serials in the same order,
/// same question count per serial.
pub fn reconcile(variants: &[SerializedVariant], markers: &[(u64, usize)]) -> MucherResult<()> {
    let inconsistent = MucherError::GeneratorOutputInconsistent;

    if variants.len() != markers.len() {
        return Err(inconsistent(format!(
            "document has {} papers, serials table has {}",
            markers.len(),
            variants.len()
        )));
    }
    for (variant, (serial, count)) in variants.iter().zip(markers) {
        if variant.serial != *serial {
            return Err(inconsistent(format!(
                "document serial {} does not match table serial {}",
                serial, variant.serial
            )));
        }
        if variant.questions.len() != *count {
            return Err(inconsistent(format!(
                "serial {}: document has {} questions, table lists {}",
                serial,
                count,
                variant.questions.len()
            )));
        }
    }
    Ok(())
}

/// Drives the full generation pipeline around a Randomizer implementation
pub struct ExamGenerator {
    config: ExamConfig,
}

impl ExamGenerator {
    pub fn new(config: ExamConfig) -> Self {
        Self { config }
    }

    /// Generate all exam instances and persist the answer key.
    ///
    /// Steps: scratch dir, LaTeX template, question pool load, question and
    /// control files, sidecar images, randomizer run, output parsing and
    /// reconciliation, key build and persistence, typeset artifact copy-out,
    /// optional PDF compilation.
    pub fn generate(&self, runner: &dyn Randomizer) -> MucherResult<AnswerKey> {
        info!("Starting exam generation");

        let bank = Path::new(&self.config.question_file);
        let pool = excel::load_question_pool(bank)?;
        let spec = self.config.generation_spec();

        let temp = TempDir::with_prefix("mucher_")?;
        let dir = temp.path();
        debug!("Scratch directory: {}", dir.display());

        latex::write_template(dir)?;
        write_question_files(&pool, dir)?;
        write_control_file(&pool, &spec, dir)?;
        let bank_dir = match bank.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        copy_sidecar_images(bank_dir, dir);

        runner.run(dir)?;

        let document = fs::read_to_string(dir.join(OUTPUT_DOCUMENT))?;
        let table = fs::read_to_string(dir.join(SERIALS_TABLE))?;
        let variants = parse_serials_table(&table)?;
        let markers = parse_document_markers(&document)?;
        reconcile(&variants, &markers)?;

        let key = AnswerKey::build(variants)?;

        let out_dir = Path::new(&self.config.output_dir);
        fs::create_dir_all(out_dir)?;
        let key_path = out_dir.join(&self.config.answer_key_file);
        key.write_csv(&key_path)?;
        info!(
            "Wrote answer key for {} serials: {}",
            key.len(),
            key_path.display()
        );

        // the typeset document is passed through opaquely for compilation
        fs::copy(dir.join(latex::TEMPLATE_FILE), out_dir.join(latex::TEMPLATE_FILE))?;
        fs::copy(dir.join(OUTPUT_DOCUMENT), out_dir.join(OUTPUT_DOCUMENT))?;

        if self.config.compile_pdf {
            latex::compile_pdf(dir)?;
            fs::copy(dir.join(latex::PDF_FILE), out_dir.join(latex::PDF_FILE))?;
            info!("Created: {}", out_dir.join(latex::PDF_FILE).display());
        }

        if !self.config.cleanup_temp {
            let kept = temp.keep();
            info!("Keeping working directory: {}", kept.display());
        }

        info!("Exam generation completed");
        Ok(key)
    }
}

/// Copy images sitting next to the question bank into the working directory
/// so the typeset document can reference them. Failures are non-fatal.
fn copy_sidecar_images(from: &Path, to: &Path) {
    let entries = match fs::read_dir(from) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Cannot list {} for images: {}", from.display(), e);
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
            .unwrap_or(false);
        if !is_image {
            continue;
        }
        if let Some(name) = path.file_name() {
            if let Err(e) = fs::copy(&path, to.join(name)) {
                warn!("Failed to copy image {}: {}", path.display(), e);
            } else {
                debug!("Copied image: {}", path.display());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::pool_from_sheets;

    fn sample_pool() -> QuestionPool {
        let sheets = vec![
            (
                "Cinematica".to_string(),
                vec![
                    vec!["h".into(), "h".into(), "h".into(), "h".into(), "h".into()],
                    vec![
                        "v media?".into(),
                        "s/t".into(),
                        "s*t".into(),
                        "t/s".into(),
                        "3".into(),
                    ],
                ],
            ),
            (
                "Vettori".to_string(),
                vec![
                    vec!["h".into(); 6],
                    vec![
                        "somma?".into(),
                        "parallelogramma".into(),
                        "coseno".into(),
                        "seno".into(),
                        "tangente".into(),
                        "4".into(),
                    ],
                    vec![
                        "prodotto scalare?".into(),
                        "ab cos".into(),
                        "ab sin".into(),
                        "".into(),
                        "".into(),
                        "2".into(),
                    ],
                ],
            ),
        ];
        pool_from_sheets(&sheets).unwrap()
    }

    fn sample_spec() -> GenerationSpec {
        ExamConfig {
            num_variants: 5,
            seed: 42,
            serial_start: 10,
            usage_per_category: 1,
            ..ExamConfig::default()
        }
        .generation_spec()
    }

    #[test]
    fn control_file_is_deterministic_and_name_ordered() {
        let pool = sample_pool();
        let spec = sample_spec();

        let first = render_control_file(&pool, &spec).unwrap();
        let second = render_control_file(&pool, &spec).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            "directory \".\";\n\
             seed 42;\n\
             serial 10;\n\
             use 1 from \"Cinematica-*\";\n\
             use 1 from \"Vettori-*\";\n\
             create 5;\n"
        );
    }

    #[test]
    fn usage_above_category_size_is_a_config_error() {
        let pool = sample_pool();
        let mut spec = sample_spec();
        spec.usage.overrides.insert("Cinematica".to_string(), 2);

        match render_control_file(&pool, &spec) {
            Err(MucherError::UsageExceedsPool {
                category,
                requested,
                available,
            }) => {
                assert_eq!(category, "Cinematica");
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected UsageExceedsPool, got {:?}", other),
        }
    }

    #[test]
    fn question_file_has_one_line_per_answer_correct_first() {
        let pool = sample_pool();
        let dir = tempfile::tempdir().unwrap();
        write_question_files(&pool, dir.path()).unwrap();

        let content = fs::read_to_string(dir.path().join("Cinematica-0")).unwrap();
        assert_eq!(content, "v media?\n.\ns/t\n.\ns*t\n.\nt/s\n.\n");
        // 3 declared answers serialize to exactly 3 answer lines
        let answers = content
            .lines()
            .skip(2)
            .step_by(2)
            .filter(|l| *l != ANSWER_MARKER)
            .count();
        assert_eq!(answers, 3);

        assert!(dir.path().join("Vettori-0").exists());
        assert!(dir.path().join("Vettori-1").exists());
    }

    #[test]
    fn parses_serials_table() {
        let table = "serial questions answers\n\
                     10 Vettori-0 Vettori-1 Cinematica-0 acb\n\
                     11 Vettori-1 Vettori-0 Cinematica-0 BAD\n";
        let variants = parse_serials_table(table).unwrap();
        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].serial, 10);
        assert_eq!(
            variants[0].questions,
            vec![
                QuestionRef::new("Vettori", 0),
                QuestionRef::new("Vettori", 1),
                QuestionRef::new("Cinematica", 0),
            ]
        );
        // labels are normalized to uppercase
        assert_eq!(variants[0].labels, vec!["A", "C", "B"]);
        assert_eq!(variants[1].labels, vec!["B", "A", "D"]);
    }

    #[test]
    fn serials_row_with_label_count_mismatch_is_inconsistent() {
        let table = "serial questions answers\n10 Vettori-0 Vettori-1 A\n";
        assert!(matches!(
            parse_serials_table(table),
            Err(MucherError::GeneratorOutputInconsistent(_))
        ));
    }

    #[test]
    fn extracts_document_markers() {
        let document = "\\def\\mcserialnumber{10}\\mcpaperheader\n\
                        \\def\\mcquestionnumber{1}\\mcquestionheader Quanto vale...\n\
                        \\def\\mcquestionnumber{2}\\mcquestionheader Un corpo...\n\
                        \\def\\mcserialnumber{11}\\mcpaperheader\n\
                        \\def\\mcquestionnumber{1}\\mcquestionheader Quanto vale...\n";
        let markers = parse_document_markers(document).unwrap();
        assert_eq!(markers, vec![(10, 2), (11, 1)]);
    }

    #[test]
    fn reconcile_detects_count_mismatch() {
        let table = "serial questions answers\n10 Vettori-0 A\n11 Vettori-1 B\n";
        let variants = parse_serials_table(table).unwrap();

        // serials table claims two papers, document only shows one
        let markers = vec![(10, 1)];
        assert!(matches!(
            reconcile(&variants, &markers),
            Err(MucherError::GeneratorOutputInconsistent(_))
        ));

        // question count differs for serial 11
        let markers = vec![(10, 1), (11, 2)];
        assert!(matches!(
            reconcile(&variants, &markers),
            Err(MucherError::GeneratorOutputInconsistent(_))
        ));

        let markers = vec![(10, 1), (11, 1)];
        assert!(reconcile(&variants, &markers).is_ok());
    }
}

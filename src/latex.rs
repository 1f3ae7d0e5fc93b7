//! LaTeX collaborator: template emission and PDF compilation.
//! The typeset content itself is never interpreted here.

use std::fs;
use std::path::Path;
use std::process::Command;

use log::{debug, info};

use crate::error::{MucherError, MucherResult};

pub const TEMPLATE_FILE: &str = "exam.tex";
pub const PDF_FILE: &str = "exam.pdf";

/// Exam document template. The \mcserialnumber / \mcquestionnumber hooks are
/// filled by the generated mc-output.tex it inputs.
pub const EXAM_TEMPLATE: &str = r"\documentclass[11pt,a4paper]{article}
\usepackage{amsfonts,latexsym}
\usepackage[italian]{babel}
\usepackage{amsfonts}
\usepackage{amsmath}
\usepackage{amssymb}
\usepackage{fullpage}
\usepackage{graphicx}
\usepackage{wrapfig}
\usepackage{siunitx}
\usepackage{physics}
\usepackage{multicol}
\usepackage{geometry}
\usepackage{microtype}

\geometry{top=0.7cm, bottom=0.7cm, left=1cm, right=1cm}

\begin{document}

\pagestyle{empty}

\newcommand{\mcglobalheader}{
}

\newcommand{\boxt}{{\Huge $\square$ }}

\newcommand{\mcpaperheader}{
\ \\
TESTO NUMERO \mcserialnumber. STUDENTE: \\
{\textbf{Tempo a disposizione: XXXX.} In ognuna delle seguenti domande una sola opzione \`e corretta.
\\ Risposta corretta: XX punti. Risposta non data: XX punti. Risposta errata: XX punti.}

\begin{center}
{\Large Verifica di XXX n.XX: XXXX}\\
Classe XX, XX/XX/20XX.
\end{center}
}

\newcommand{\mcpaperfooter}{

\newpage
}

\newcommand{\mcquestionheader}{\noindent{\bf \mcquestionnumber}. }

\newcommand{\mcquestionfooter}{}

\input mc-output.tex

\end{document}
";

/// Write the template into the working directory
pub fn write_template(dir: &Path) -> MucherResult<()> {
    let path = dir.join(TEMPLATE_FILE);
    fs::write(&path, EXAM_TEMPLATE)?;
    debug!("Generated LaTeX template: {}", path.display());
    Ok(())
}

/// Compile the exam document. pdflatex may exit non-zero even on success,
/// so the produced PDF is the real signal.
pub fn compile_pdf(dir: &Path) -> MucherResult<()> {
    info!("Compiling LaTeX to PDF");

    let output = Command::new("pdflatex")
        .arg("-interaction=nonstopmode")
        .arg(TEMPLATE_FILE)
        .current_dir(dir)
        .output()
        .map_err(|e| MucherError::GeneratorInvocation(format!("failed to start pdflatex: {}", e)))?;

    if !dir.join(PDF_FILE).exists() {
        debug!("pdflatex output: {}", String::from_utf8_lossy(&output.stdout));
        return Err(MucherError::GeneratorInvocation(
            "pdflatex completed but produced no exam.pdf".to_string(),
        ));
    }
    Ok(())
}

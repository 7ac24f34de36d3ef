//! Classification tasks handed to the model backends.
//!
//! A [`ClassificationTask`] bundles the input text, the instruction sent to
//! the model and the [`Constraints`] used to turn free-form model output
//! back into one allowed label. Tasks are built per call and dropped after.
//!
//! The instruction wording is product material that changes often; the
//! contract is the closed label set plus the normalisation rules.

use crate::models::{MANUAL_REVIEW, SCHEDULED_ACTIVITIES};
use crate::utils::normalize_text;
use chrono::NaiveDate;
use std::fmt;

pub const YES: &str = "SI";
pub const NO: &str = "NO";
pub const NEGATIVE: &str = "NEGATIVA";
pub const NOT_NEGATIVE: &str = "NO_NEGATIVA";
pub const NOT_IDENTIFIED: &str = "No identificado";

const SYSTEM_PROMPT: &str = "Sos un clasificador de noticias de prensa. Respondés únicamente con la etiqueta pedida, sin explicaciones.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Valuation,
    Topic,
    Declaration,
    Agenda,
    Interview,
    OpinionNote,
    Political,
    Interviewee,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Valuation => "valuation",
            TaskKind::Topic => "topic",
            TaskKind::Declaration => "declaration",
            TaskKind::Agenda => "agenda",
            TaskKind::Interview => "interview",
            TaskKind::OpinionNote => "opinion_note",
            TaskKind::Political => "political",
            TaskKind::Interviewee => "interviewee",
        })
    }
}

/// Where a keyword has to appear in the model output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    /// The first word of the output equals the keyword.
    FirstWord,
    /// The keyword occurs anywhere in the output.
    Anywhere,
}

/// Maps a keyword found in model output to an allowed label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordRule {
    pub needle: String,
    pub label: String,
    pub anchor: Anchor,
}

impl KeywordRule {
    pub fn new(needle: impl Into<String>, label: impl Into<String>, anchor: Anchor) -> Self {
        Self {
            needle: needle.into(),
            label: label.into(),
            anchor,
        }
    }
}

/// How model output is validated and normalised.
#[derive(Debug, Clone)]
pub struct Constraints {
    /// Closed label set. Empty for open extraction tasks.
    pub labels: Vec<String>,
    /// Containment rules tried in order after the exact match fails.
    pub keywords: Vec<KeywordRule>,
    /// Conservative label used when the model answered but no rule matched.
    pub fallback_label: Option<String>,
    /// Answers to an open task that mean "nothing found".
    pub rejects: Vec<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Constraints {
    fn closed(labels: &[&str], max_tokens: u32) -> Self {
        Self {
            labels: labels.iter().map(|s| s.to_string()).collect(),
            keywords: Vec::new(),
            fallback_label: None,
            rejects: Vec::new(),
            max_tokens,
            temperature: 0.0,
        }
    }

    pub fn is_open(&self) -> bool {
        self.labels.is_empty()
    }
}

/// One request to classify one text.
#[derive(Debug, Clone)]
pub struct ClassificationTask {
    pub kind: TaskKind,
    pub input: String,
    pub system: String,
    pub instruction: String,
    pub constraints: Constraints,
    /// Label returned by the dispatcher when every backend fails.
    pub safe_default: String,
}

/// A catalog topic offered to the model, with its reference date if known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicOption {
    pub name: String,
    pub date: Option<NaiveDate>,
}

impl ClassificationTask {
    fn new(
        kind: TaskKind,
        input: &str,
        instruction: String,
        constraints: Constraints,
        safe_default: &str,
    ) -> Self {
        Self {
            kind,
            input: input.to_string(),
            system: SYSTEM_PROMPT.to_string(),
            instruction,
            constraints,
            safe_default: safe_default.to_string(),
        }
    }

    /// Negative vs. not-negative sentiment.
    pub fn valuation(text: &str) -> Self {
        let mut c = Constraints::closed(&[NEGATIVE, NOT_NEGATIVE], 10);
        c.keywords = vec![
            KeywordRule::new("no negativ", NOT_NEGATIVE, Anchor::Anywhere),
            KeywordRule::new("positiv", NOT_NEGATIVE, Anchor::Anywhere),
            KeywordRule::new("neutr", NOT_NEGATIVE, Anchor::Anywhere),
            KeywordRule::new("negativ", NEGATIVE, Anchor::Anywhere),
        ];
        c.fallback_label = Some(NOT_NEGATIVE.to_string());

        let instruction = format!(
            "Clasificá la noticia como NEGATIVA o NO_NEGATIVA.\n\
             NEGATIVA: críticas, denuncias, conflictos, escándalos, crisis, reclamos, fallas.\n\
             NO_NEGATIVA: logros, anuncios, inauguraciones, eventos, información neutral.\n\
             Si no es claramente negativa, es NO_NEGATIVA.\n\
             Respondé únicamente NEGATIVA o NO_NEGATIVA.\n\n\
             TEXTO:\n{text}\n"
        );
        Self::new(TaskKind::Valuation, text, instruction, c, NOT_NEGATIVE)
    }

    /// Quote attributed to one of the tracked actors.
    pub fn declaration(text: &str, actors: &[String]) -> Self {
        let instruction = format!(
            "¿El texto contiene al menos una cita textual (entre comillas) atribuida, \
             con un verbo de comunicación (dijo, afirmó, anunció, sostuvo, explicó), \
             a alguno de estos actores?\n{}\n\n\
             Una mención sin cita no alcanza. Respondé únicamente SI o NO.\n\nTEXTO:\n{text}\n",
            bullet_list(actors)
        );
        Self::new(TaskKind::Declaration, text, instruction, yes_no(), NO)
    }

    /// Listing of upcoming events with an inviting framing.
    pub fn agenda(text: &str) -> Self {
        let instruction = format!(
            "¿El texto es una AGENDA? Es agenda si enumera al menos una actividad o evento \
             programado con fecha, horario o lugar, con intención de invitar a asistir. \
             Un relato de algo que ya ocurrió no es agenda.\n\
             Respondé únicamente SI o NO.\n\nTEXTO:\n{text}\n"
        );
        Self::new(TaskKind::Agenda, text, instruction, yes_no(), NO)
    }

    /// Real question/answer exchange.
    pub fn interview(text: &str) -> Self {
        let instruction = format!(
            "¿El texto es una ENTREVISTA? Tiene que haber un intercambio real de preguntas y \
             respuestas: preguntas marcadas con guion (—¿...?), o atribuciones explícitas de \
             pregunta y respuesta. Citas sueltas sin preguntas no son entrevista.\n\
             Respondé únicamente SI o NO.\n\nTEXTO:\n{text}\n"
        );
        Self::new(TaskKind::Interview, text, instruction, yes_no(), NO)
    }

    /// Opinion piece signed by one of the tracked actors.
    pub fn opinion_note(text: &str, actors: &[String], author: Option<&str>) -> Self {
        let instruction = format!(
            "¿El texto es una NOTA DE OPINIÓN firmada por alguno de estos actores?\n{}\n\
             AUTOR INFORMADO: {}\n\
             Un comunicado, una noticia informativa o una declaración en conferencia no lo son.\n\
             Respondé únicamente SI o NO.\n\nTEXTO:\n{text}\n",
            bullet_list(actors),
            author.unwrap_or("No especificado")
        );
        Self::new(TaskKind::OpinionNote, text, instruction, yes_no(), NO)
    }

    /// Electoral or partisan content.
    pub fn political(text: &str) -> Self {
        let mut c = yes_no();
        for needle in [
            "elecci", "candidat", "campana", "encuesta", "votaci", "partido", "politic",
        ] {
            c.keywords
                .push(KeywordRule::new(needle, YES, Anchor::Anywhere));
        }
        let instruction = format!(
            "¿El texto tiene FACTOR POLÍTICO? Lo tiene si menciona elecciones, campaña \
             electoral, candidatos, encuestas electorales, votaciones o partidos políticos.\n\
             Respondé únicamente SI o NO.\n\nTEXTO:\n{text}\n"
        );
        Self::new(TaskKind::Political, text, instruction, c, NO)
    }

    /// Full name of the person interviewed.
    pub fn interviewee(text: &str) -> Self {
        let mut c = Constraints::closed(&[], 20);
        c.rejects = vec![
            NOT_IDENTIFIED.to_string(),
            "No hay entrevistado".to_string(),
            "Ninguno".to_string(),
        ];
        let instruction = format!(
            "Identificá a la persona entrevistada en el texto. Respondé únicamente su nombre \
             completo (nombre y apellido), sin cargos ni explicaciones. Si hay varias, elegí \
             la principal. Si no hay una clara, respondé '{NOT_IDENTIFIED}'.\n\nTEXTO:\n{text}\n"
        );
        Self::new(TaskKind::Interviewee, text, instruction, c, NOT_IDENTIFIED)
    }

    /// Pick one topic of `catalog`.
    ///
    /// `catalog` must already be in tie-break priority order: when the model
    /// output mentions several entries, the first one listed wins.
    /// `recent` are the nearest-dated entries offered as context.
    pub fn topic(
        text: &str,
        catalog: &[TopicOption],
        recent: &[TopicOption],
        article_date: Option<NaiveDate>,
        safe_default: &str,
    ) -> Self {
        let none_label = if safe_default == MANUAL_REVIEW {
            MANUAL_REVIEW
        } else {
            SCHEDULED_ACTIVITIES
        };
        let names: Vec<&str> = catalog.iter().map(|t| t.name.as_str()).collect();
        let mut c = Constraints::closed(&names, 40);
        c.keywords = names
            .iter()
            .map(|n| KeywordRule::new(*n, *n, Anchor::Anywhere))
            .collect();
        // "Nothing fits" is a valid answer, tried after every catalog name.
        let folded_none = normalize_text(none_label);
        if !names.iter().any(|n| normalize_text(n) == folded_none) {
            c.labels.push(none_label.to_string());
            c.keywords
                .push(KeywordRule::new(none_label, none_label, Anchor::Anywhere));
        }

        let catalog_list = bullet_list(&names);
        let recent_list = if recent.is_empty() {
            "(sin fechas de referencia)".to_string()
        } else {
            recent
                .iter()
                .map(|t| match t.date {
                    Some(d) => format!("- {} ({})", t.name, d.format("%Y-%m-%d")),
                    None => format!("- {}", t.name),
                })
                .collect::<Vec<_>>()
                .join("\n")
        };
        let date_line = article_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "desconocida".to_string());

        let instruction = format!(
            "Asigná a la noticia exactamente UNO de estos temas:\n{catalog_list}\n\n\
             Reglas:\n\
             1. Aceptá una paráfrasis sólo si reconocés sin ambigüedad el mismo evento o proyecto.\n\
             2. Entre varios candidatos preferí el que aparece en el título, luego el más \
             específico (más largo), luego el que más se repite en el texto.\n\
             3. Si quedan 2 o 3 candidatos ambiguos, elegí el de fecha de referencia más \
             cercana a la fecha de la noticia.\n\
             4. Respondé sólo con el nombre exacto del tema. No inventes temas. \
             Si ninguno corresponde, respondé '{none_label}'.\n\n\
             FECHA DE LA NOTICIA: {date_line}\n\
             TEMAS RECIENTES:\n{recent_list}\n\n\
             TEXTO:\n{text}\n"
        );
        Self::new(TaskKind::Topic, text, instruction, c, safe_default)
    }
}

fn yes_no() -> Constraints {
    let mut c = Constraints::closed(&[YES, NO], 5);
    c.keywords = vec![
        KeywordRule::new("si", YES, Anchor::FirstWord),
        KeywordRule::new("no", NO, Anchor::FirstWord),
    ];
    c.fallback_label = Some(NO.to_string());
    c
}

fn bullet_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| format!("- {}", s.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

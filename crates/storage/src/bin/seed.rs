use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use exam_core::model::{
    AnswerOption, Certification, CertificationId, DEFAULT_PASSING_GRADE, Difficulty, DomainTag,
    OptionKey, Question, QuestionId, TestKind, TestSession,
};
use storage::repository::{AttemptRecord, Storage};

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    cert_id: CertificationId,
    cert_name: String,
    cert_desc: Option<String>,
    passing_grade: u8,
    questions: u32,
    attempts: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug, Error)]
enum ArgsError {
    #[error("{flag} requires a value")]
    MissingValue { flag: String },
    #[error("unknown argument: {0}")]
    UnknownArg(String),
    #[error("invalid value for {flag}: {raw}")]
    BadValue { flag: String, raw: String },
}

fn parse_value<T: std::str::FromStr>(flag: &str, raw: String) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::BadValue {
        flag: flag.to_string(),
        raw,
    })
}

impl Args {
    fn from_env() -> Self {
        fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
            std::env::var(key).ok().and_then(|value| value.parse().ok())
        }

        Self {
            db_url: std::env::var("EXAM_DB_URL").unwrap_or_else(|_| "sqlite:exam.sqlite3".into()),
            cert_id: CertificationId::new(env_parse("EXAM_CERT_ID").unwrap_or(1)),
            cert_name: std::env::var("EXAM_CERT_NAME")
                .unwrap_or_else(|_| "Scrum Essentials".into()),
            cert_desc: std::env::var("EXAM_CERT_DESC").ok(),
            passing_grade: env_parse("EXAM_PASSING_GRADE").unwrap_or(DEFAULT_PASSING_GRADE),
            questions: env_parse("EXAM_QUESTIONS").unwrap_or(30),
            attempts: env_parse("EXAM_ATTEMPTS").unwrap_or(3),
            now: None,
        }
    }

    /// Flags override environment values. Both `--flag value` and
    /// `--flag=value` are accepted.
    fn parse() -> Result<Self, ArgsError> {
        let mut out = Self::from_env();
        let mut argv = std::env::args().skip(1);

        while let Some(arg) = argv.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
                None => (arg, None),
            };
            if matches!(flag.as_str(), "--help" | "-h") {
                print_usage();
                std::process::exit(0);
            }
            let mut value = || {
                inline.clone().or_else(|| argv.next()).ok_or_else(|| {
                    ArgsError::MissingValue { flag: flag.clone() }
                })
            };
            match flag.as_str() {
                "--db" => {
                    let raw = value()?;
                    if raw.trim().is_empty() {
                        return Err(ArgsError::BadValue {
                            flag: "--db".to_string(),
                            raw,
                        });
                    }
                    out.db_url = raw;
                }
                "--cert-id" => {
                    out.cert_id = CertificationId::new(parse_value("--cert-id", value()?)?);
                }
                "--cert-name" => out.cert_name = value()?,
                "--cert-desc" => out.cert_desc = Some(value()?),
                "--passing-grade" => {
                    out.passing_grade = parse_value("--passing-grade", value()?)?;
                }
                "--questions" => out.questions = parse_value("--questions", value()?)?,
                "--attempts" => out.attempts = parse_value("--attempts", value()?)?,
                "--now" => {
                    let raw = value()?;
                    let parsed = DateTime::parse_from_rfc3339(&raw)
                        .map_err(|_| ArgsError::BadValue {
                            flag: "--now".to_string(),
                            raw,
                        })?
                        .with_timezone(&Utc);
                    out.now = Some(parsed);
                }
                _ => return Err(ArgsError::UnknownArg(flag)),
            }
        }

        Ok(out)
    }
}

fn print_usage() {
    eprintln!(
        r"Usage:
  cargo run -p storage --bin seed -- [options]

Options (also as --flag=value):
  --db <sqlite_url>         SQLite URL (default: sqlite:exam.sqlite3)
  --cert-id <id>            Certification id to upsert (default: 1)
  --cert-name <name>        Certification name (default: Scrum Essentials)
  --cert-desc <text>        Optional certification description
  --passing-grade <n>       Passing grade in 1..=100 (default: 70)
  --questions <n>           Number of sample questions to upsert (default: 30)
  --attempts <n>            Number of historical attempts to append (default: 3)
  --now <rfc3339>           Fixed current time for deterministic seeding
  -h, --help                Show this help

Environment (same as flags):
  EXAM_DB_URL, EXAM_CERT_ID, EXAM_CERT_NAME, EXAM_CERT_DESC,
  EXAM_PASSING_GRADE, EXAM_QUESTIONS, EXAM_ATTEMPTS"
    );
}

struct Sample {
    text: &'static str,
    domain: &'static str,
    options: [(&'static str, bool); 4],
}

const SAMPLES: [Sample; 6] = [
    Sample {
        text: "Who is accountable for maximizing the value of the product?",
        domain: "role",
        options: [
            ("The Product Owner", true),
            ("The Scrum Master", false),
            ("The Developers", false),
            ("The stakeholders", false),
        ],
    },
    Sample {
        text: "What is the maximum length of the Sprint Review for a one-month Sprint?",
        domain: "event",
        options: [
            ("One hour", false),
            ("Four hours", true),
            ("Eight hours", false),
            ("Two days", false),
        ],
    },
    Sample {
        text: "Which artifact makes the work planned for the current Sprint transparent?",
        domain: "artifact",
        options: [
            ("The Product Backlog", false),
            ("The Sprint Backlog", true),
            ("The Increment", false),
            ("The burn-down chart", false),
        ],
    },
    Sample {
        text: "Who decides how many Product Backlog items are selected for a Sprint?",
        domain: "role",
        options: [
            ("The Product Owner", false),
            ("The Scrum Master", false),
            ("The Developers", true),
            ("The project manager", false),
        ],
    },
    Sample {
        text: "When does the next Sprint start?",
        domain: "event",
        options: [
            ("After the Sprint Review is accepted", false),
            ("Immediately after the previous Sprint ends", true),
            ("Once all Retrospective actions are done", false),
            ("When the Product Owner approves the Increment", false),
        ],
    },
    Sample {
        text: "What is the commitment associated with the Product Backlog?",
        domain: "artifact",
        options: [
            ("The Sprint Goal", false),
            ("The Definition of Done", false),
            ("The Product Goal", true),
            ("The velocity forecast", false),
        ],
    },
];

fn build_sample_question(id: u64, index: usize) -> Result<Question, Box<dyn std::error::Error>> {
    let sample = &SAMPLES[index % SAMPLES.len()];
    let keys = ['A', 'B', 'C', 'D'];
    let mut options = Vec::with_capacity(sample.options.len());
    for (slot, (text, correct)) in sample.options.iter().enumerate() {
        options.push(AnswerOption::new(OptionKey::new(keys[slot])?, *text, *correct)?);
    }
    let difficulty = match index % 3 {
        0 => Difficulty::Easy,
        1 => Difficulty::Medium,
        _ => Difficulty::Hard,
    };
    Ok(Question::new(
        QuestionId::new(id),
        sample.text,
        options,
        DomainTag::new(sample.domain)?,
        difficulty,
    )?)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let certification = Certification::new(
        args.cert_id,
        args.cert_name.clone(),
        args.cert_desc.clone().unwrap_or_default(),
        args.passing_grade,
        vec![
            DomainTag::new("role")?,
            DomainTag::new("event")?,
            DomainTag::new("artifact")?,
        ],
        now,
    )?;
    storage
        .certifications
        .upsert_certification(&certification)
        .await?;

    for i in 0..args.questions {
        let question = build_sample_question(u64::from(i + 1), i as usize)?;
        storage
            .questions
            .upsert_question(certification.id(), &question)
            .await?;
    }

    let bank = storage.questions.list_questions(certification.id()).await?;
    for i in 0..args.attempts {
        let days_ago = i64::from(i) * 2;
        let started_at = now - Duration::days(days_ago) - Duration::minutes(12);
        let completed_at = started_at + Duration::minutes(8);

        let mut session = TestSession::new(
            certification.id(),
            TestKind::Short,
            bank.clone(),
            certification.passing_grade(),
            started_at,
        )?;
        let target_correct = (5 + i % 4) as usize;
        let question_set: Vec<Question> = session.questions().to_vec();
        for (index, question) in question_set.iter().enumerate() {
            if index < target_correct {
                session.select_answer(question.id(), question.correct_key())?;
            } else if index < target_correct + 2 {
                if let Some(wrong) = question.options().iter().find(|option| !option.is_correct())
                {
                    session.select_answer(question.id(), wrong.key())?;
                }
            }
        }
        session.submit(completed_at);

        let record =
            AttemptRecord::from_session(&session).ok_or("session did not complete")?;
        let _ = storage.attempts.append_attempt(&record).await?;
    }

    println!(
        "Seeded certification {} with {} questions and {} attempts into {}",
        certification.id().value(),
        args.questions,
        args.attempts,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}

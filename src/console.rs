//! Line-oriented console front-end. Parses one command per line and calls
//! the assistant; it holds no pipeline logic of its own.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use thiserror::Error;

use crate::models::{MetricKind, ProfileForm};
use crate::pipeline::{AssistantError, CompletionClient, HealthAssistant, SymptomAssessment, TreatmentPlan};
use crate::report;
use crate::session::SessionContext;

const HELP: &str = "Commands:
  profile <json>                     save profile (name, age, gender, height_cm, weight_kg, ...)
  glucose <mg/dL>                    log a glucose reading
  bp <systolic>/<diastolic>          log a blood pressure reading
  asthma <severity 1-10> [triggers]  log an asthma episode
  chat <question>                    ask the assistant
  symptoms <description>             symptom check
  treatment <condition> | <details>  treatment plan
  advice <glucose|blood_pressure|asthma>  advice on the latest reading
  trend <glucose|blood_pressure|asthma>   trend insight (kept as report summary)
  export <path>                      write the PDF report
  chatlog <path>                     write the chat transcript
  history                            print the chat transcript
  reset                              clear the session
  quit";

#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("Unknown command: {0} (type 'help')")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Profile(String),
    Glucose(f64),
    BloodPressure(u16, u16),
    Asthma { severity: u8, triggers: String },
    Chat(String),
    Symptoms(String),
    Treatment { condition: String, details: String },
    Advice(MetricKind),
    Trend(MetricKind),
    Export(PathBuf),
    ChatLog(PathBuf),
    History,
    Reset,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            "help" | "?" => Ok(Command::Help),
            "profile" => non_empty(rest, "profile <json>").map(Command::Profile),
            "glucose" => rest
                .parse::<f64>()
                .map(Command::Glucose)
                .map_err(|_| CommandError::Usage("glucose <mg/dL>")),
            "bp" => parse_pressure(rest).ok_or(CommandError::Usage("bp <systolic>/<diastolic>")),
            "asthma" => {
                let (severity, triggers) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
                let severity = severity
                    .parse::<u8>()
                    .map_err(|_| CommandError::Usage("asthma <severity 1-10> [triggers]"))?;
                Ok(Command::Asthma {
                    severity,
                    triggers: triggers.trim().to_string(),
                })
            }
            "chat" => non_empty(rest, "chat <question>").map(Command::Chat),
            "symptoms" => non_empty(rest, "symptoms <description>").map(Command::Symptoms),
            "treatment" => {
                let rest = non_empty(rest, "treatment <condition> | <details>")?;
                let (condition, details) = rest.split_once('|').unwrap_or((rest.as_str(), ""));
                Ok(Command::Treatment {
                    condition: condition.trim().to_string(),
                    details: details.trim().to_string(),
                })
            }
            "advice" => rest
                .parse::<MetricKind>()
                .map(Command::Advice)
                .map_err(|_| CommandError::Usage("advice <glucose|blood_pressure|asthma>")),
            "trend" => rest
                .parse::<MetricKind>()
                .map(Command::Trend)
                .map_err(|_| CommandError::Usage("trend <glucose|blood_pressure|asthma>")),
            "export" => non_empty(rest, "export <path>").map(|p| Command::Export(p.into())),
            "chatlog" => non_empty(rest, "chatlog <path>").map(|p| Command::ChatLog(p.into())),
            "history" => Ok(Command::History),
            "reset" => Ok(Command::Reset),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn non_empty(rest: &str, usage: &'static str) -> Result<String, CommandError> {
    if rest.is_empty() {
        Err(CommandError::Usage(usage))
    } else {
        Ok(rest.to_string())
    }
}

/// Accepts "120/80" or "120 80".
fn parse_pressure(rest: &str) -> Option<Command> {
    let mut parts = rest.split(|c: char| c == '/' || c.is_whitespace()).filter(|p| !p.is_empty());
    let systolic = parts.next()?.parse().ok()?;
    let diastolic = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Command::BloodPressure(systolic, diastolic))
}

/// One interactive session over arbitrary input/output streams.
pub struct Console<C: CompletionClient> {
    assistant: HealthAssistant<C>,
    session: SessionContext,
    report_summary: Option<String>,
}

impl<C: CompletionClient> Console<C> {
    pub fn new(assistant: HealthAssistant<C>) -> Self {
        Self {
            assistant,
            session: SessionContext::new(),
            report_summary: None,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Read commands until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> io::Result<()> {
        writeln!(out, "{} v{} (type 'help')", crate::config::APP_NAME, crate::config::APP_VERSION)?;
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match Command::parse(&line) {
                Ok(Command::Quit) => break,
                Ok(command) => self.execute(command, out)?,
                Err(e) => writeln!(out, "{e}")?,
            }
        }
        Ok(())
    }

    /// Run one command. Assistant errors are printed, never propagated.
    pub fn execute<W: Write>(&mut self, command: Command, out: &mut W) -> io::Result<()> {
        match self.dispatch(command, out) {
            Ok(()) => Ok(()),
            Err(ConsoleFailure::Io(e)) => Err(e),
            Err(ConsoleFailure::Assistant(e)) => writeln!(out, "Error: {e}"),
            Err(ConsoleFailure::Input(msg)) => writeln!(out, "Error: {msg}"),
        }
    }

    fn dispatch<W: Write>(&mut self, command: Command, out: &mut W) -> Result<(), ConsoleFailure> {
        let assistant = &self.assistant;
        let session = &mut self.session;

        match command {
            Command::Help => writeln!(out, "{HELP}")?,
            Command::Profile(json) => {
                let form: ProfileForm = serde_json::from_str(&json)
                    .map_err(|e| ConsoleFailure::Input(format!("invalid profile JSON: {e}")))?;
                assistant.save_profile(session, form)?;
                if let Some(profile) = session.profile() {
                    writeln!(
                        out,
                        "Profile saved. BMI {:.1} ({})",
                        profile.bmi(),
                        profile.bmi_category()
                    )?;
                }
            }
            Command::Glucose(value) => {
                assistant.log_glucose(session, value, None)?;
                writeln!(out, "Logged glucose {value} mg/dL")?;
            }
            Command::BloodPressure(systolic, diastolic) => {
                assistant.log_blood_pressure(session, systolic, diastolic, None)?;
                writeln!(out, "Logged blood pressure {systolic}/{diastolic} mmHg")?;
            }
            Command::Asthma { severity, triggers } => {
                assistant.log_asthma(session, &triggers, severity, None)?;
                writeln!(out, "Logged asthma episode, severity {severity}/10")?;
            }
            Command::Chat(question) => {
                let reply = assistant.chat(session, &question)?;
                writeln!(out, "Assistant: {}", reply.text)?;
            }
            Command::Symptoms(text) => {
                let assessment = assistant.check_symptoms(session, &text)?;
                write_assessment(out, &assessment)?;
            }
            Command::Treatment { condition, details } => {
                let plan = assistant.plan_treatment(session, &condition, &details)?;
                write_plan(out, &plan)?;
            }
            Command::Advice(kind) => match session.metrics.latest(kind) {
                Some(entry) => {
                    let advice = assistant.metric_advice(entry);
                    writeln!(out, "{}: {}", kind.label(), advice.text)?;
                }
                None => writeln!(out, "No {} readings logged yet.", kind.label())?,
            },
            Command::Trend(kind) => {
                let advice = assistant.trend_summary(session, kind)?;
                writeln!(out, "{}", advice.text)?;
                if !advice.fallback {
                    self.report_summary = Some(advice.text);
                }
            }
            Command::Export(path) => {
                let bytes = assistant.export_report(session, self.report_summary.as_deref())?;
                std::fs::write(&path, &bytes).map_err(|e| write_failed(&path, e))?;
                writeln!(out, "Report written to {}", path.display())?;
            }
            Command::ChatLog(path) => {
                std::fs::write(&path, report::export_chat_log(&session.conversation))
                    .map_err(|e| write_failed(&path, e))?;
                writeln!(out, "Chat log written to {}", path.display())?;
            }
            Command::History => {
                if session.conversation.is_empty() {
                    writeln!(out, "No conversation yet.")?;
                } else {
                    writeln!(out, "{}", session.conversation.transcript())?;
                }
            }
            Command::Reset => {
                session.reset();
                self.report_summary = None;
                writeln!(out, "Session cleared.")?;
            }
            Command::Quit => {}
        }
        Ok(())
    }
}

enum ConsoleFailure {
    Io(io::Error),
    Assistant(AssistantError),
    Input(String),
}

impl From<io::Error> for ConsoleFailure {
    fn from(e: io::Error) -> Self {
        ConsoleFailure::Io(e)
    }
}

impl From<AssistantError> for ConsoleFailure {
    fn from(e: AssistantError) -> Self {
        ConsoleFailure::Assistant(e)
    }
}

fn write_failed(path: &std::path::Path, e: io::Error) -> ConsoleFailure {
    ConsoleFailure::Input(format!("could not write {}: {e}", path.display()))
}

fn write_assessment<W: Write>(out: &mut W, assessment: &SymptomAssessment) -> io::Result<()> {
    writeln!(out, "Possible conditions:")?;
    for entry in &assessment.possible_conditions {
        if entry.notes.is_empty() {
            writeln!(out, "  - {} ({:.0}%)", entry.condition, entry.likelihood_percent)?;
        } else {
            writeln!(
                out,
                "  - {} ({:.0}%): {}",
                entry.condition, entry.likelihood_percent, entry.notes
            )?;
        }
    }
    writeln!(out, "Next steps:")?;
    for (i, step) in assessment.next_steps.iter().enumerate() {
        writeln!(out, "  {}. {step}", i + 1)?;
    }
    Ok(())
}

fn write_plan<W: Write>(out: &mut W, plan: &TreatmentPlan) -> io::Result<()> {
    writeln!(out, "Medications:")?;
    for med in &plan.medications {
        let details = [med.dosage.as_str(), med.frequency.as_str(), med.notes.as_str()]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");
        if details.is_empty() {
            writeln!(out, "  - {}", med.name)?;
        } else {
            writeln!(out, "  - {}: {details}", med.name)?;
        }
    }
    writeln!(out, "Lifestyle changes:")?;
    for change in &plan.lifestyle_changes {
        writeln!(out, "  - {change}")?;
    }
    writeln!(out, "Follow-up: {}", plan.follow_up)?;
    writeln!(out, "Duration: {}", plan.duration)
}

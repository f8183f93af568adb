use chrono::{DateTime, Utc};
use console::Style;
use serde::{Deserialize, Serialize};

use crate::pipeline::metrics::{estimate, ProgressEstimate};
use crate::pipeline::snapshot::{AgentView, RunSnapshot, RunView, StageView};
use crate::pipeline::state::{RunOutcome, StatusKind};
use crate::utils::formatting::{format_duration, format_percentage};
use crate::utils::truncation::truncate_chars;

const RULE_WIDTH: usize = 60;
const AGENT_NAME_WIDTH: usize = 15;
const STATUS_WORD_WIDTH: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GlyphSet {
    #[default]
    Unicode,
    Ascii,
}

struct Glyphs {
    pending: &'static str,
    active: &'static str,
    waiting: &'static str,
    completed: &'static str,
    failed: &'static str,
    heavy_rule: &'static str,
    light_rule: &'static str,
    arrow: &'static str,
    bar_full: &'static str,
    bar_empty: &'static str,
    branch: &'static str,
    pipe: &'static str,
    speech: &'static str,
    output: &'static str,
    pin: &'static str,
    title: &'static str,
    success: &'static str,
}

static UNICODE: Glyphs = Glyphs {
    pending: "📋",
    active: "⚡",
    waiting: "⏳",
    completed: "✅",
    failed: "❌",
    heavy_rule: "━",
    light_rule: "─",
    arrow: " → ",
    bar_full: "█",
    bar_empty: "░",
    branch: "├─",
    pipe: "│",
    speech: "💬",
    output: "↳",
    pin: "📍",
    title: "🚀",
    success: "🎉",
};

static ASCII: Glyphs = Glyphs {
    pending: ".",
    active: ">",
    waiting: "~",
    completed: "+",
    failed: "x",
    heavy_rule: "=",
    light_rule: "-",
    arrow: " -> ",
    bar_full: "#",
    bar_empty: "-",
    branch: "|-",
    pipe: "|",
    speech: "*",
    output: "=>",
    pin: "@",
    title: ">>",
    success: "**",
};

impl GlyphSet {
    fn glyphs(self) -> &'static Glyphs {
        match self {
            Self::Unicode => &UNICODE,
            Self::Ascii => &ASCII,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    pub glyphs: GlyphSet,
    /// Emit ANSI colours. Forced on or off so output never depends on
    /// whether stdout happens to be a terminal.
    pub color: bool,
    pub request_width: usize,
    pub bar_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            glyphs: GlyphSet::Unicode,
            color: false,
            request_width: 50,
            bar_width: 40,
        }
    }
}

/// Render a full status frame. Pure: the same inputs always give the same
/// text, and missing data degrades to blanks or "Calculating..." rather
/// than an error.
pub fn render(snapshot: &RunSnapshot, progress: &ProgressEstimate, options: &RenderOptions) -> String {
    let painter = Painter::new(options);
    match &snapshot.run {
        None => render_idle(&painter),
        Some(run) => render_run(run, progress, &painter),
    }
}

/// Estimate progress as of `now` and render the frame.
pub fn render_snapshot(snapshot: &RunSnapshot, now: DateTime<Utc>, options: &RenderOptions) -> String {
    let progress = match &snapshot.run {
        Some(run) => estimate(run, now),
        None => ProgressEstimate::idle(now),
    };
    render(snapshot, &progress, options)
}

fn render_idle(p: &Painter<'_>) -> String {
    format!(
        "{}\n{}\n{}",
        p.title("PIPELINE STATUS"),
        p.heavy_rule(),
        p.dim("No pipeline run in progress."),
    )
}

fn render_run(run: &RunView, progress: &ProgressEstimate, p: &Painter<'_>) -> String {
    let mut sections = vec![render_header(run, p), render_stage_overview(run, p)];
    if let Some(detail) = render_stage_detail(run, progress, p) {
        sections.push(detail);
    }
    sections.push(render_progress(progress, p));
    if let Some(activity) = render_current_activity(run, p) {
        sections.push(activity);
    }
    if let Some(completion) = render_completion(run, progress, p) {
        sections.push(completion);
    }
    sections.join("\n\n")
}

fn render_header(run: &RunView, p: &Painter<'_>) -> String {
    format!(
        "{}\n{}\nRequest: {}\nStarted: {}\nPipeline ID: {}",
        p.title("PIPELINE STATUS"),
        p.heavy_rule(),
        truncate_chars(&run.request, p.options.request_width),
        run.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
        p.paint(&run.run_id, Style::new().cyan()),
    )
}

fn render_stage_overview(run: &RunView, p: &Painter<'_>) -> String {
    let indicators: Vec<String> = run
        .stages
        .iter()
        .filter(|stage| !(stage.optional && stage.status == StatusKind::Pending))
        .map(|stage| {
            let indicator = match stage.status {
                StatusKind::Pending => "[ ]".to_string(),
                status => format!("[{}]", p.glyph(status)),
            };
            let name = p.status_paint(&stage.display_name, stage.status);
            if stage.agents.is_empty() {
                format!("{} {}", indicator, name)
            } else {
                format!(
                    "{} {} ({}/{})",
                    indicator,
                    name,
                    stage.completed_agents(),
                    stage.agents.len()
                )
            }
        })
        .collect();
    format!("{}\n{}", p.bold("PIPELINE STAGES:"), indicators.join(p.glyphs.arrow))
}

fn render_stage_detail(run: &RunView, progress: &ProgressEstimate, p: &Painter<'_>) -> Option<String> {
    let (_, stage) = run.focused_stage()?;

    let label = if stage.optional {
        format!("Stage: {}", stage.display_name)
    } else {
        let numbered: Vec<&StageView> = run.stages.iter().filter(|s| !s.optional).collect();
        let position = numbered.iter().position(|s| s.key == stage.key).unwrap_or(0) + 1;
        format!("Stage {}/{}: {}", position, numbered.len(), stage.display_name)
    };

    let mut out = format!("{} {}", p.glyphs.pin, p.bold(&label));
    if let Some(elapsed) = stage_elapsed_ms(stage, progress) {
        out.push_str(&format!(" ({})", format_duration(elapsed)));
    }
    out.push('\n');
    out.push_str(&p.light_rule());

    if let Some(error) = &stage.error {
        out.push_str(&format!("\n{} {}", p.glyphs.failed, p.paint(error, Style::new().red())));
    }
    for agent in &stage.agents {
        out.push('\n');
        out.push_str(&render_agent_line(agent, p));
    }
    Some(out)
}

fn render_agent_line(agent: &AgentView, p: &Painter<'_>) -> String {
    let duration = match (agent.status.is_terminal(), agent.duration_ms) {
        (true, Some(ms)) => format!("({})", format_duration(ms)),
        _ => String::new(),
    };
    let name = format!("{:<width$}", agent.name, width = AGENT_NAME_WIDTH);
    let word = format!(
        "{:<width$}",
        agent.status.as_str().to_uppercase(),
        width = STATUS_WORD_WIDTH
    );
    let mut line = format!(
        "{} [{}] {} {} {}",
        p.glyphs.branch,
        p.glyph(agent.status),
        name,
        p.status_paint(&word, agent.status),
        duration,
    )
    .trim_end()
    .to_string();

    let detail = match agent.status {
        StatusKind::Active | StatusKind::Waiting if !agent.message.is_empty() => {
            Some(format!("{} {}", p.glyphs.speech, agent.message))
        }
        StatusKind::Failed if !agent.message.is_empty() => Some(format!(
            "{} {}",
            p.glyphs.failed,
            p.paint(&agent.message, Style::new().red())
        )),
        StatusKind::Completed if !agent.preview.is_empty() => {
            Some(format!("{} {}", p.glyphs.output, p.dim(&agent.preview)))
        }
        _ => None,
    };
    if let Some(detail) = detail {
        line.push_str(&format!("\n{}   {}", p.glyphs.pipe, detail));
    }
    line
}

fn stage_elapsed_ms(stage: &StageView, progress: &ProgressEstimate) -> Option<u64> {
    if let Some(ms) = stage.duration_ms {
        return Some(ms);
    }
    let started = stage.started_at?;
    u64::try_from((progress.as_of - started).num_milliseconds()).ok()
}

fn render_progress(progress: &ProgressEstimate, p: &Painter<'_>) -> String {
    let width = p.options.bar_width;
    let fraction = if progress.fraction.is_finite() {
        progress.fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = ((width as f64) * fraction).floor() as usize;
    let bar = format!(
        "{}{}",
        p.glyphs.bar_full.repeat(filled.min(width)),
        p.glyphs.bar_empty.repeat(width.saturating_sub(filled)),
    );
    let remaining = progress
        .confident_remaining_ms()
        .map(format_duration)
        .unwrap_or_else(|| "Calculating...".to_string());

    format!(
        "Progress: {} {}\nAgents: {}/{} | Elapsed: {} | Est. Remaining: {}",
        p.paint(&bar, Style::new().cyan()),
        format_percentage(fraction),
        progress.completed_agents,
        progress.total_agents,
        format_duration(progress.elapsed_ms),
        remaining,
    )
}

fn render_current_activity(run: &RunView, p: &Painter<'_>) -> Option<String> {
    let agent = run.active_agent()?;
    let mut out = format!("{} Current: {}", p.glyphs.speech, p.bold(&agent.name));
    if !agent.message.is_empty() {
        out.push_str(&format!(" - {}", agent.message));
    }
    Some(out)
}

fn render_completion(run: &RunView, progress: &ProgressEstimate, p: &Painter<'_>) -> Option<String> {
    let (glyph, headline, style) = match run.outcome {
        RunOutcome::Unset => return None,
        RunOutcome::Succeeded => (p.glyphs.success, "PIPELINE COMPLETED", Style::new().green().bold()),
        RunOutcome::Failed => (p.glyphs.failed, "PIPELINE FAILED", Style::new().red().bold()),
    };

    let mut out = format!(
        "{} {}\n{}\nTotal Duration: {}",
        glyph,
        p.paint(headline, style),
        p.heavy_rule(),
        format_duration(progress.elapsed_ms),
    );
    if let Some(ended) = run.ended_at {
        out.push_str(&format!("\nFinished: {}", ended.format("%Y-%m-%d %H:%M:%S UTC")));
    }
    if let Some(summary) = &run.summary {
        out.push_str(&format!("\nSummary: {}", summary));
    }
    Some(out)
}

/// Render the version info.
pub fn render_version() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let git_hash = option_env!("GIT_HASH").unwrap_or("dev");
    let build_ts = option_env!("BUILD_TIMESTAMP").unwrap_or("unknown");
    format!("stagewatch {}\nCommit: {}\nBuilt: {}", version, git_hash, build_ts)
}

struct Painter<'a> {
    options: &'a RenderOptions,
    glyphs: &'static Glyphs,
}

impl<'a> Painter<'a> {
    fn new(options: &'a RenderOptions) -> Self {
        Self { options, glyphs: options.glyphs.glyphs() }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.options.color {
            style.force_styling(true).apply_to(text).to_string()
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(text, Style::new().bold())
    }

    fn dim(&self, text: &str) -> String {
        self.paint(text, Style::new().dim())
    }

    fn title(&self, text: &str) -> String {
        format!("{} {}", self.glyphs.title, self.paint(text, Style::new().white().bold()))
    }

    fn heavy_rule(&self) -> String {
        self.glyphs.heavy_rule.repeat(RULE_WIDTH)
    }

    fn light_rule(&self) -> String {
        self.glyphs.light_rule.repeat(RULE_WIDTH)
    }

    fn glyph(&self, status: StatusKind) -> &'static str {
        match status {
            StatusKind::Pending => self.glyphs.pending,
            StatusKind::Active => self.glyphs.active,
            StatusKind::Waiting => self.glyphs.waiting,
            StatusKind::Completed => self.glyphs.completed,
            StatusKind::Failed => self.glyphs.failed,
        }
    }

    fn status_paint(&self, text: &str, status: StatusKind) -> String {
        let style = match status {
            StatusKind::Pending => Style::new().dim(),
            StatusKind::Active => Style::new().yellow().bold(),
            StatusKind::Waiting => Style::new().cyan(),
            StatusKind::Completed => Style::new().green(),
            StatusKind::Failed => Style::new().red().bold(),
        };
        self.paint(text, style)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use crate::pipeline::phase::StageConfig;
    use crate::pipeline::state::RunModel;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn ascii() -> RenderOptions {
        RenderOptions { glyphs: GlyphSet::Ascii, ..Default::default() }
    }

    fn sample_run() -> RunModel {
        let topology = vec![
            StageConfig::new("intent", "INTENT ANALYSIS", &["intent-cc", "intent-gpt5"]),
            StageConfig::new("planning", "PLANNING", &["plan-cc"]),
            StageConfig::new("rollback", "ROLLBACK", &["rollback-cc"]).optional(),
        ];
        RunModel::new(
            "Convert authentication system to async with comprehensive tests",
            "pip_20260301_090000_abcd1234",
            t(0),
            &topology,
        )
        .unwrap()
    }

    fn frame(run: &RunModel, now: DateTime<Utc>, options: &RenderOptions) -> String {
        let snapshot = RunSnapshot { revision: 1, run: Some(run.to_view()) };
        render_snapshot(&snapshot, now, options)
    }

    #[test]
    fn test_render_idle() {
        let out = render(&RunSnapshot::empty(), &ProgressEstimate::idle(t(0)), &ascii());
        assert!(out.contains("No pipeline run in progress."));
        assert!(!out.contains("Progress:"));
    }

    #[test]
    fn test_header_truncates_request() {
        let out = frame(&sample_run(), t(0), &ascii());
        assert!(out.contains("Request: Convert authentication system to async with compre..."));
        assert!(out.contains("Started: 2026-03-01 09:00:00 UTC"));
        assert!(out.contains("Pipeline ID: pip_20260301_090000_abcd1234"));
    }

    #[test]
    fn test_overview_hides_pending_optional_stage() {
        let mut run = sample_run();
        let out = frame(&run, t(0), &ascii());
        assert!(out.contains("[ ] INTENT ANALYSIS (0/2) -> [ ] PLANNING (0/1)"));
        assert!(!out.contains("ROLLBACK"));

        run.begin_stage("rollback", t(1)).unwrap();
        let out = frame(&run, t(2), &ascii());
        assert!(out.contains("[ ] PLANNING (0/1) -> [>] ROLLBACK (0/1)"));
        assert!(out.contains("@ Stage: ROLLBACK (1s)"));
    }

    #[test]
    fn test_stage_detail_lines() {
        let mut run = sample_run();
        run.begin_stage("intent", t(0)).unwrap();
        run.agent_started("intent-cc", "Analyzing request", t(0)).unwrap();
        run.agent_completed("intent-cc", None, "Found 5 auth-related files", t(2)).unwrap();
        run.agent_started("intent-gpt5", "Analyzing code touchpoints", t(2)).unwrap();

        let out = frame(&run, t(65), &ascii());
        assert!(out.contains("@ Stage 1/2: INTENT ANALYSIS (1m 5s)"));
        assert!(out.contains("|- [+] intent-cc       COMPLETED    (2s)"));
        assert!(out.contains("|   => Found 5 auth-related files"));
        assert!(out.contains("|- [>] intent-gpt5     ACTIVE\n|   * Analyzing code touchpoints"));
        assert!(out.contains("* Current: intent-gpt5 - Analyzing code touchpoints"));
    }

    #[test]
    fn test_failed_agent_shows_error() {
        let mut run = sample_run();
        run.begin_stage("planning", t(0)).unwrap();
        run.agent_started("plan-cc", "", t(0)).unwrap();
        run.agent_failed("plan-cc", "boom", t(3)).unwrap();
        let out = frame(&run, t(3), &ascii());
        assert!(out.contains("|- [x] plan-cc         FAILED       (3s)"));
        assert!(out.contains("|   x boom"));
        assert!(!out.contains("Current:"));
    }

    #[test]
    fn test_progress_bar_and_unknown_remaining() {
        let run = sample_run();
        let out = frame(&run, t(10), &ascii());
        assert!(out.contains(&format!("Progress: {} 0.0%", "-".repeat(40))));
        assert!(out.contains("Agents: 0/4 | Elapsed: 10s | Est. Remaining: Calculating..."));
    }

    #[test]
    fn test_progress_bar_fill() {
        let mut run = sample_run();
        run.agent_completed("intent-cc", None, "", t(30)).unwrap();
        run.agent_completed("intent-gpt5", None, "", t(60)).unwrap();
        let out = frame(&run, t(60), &ascii());
        assert!(out.contains(&format!("Progress: {}{} 50.0%", "#".repeat(20), "-".repeat(20))));
        assert!(out.contains("Est. Remaining: 1m 0s"));
    }

    #[test]
    fn test_completion_block() {
        let mut run = sample_run();
        run.finish(false, Some("evaluation rejected the change"), t(125)).unwrap();
        let out = frame(&run, t(900), &ascii());
        assert!(out.contains("x PIPELINE FAILED"));
        assert!(out.contains("Total Duration: 2m 5s"));
        assert!(out.contains("Summary: evaluation rejected the change"));
    }

    #[test]
    fn test_unicode_glyphs() {
        let mut run = sample_run();
        run.begin_stage("intent", t(0)).unwrap();
        run.complete_stage("intent", t(4)).unwrap();
        let out = frame(&run, t(4), &RenderOptions::default());
        assert!(out.contains("[✅] INTENT ANALYSIS (0/2) → [ ] PLANNING (0/1)"));
        assert!(out.contains("📍 Stage 1/2: INTENT ANALYSIS (4s)"));
    }

    #[test]
    fn test_overview_counts_agents_per_stage() {
        let mut run = sample_run();
        run.agent_completed("intent-cc", None, "", t(1)).unwrap();
        run.agent_started("intent-gpt5", "", t(1)).unwrap();
        run.complete_stage("planning", t(2)).unwrap();
        let out = frame(&run, t(3), &ascii());
        assert!(out.contains("[ ] INTENT ANALYSIS (1/2) -> [+] PLANNING (0/1)"));
    }

    #[test]
    fn test_overview_omits_count_for_stage_without_agents() {
        let topology = vec![
            StageConfig::new("gate", "GATE", &[]),
            StageConfig::new("build", "BUILD", &["compiler"]),
        ];
        let run = RunModel::new("req", "pip_x", t(0), &topology).unwrap();
        let out = frame(&run, t(0), &ascii());
        assert!(out.contains("[ ] GATE -> [ ] BUILD (0/1)"));
    }

    #[test]
    fn test_plain_output_has_no_escape_codes() {
        let mut run = sample_run();
        run.agent_started("intent-cc", "working", t(0)).unwrap();
        let out = frame(&run, t(1), &ascii());
        assert!(!out.contains('\u{1b}'));

        let colored = frame(&run, t(1), &RenderOptions { color: true, ..ascii() });
        assert!(colored.contains('\u{1b}'));
    }

    #[test]
    fn test_render_is_deterministic() {
        let run = sample_run();
        assert_eq!(frame(&run, t(7), &ascii()), frame(&run, t(7), &ascii()));
    }
}

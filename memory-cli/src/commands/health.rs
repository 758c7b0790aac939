//! `do-memory-cli health ...` — the dashboard, maintenance-job, and
//! health-scheduler surface over [`crate::config::CliContext`]'s
//! [`do_memory_core::health`], [`do_memory_core::maintenance`], and
//! [`do_memory_core::monitoring`] stacks.

use clap::Subcommand;
use serde::Serialize;

use crate::config::CliContext;
use crate::errors::{helpers, EnhancedError};
use crate::output::{Output, OutputFormat};

#[derive(Subcommand)]
pub enum HealthCommands {
    /// Overall health score, grade, and top-line recommendations
    Dashboard {
        /// Include per-lifecycle-state counts and the latest capacity forecast
        #[arg(long)]
        detailed: bool,
        /// Force JSON output regardless of the global `--format` flag
        #[arg(long)]
        json: bool,
    },
    /// Maintenance-job surface: quick status, an on-demand report, remediation, or history
    Monitor {
        #[command(subcommand)]
        command: MonitorCommands,
    },
    /// Health-scheduler surface: enable/disable the cron loop or run a job synchronously
    Schedule {
        #[command(subcommand)]
        command: ScheduleCommands,
    },
}

#[derive(Subcommand)]
pub enum MonitorCommands {
    /// Health score plus the count of currently-active alerts
    Status,
    /// Run the weekly health report job now (read-only, no writes)
    Report,
    /// Run weekly archival + monthly cleanup now
    Fix {
        /// Actually apply changes; without this flag the run is a dry-run preview
        #[arg(long)]
        auto: bool,
        /// Force a dry-run even when `--auto` is also passed
        #[arg(long)]
        dry_run: bool,
    },
    /// Recent maintenance job history
    History {
        /// Maximum number of past job results to show
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[derive(Subcommand)]
pub enum ScheduleCommands {
    /// Start the cron loop for the configured jobs
    Enable,
    /// Stop the cron loop (manual triggers still work)
    Disable,
    /// Which jobs are configured/running, plus the last result per job
    Status,
    /// Run one or all jobs synchronously as a dry-run, without installing any cron trigger
    Test {
        /// Which job to test
        #[arg(long, default_value = "all")]
        job: TestJob,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum TestJob {
    All,
    Archival,
    Cleanup,
    Report,
}

#[derive(Serialize)]
struct DashboardReport {
    overall: f64,
    grade: String,
    noise_ratio: f64,
    duplicate_rate: f64,
    contradiction_rate: f64,
    distribution_score: f64,
    total: usize,
    recommendations: Vec<String>,
    detail: Option<DashboardDetail>,
}

#[derive(Serialize)]
struct DashboardDetail {
    active_count: usize,
    recent_count: usize,
    archived_count: usize,
    stale_count: usize,
    capacity_status: Option<String>,
    active_alerts: usize,
}

impl Output for DashboardReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "Overall health: {:.1}/100 ({})", self.overall, self.grade)?;
        writeln!(
            writer,
            "  noise={:.2} duplicate={:.2} contradiction={:.2} distribution={:.1}",
            self.noise_ratio, self.duplicate_rate, self.contradiction_rate, self.distribution_score
        )?;
        writeln!(writer, "  {} memories scored", self.total)?;
        if let Some(detail) = &self.detail {
            writeln!(
                writer,
                "  active={} recent={} archived={} stale={}",
                detail.active_count, detail.recent_count, detail.archived_count, detail.stale_count
            )?;
            writeln!(writer, "  active alerts: {}", detail.active_alerts)?;
            if let Some(status) = &detail.capacity_status {
                writeln!(writer, "  capacity status: {status}")?;
            }
        }
        if !self.recommendations.is_empty() {
            writeln!(writer, "Recommendations:")?;
            for r in &self.recommendations {
                writeln!(writer, "  - {r}")?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct JobReport {
    job_name: String,
    success: bool,
    memories_processed: usize,
    memories_archived: usize,
    memories_deleted: usize,
    errors: Vec<String>,
    timestamp: chrono::DateTime<chrono::Utc>,
}

impl From<do_memory_core::JobResult> for JobReport {
    fn from(r: do_memory_core::JobResult) -> Self {
        Self {
            job_name: r.job_name.to_string(),
            success: r.success,
            memories_processed: r.memories_processed,
            memories_archived: r.memories_archived,
            memories_deleted: r.memories_deleted,
            errors: r.errors,
            timestamp: r.timestamp,
        }
    }
}

impl Output for JobReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        let verb = if self.success { "ok" } else { "failed" };
        writeln!(
            writer,
            "[{verb}] {}: processed={} archived={} deleted={}",
            self.job_name, self.memories_processed, self.memories_archived, self.memories_deleted
        )?;
        for e in &self.errors {
            writeln!(writer, "  error: {e}")?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct FixReport {
    archival: JobReport,
    cleanup: JobReport,
    dry_run: bool,
}

impl Output for FixReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "{}", if self.dry_run { "Dry run (no changes applied):" } else { "Applied:" })?;
        self.archival.write_human(&mut writer)?;
        self.cleanup.write_human(&mut writer)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct HistoryReport {
    jobs: Vec<JobReport>,
}

impl Output for HistoryReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        if self.jobs.is_empty() {
            writeln!(writer, "No maintenance jobs have run yet.")?;
            return Ok(());
        }
        for job in &self.jobs {
            job.write_human(&mut writer)?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusReport {
    overall: f64,
    grade: String,
    active_alerts: usize,
}

impl Output for StatusReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "Health: {:.1}/100 ({}), {} active alert(s)", self.overall, self.grade, self.active_alerts)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct ScheduleStatusReport {
    enabled: bool,
    running: bool,
    weekly_archival_enabled: bool,
    monthly_cleanup_enabled: bool,
    weekly_report_enabled: bool,
    last_jobs: Vec<JobReport>,
}

impl Output for ScheduleStatusReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "enabled={} running={}", self.enabled, self.running)?;
        writeln!(
            writer,
            "jobs: weekly_archival={} monthly_cleanup={} weekly_report={}",
            self.weekly_archival_enabled, self.monthly_cleanup_enabled, self.weekly_report_enabled
        )?;
        if !self.last_jobs.is_empty() {
            writeln!(writer, "last results:")?;
            for job in &self.last_jobs {
                job.write_human(&mut writer)?;
            }
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ToggleReport {
    changed: bool,
}

impl Output for ToggleReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "{}", if self.changed { "ok" } else { "already in that state" })?;
        Ok(())
    }
}

#[derive(Serialize)]
struct TestReport {
    jobs: Vec<JobReport>,
}

impl Output for TestReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        writeln!(writer, "Test run (dry-run, no cron installed):")?;
        for job in &self.jobs {
            job.write_human(&mut writer)?;
        }
        Ok(())
    }
}

async fn health_score(ctx: &CliContext) -> anyhow::Result<do_memory_core::HealthScore> {
    let memories = ctx
        .store
        .get_all_memories()
        .await
        .context_with_help("Failed to load memories for health scoring", helpers::STORAGE_ERROR_HELP)?;
    let total = ctx.store.count().await.context_with_help("Failed to count memories", helpers::STORAGE_ERROR_HELP)?;
    Ok(ctx.health_scorer.calculate_overall_health(&memories, total))
}

pub async fn dispatch(command: HealthCommands, ctx: &CliContext, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        HealthCommands::Dashboard { detailed, json } => {
            let format = if json { OutputFormat::Json } else { format };
            let score = health_score(ctx).await?;
            let detail = if detailed {
                let active_alerts = ctx
                    .alerts
                    .list_active_alerts()
                    .await
                    .context_with_help("Failed to load alerts", helpers::STORAGE_ERROR_HELP)?
                    .len();
                let capacity_status = ctx
                    .capacity
                    .forecast(30)
                    .await
                    .ok()
                    .map(|report| format!("{:?}", report.overall_status));
                Some(DashboardDetail {
                    active_count: score.active_count,
                    recent_count: score.recent_count,
                    archived_count: score.archived_count,
                    stale_count: score.stale_count,
                    capacity_status,
                    active_alerts,
                })
            } else {
                None
            };
            format.print_output(&DashboardReport {
                overall: score.overall,
                grade: score.grade.to_string(),
                noise_ratio: score.noise_ratio,
                duplicate_rate: score.duplicate_rate,
                contradiction_rate: score.contradiction_rate,
                distribution_score: score.distribution_score,
                total: score.total,
                recommendations: score.recommendations,
                detail,
            })?;
        }
        HealthCommands::Monitor { command } => dispatch_monitor(command, ctx, format).await?,
        HealthCommands::Schedule { command } => dispatch_schedule(command, ctx, format).await?,
    }
    Ok(())
}

async fn dispatch_monitor(command: MonitorCommands, ctx: &CliContext, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        MonitorCommands::Status => {
            let score = health_score(ctx).await?;
            let active_alerts = ctx
                .alerts
                .list_active_alerts()
                .await
                .context_with_help("Failed to load alerts", helpers::STORAGE_ERROR_HELP)?
                .len();
            format.print_output(&StatusReport { overall: score.overall, grade: score.grade.to_string(), active_alerts })?;
        }
        MonitorCommands::Report => {
            let result = ctx.health_jobs.weekly_health_report_job().await;
            format.print_output(&JobReport::from(result))?;
        }
        MonitorCommands::Fix { auto, dry_run } => {
            let effective_dry_run = dry_run || !auto;
            let archival = ctx.health_jobs.weekly_archival_job(effective_dry_run).await;
            let cleanup = ctx
                .health_jobs
                .monthly_cleanup_job(effective_dry_run, do_memory_core::constants::defaults::CLEANUP_MIN_AGE_DAYS)
                .await;
            format.print_output(&FixReport {
                archival: JobReport::from(archival),
                cleanup: JobReport::from(cleanup),
                dry_run: effective_dry_run,
            })?;
        }
        MonitorCommands::History { limit } => {
            let jobs = ctx.health_jobs.get_job_history(limit).into_iter().map(JobReport::from).collect();
            format.print_output(&HistoryReport { jobs })?;
        }
    }
    Ok(())
}

async fn dispatch_schedule(command: ScheduleCommands, ctx: &CliContext, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        ScheduleCommands::Enable => {
            let changed = ctx
                .health_scheduler
                .start()
                .await
                .context_with_help("Failed to start the health scheduler", helpers::CONFIG_ERROR_HELP)?;
            format.print_output(&ToggleReport { changed })?;
        }
        ScheduleCommands::Disable => {
            let changed = ctx
                .health_scheduler
                .stop()
                .await
                .context_with_help("Failed to stop the health scheduler", helpers::CONFIG_ERROR_HELP)?;
            format.print_output(&ToggleReport { changed })?;
        }
        ScheduleCommands::Status => {
            let status = ctx.health_scheduler.get_status().await;
            format.print_output(&ScheduleStatusReport {
                enabled: status.enabled,
                running: status.running,
                weekly_archival_enabled: status.weekly_archival_enabled,
                monthly_cleanup_enabled: status.monthly_cleanup_enabled,
                weekly_report_enabled: status.weekly_report_enabled,
                last_jobs: status.last_job_results.into_iter().map(JobReport::from).collect(),
            })?;
        }
        ScheduleCommands::Test { job } => {
            let mut jobs = Vec::new();
            if matches!(job, TestJob::All | TestJob::Archival) {
                jobs.push(ctx.health_scheduler.trigger_archival_now(true).await);
            }
            if matches!(job, TestJob::All | TestJob::Cleanup) {
                jobs.push(ctx.health_scheduler.trigger_cleanup_now(true).await);
            }
            if matches!(job, TestJob::All | TestJob::Report) {
                jobs.push(ctx.health_scheduler.trigger_report_now().await);
            }
            format.print_output(&TestReport { jobs: jobs.into_iter().map(JobReport::from).collect() })?;
        }
    }
    Ok(())
}

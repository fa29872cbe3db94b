//! Run reports and verdicts
use std::fmt;
use std::time::Duration;
use wavecrest_core::{CounterSnapshot, LatencySummary, Thresholds};

/// What happened to one ramp batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchRecord {
    pub index: usize,
    pub size: usize,
    /// Every attempt resolved before the batch deadline.
    pub resolved: bool,
    pub paused_after: bool,
}

/// Result of the ramp phase, before any hold.
#[derive(Debug, Clone)]
pub struct RampOutcome {
    /// Target after clamping to the credential pool.
    pub target: usize,
    pub batches: Vec<BatchRecord>,
    pub elapsed: Duration,
    pub counters: CounterSnapshot,
}

impl RampOutcome {
    pub fn success_rate(&self) -> f64 {
        percent(self.counters.succeeded, self.target as u64)
    }
}

impl fmt::Display for RampOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ramp complete:")?;
        writeln!(f, "  duration:     {}", seconds(self.elapsed))?;
        writeln!(f, "  connected:    {}", self.counters.succeeded)?;
        writeln!(f, "  failed:       {}", self.counters.failed)?;
        write!(f, "  success rate: {:.1}%", self.success_rate())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampVerdict {
    Pass,
    MarginalPass,
    NeedsOptimization,
}

pub fn judge_ramp(alive: u64, target: usize, thresholds: &Thresholds) -> RampVerdict {
    if alive >= thresholds.pass_alive {
        RampVerdict::Pass
    } else if alive as f64 >= thresholds.marginal_ratio * target as f64 {
        RampVerdict::MarginalPass
    } else {
        RampVerdict::NeedsOptimization
    }
}

/// Final report of a connection-capacity run.
#[derive(Debug, Clone)]
pub struct RampReport {
    pub outcome: RampOutcome,
    /// Counters at the end of the hold, before shutdown closed anything.
    pub held: CounterSnapshot,
    pub thresholds: Thresholds,
    pub verdict: RampVerdict,
}

impl RampReport {
    pub fn new(outcome: RampOutcome, held: CounterSnapshot, thresholds: Thresholds) -> Self {
        let verdict = judge_ramp(held.alive(), outcome.target, &thresholds);
        Self {
            outcome,
            held,
            thresholds,
            verdict,
        }
    }

    pub fn alive(&self) -> u64 {
        self.held.alive()
    }

    pub fn survival_rate(&self) -> f64 {
        percent(self.alive(), self.outcome.target as u64)
    }
}

impl fmt::Display for RampReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "============ Connection capacity ============")?;
        writeln!(f, "  target:        {}", self.outcome.target)?;
        writeln!(f, "  ramp duration: {}", seconds(self.outcome.elapsed))?;
        writeln!(f, "  attempted:     {}", self.held.attempted)?;
        writeln!(f, "  connected:     {}", self.held.succeeded)?;
        writeln!(f, "  failed:        {}", self.held.failed)?;
        writeln!(f, "  disconnected:  {}", self.held.disconnected)?;
        writeln!(f, "  alive:         {}", self.alive())?;
        writeln!(f, "  survival rate: {:.1}%", self.survival_rate())?;
        writeln!(f)?;

        let conclusion = match self.verdict {
            RampVerdict::Pass => format!(
                "PASS: {} concurrent connections sustained",
                self.alive()
            ),
            RampVerdict::MarginalPass => format!(
                "MARGINAL PASS: {} connections sustained (survival >= {:.0}%)",
                self.alive(),
                self.thresholds.marginal_ratio * 100.0
            ),
            RampVerdict::NeedsOptimization => format!(
                "NEEDS OPTIMIZATION: only {} of {} connections alive",
                self.alive(),
                self.outcome.target
            ),
        };
        writeln!(f, "  >>> {conclusion}")?;
        write!(f, "=============================================")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyVerdict {
    WithinBudget,
    OverBudget,
    /// Nothing arrived, so there is nothing to judge.
    NoSamples,
}

pub fn judge_latency(summary: Option<&LatencySummary>, thresholds: &Thresholds) -> LatencyVerdict {
    match summary {
        None => LatencyVerdict::NoSamples,
        Some(summary) if summary.p99 < thresholds.p99 => LatencyVerdict::WithinBudget,
        Some(_) => LatencyVerdict::OverBudget,
    }
}

/// Final report of a fan-out latency run.
#[derive(Debug, Clone)]
pub struct LatencyReport {
    pub receiver_id: String,
    pub sent: u64,
    pub received: u64,
    /// From the first publish to the end of the drain window.
    pub duration: Duration,
    pub latency: Option<LatencySummary>,
    pub thresholds: Thresholds,
    pub verdict: LatencyVerdict,
}

impl LatencyReport {
    pub fn new(
        receiver_id: String,
        sent: u64,
        received: u64,
        duration: Duration,
        latency: Option<LatencySummary>,
        thresholds: Thresholds,
    ) -> Self {
        let verdict = judge_latency(latency.as_ref(), &thresholds);
        Self {
            receiver_id,
            sent,
            received,
            duration,
            latency,
            thresholds,
            verdict,
        }
    }

    pub fn lost(&self) -> u64 {
        self.sent.saturating_sub(self.received)
    }

    /// Received events per second over the whole run.
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.received as f64 / secs
        } else {
            0.0
        }
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "============ Fan-out latency ============")?;
        writeln!(f, "  receiver:   {}", self.receiver_id)?;
        writeln!(f, "  sent:       {}", self.sent)?;
        writeln!(f, "  received:   {}", self.received)?;
        writeln!(f, "  lost:       {}", self.lost())?;
        writeln!(f, "  duration:   {}", seconds(self.duration))?;
        writeln!(f, "  throughput: {:.0} msg/s", self.throughput())?;
        writeln!(f)?;

        match &self.latency {
            Some(latency) => {
                writeln!(f, "  end-to-end latency (publish -> client):")?;
                writeln!(f, "    min:  {}", millis(latency.min))?;
                writeln!(f, "    p50:  {}", millis(latency.p50))?;
                writeln!(f, "    p90:  {}", millis(latency.p90))?;
                writeln!(f, "    p95:  {}", millis(latency.p95))?;
                writeln!(f, "    p99:  {}", millis(latency.p99))?;
                writeln!(f, "    max:  {}", millis(latency.max))?;
                writeln!(f, "    mean: {}", millis(latency.mean))?;
                writeln!(f)?;

                let budget = humantime::format_duration(self.thresholds.p99);
                match self.verdict {
                    LatencyVerdict::WithinBudget => {
                        writeln!(f, "  >>> PASS: p99 < {budget}")?
                    }
                    _ => writeln!(
                        f,
                        "  >>> NEEDS OPTIMIZATION: p99 = {}, over {budget}",
                        millis(latency.p99)
                    )?,
                }
            }
            None => {
                writeln!(f, "  WARNING: no events received, latency cannot be computed.")?;
                writeln!(f, "  Likely causes:")?;
                writeln!(f, "    1. server not running or not subscribed to the topic")?;
                writeln!(f, "    2. invalid token, WebSocket upgrade rejected")?;
                writeln!(f, "    3. routing target does not start with the user prefix 'U'")?;
            }
        }
        write!(f, "=========================================")
    }
}

fn percent(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 * 100.0 / denominator as f64
    }
}

fn millis(d: Duration) -> String {
    format!("{:.2} ms", d.as_secs_f64() * 1_000.0)
}

fn seconds(d: Duration) -> String {
    format!("{:.1} s", d.as_secs_f64())
}

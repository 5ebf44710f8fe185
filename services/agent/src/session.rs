//! The agent session: starts the voice runtime, greets the user, then answers
//! turns and correlates their latency metrics until the runtime closes.

use crate::{
    cycle::{self, Conversation},
    tools::AdvisorTools,
};
use anyhow::Result;
use finbot_core::{
    advisor::{ADVISOR_INSTRUCTIONS, GREETING_INSTRUCTIONS},
    llm_client::LLMClient,
    metrics::{MetricKind, MetricSample, MetricsCorrelator, MetricsSink, Observation},
    session::{RoomJoin, RuntimeEvent, SessionOptions, VoiceRuntime},
};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, instrument, warn};

/// How often stale pending turns are swept out of the correlator.
const EVICTION_SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Counters reported when a session ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub turns: usize,
    pub failed_turns: usize,
    pub rows_logged: usize,
    pub incomplete_turns: usize,
}

pub struct AgentSession<R: VoiceRuntime, S: MetricsSink> {
    runtime: R,
    llm: Arc<dyn LLMClient>,
    tools: AdvisorTools,
    correlator: MetricsCorrelator<S>,
    conversation: Conversation,
    report: SessionReport,
}

impl<R: VoiceRuntime, S: MetricsSink> AgentSession<R, S> {
    pub fn new(
        runtime: R,
        llm: Arc<dyn LLMClient>,
        tools: AdvisorTools,
        correlator: MetricsCorrelator<S>,
    ) -> Result<Self> {
        Ok(Self {
            runtime,
            llm,
            tools,
            correlator,
            conversation: Conversation::new(ADVISOR_INSTRUCTIONS)?,
            report: SessionReport::default(),
        })
    }

    pub fn correlator(&self) -> &MetricsCorrelator<S> {
        &self.correlator
    }

    /// Runs the session until the runtime closes or `shutdown` resolves.
    ///
    /// Shutdown also interrupts a turn whose reply is still being generated.
    #[instrument(name = "agent_session", skip_all, fields(room = %join.room))]
    pub async fn run(
        mut self,
        join: &RoomJoin,
        options: &SessionOptions,
        shutdown: impl Future<Output = ()>,
    ) -> Result<SessionReport> {
        self.runtime.start(join, options).await?;
        self.greet().await;

        tokio::pin!(shutdown);
        let mut sweep = tokio::time::interval(EVICTION_SWEEP_INTERVAL);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested. Ending agent session.");
                    break;
                }
                _ = sweep.tick() => {
                    let evicted = self.correlator.evict_expired(Instant::now());
                    self.report.incomplete_turns += evicted.len();
                }
                event = self.runtime.next_event() => {
                    match event? {
                        Some(event) => {
                            tokio::select! {
                                _ = &mut shutdown => {
                                    warn!("Shutdown requested mid-turn. Ending agent session.");
                                    break;
                                }
                                _ = self.handle_event(event) => {}
                            }
                        }
                        None => {
                            info!("Voice runtime closed.");
                            break;
                        }
                    }
                }
            }
        }

        self.report.incomplete_turns += self.correlator.pending_len();
        info!(report = ?self.report, "Agent session finished.");
        Ok(self.report)
    }

    async fn greet(&mut self) {
        match cycle::generate_reply(self.llm.as_ref(), &mut self.conversation, GREETING_INSTRUCTIONS)
            .await
        {
            Ok(reply) if !reply.text.is_empty() => {
                if let Err(e) = self.runtime.say(None, &reply.text).await {
                    error!(error = ?e, "Failed to speak greeting");
                }
            }
            Ok(_) => warn!("LLM returned an empty greeting"),
            Err(e) => error!(error = ?e, "Failed to generate greeting"),
        }
    }

    async fn handle_event(&mut self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::UserTurn {
                speech_id,
                transcript,
            } => self.answer_turn(speech_id, transcript).await,
            RuntimeEvent::Metrics(sample) => self.record_metric(sample),
        }
    }

    #[instrument(skip_all, fields(%speech_id))]
    async fn answer_turn(&mut self, speech_id: String, transcript: String) {
        self.report.turns += 1;
        info!(%transcript, "User turn received");

        let reply = match cycle::handle_user_turn(
            self.llm.as_ref(),
            &self.tools,
            &mut self.conversation,
            &transcript,
        )
        .await
        {
            Ok(reply) => reply,
            Err(e) => {
                self.report.failed_turns += 1;
                error!(error = ?e, "Reply cycle failed");
                return;
            }
        };

        if let Some(ttft) = reply.ttft {
            self.record_metric(MetricSample::new(
                speech_id.clone(),
                MetricKind::Ttft,
                ttft.as_secs_f64(),
            ));
        }

        if reply.text.is_empty() {
            warn!("LLM produced no reply text");
            return;
        }
        info!(tool_calls = reply.tool_calls, "Speaking reply");
        if let Err(e) = self.runtime.say(Some(&speech_id), &reply.text).await {
            error!(error = ?e, "Failed to speak reply");
        }
    }

    fn record_metric(&mut self, sample: MetricSample) {
        match self.correlator.observe(sample) {
            Ok(Observation::Completed(_)) => self.report.rows_logged += 1,
            Ok(Observation::Pending | Observation::Duplicate) => {}
            Err(e) => error!(error = %e, "Failed to log turn latency"),
        }
    }
}

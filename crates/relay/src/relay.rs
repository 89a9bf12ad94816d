//! Relay loop: one task per admitted call
//!
//! Multiplexes the carrier websocket and the AI session so a frame from
//! either leg is forwarded without waiting on the other. All sequencing
//! decisions are delegated to [`CallSession`]; this loop only performs
//! the actions it returns.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use tokio::sync::mpsc;

use receptionist_config::Settings;
use receptionist_core::BusinessConfig;
use receptionist_store::FrameStore;
use receptionist_tools::ToolRegistry;

use crate::carrier::CarrierEvent;
use crate::realtime::{AiSession, ClientEvent};
use crate::recorder::{spawn_recorder, RecorderHandle};
use crate::session::{CallSession, RelayAction, RelayPhase};
use crate::RelayError;

const FINALIZE_TIMEOUT: Duration = Duration::from_secs(5);
const RECONNECT_DELAY: Duration = Duration::from_millis(500);

/// Everything a call task needs, cloned per call
#[derive(Clone)]
pub struct RelayContext {
    pub settings: Arc<Settings>,
    pub business: Arc<BusinessConfig>,
    pub tools: Arc<ToolRegistry>,
    pub store: Arc<dyn FrameStore>,
    pub eval_tx: Option<mpsc::UnboundedSender<String>>,
}

impl RelayContext {
    fn greeting(&self) -> String {
        self.settings
            .realtime
            .greeting_template
            .replace("{business}", &self.business.name)
    }

    fn session_config(&self) -> ClientEvent {
        ClientEvent::session_config(
            &self.settings.realtime,
            &self.settings.turn_detection,
            &self.business,
            &self.tools.specs_for(&self.business.tool_definitions),
        )
    }
}

/// Drive one call to completion. Returns once both legs are closed and
/// the conversation frame has been finalized.
pub async fn run_call(mut carrier: WebSocket, ctx: RelayContext) -> Result<(), RelayError> {
    let mut ai = AiSession::connect(&ctx.settings.realtime).await?;
    ai.send(&ctx.session_config()).await?;

    let mut session = CallSession::new("pending", ctx.greeting());
    let mut recorder: Option<RecorderHandle> = None;
    let mut ai_reconnected = false;

    loop {
        let actions: Vec<RelayAction> = tokio::select! {
            carrier_msg = carrier.recv() => {
                match carrier_msg {
                    Some(Ok(Message::Text(text))) => match serde_json::from_str::<CarrierEvent>(&text) {
                        Ok(event) => {
                            if let CarrierEvent::Start { start } = &event {
                                start_recorder(start, &ctx, &mut session, &mut recorder);
                            }
                            session.on_carrier_event(event)
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "Unparseable carrier event, skipping");
                            Vec::new()
                        }
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        session.terminate();
                        Vec::new()
                    }
                    Some(Ok(_)) => Vec::new(),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "Carrier leg error");
                        session.terminate();
                        Vec::new()
                    }
                }
            }
            ai_event = ai.next_event() => {
                match ai_event {
                    Some(event) => session.on_ai_event(event),
                    None => {
                        // AI leg dropped. One reconnect with the same call
                        // context; a second drop ends the call.
                        if session.phase() != RelayPhase::Terminating && !ai_reconnected {
                            ai_reconnected = true;
                            tracing::warn!(call_sid = %session.call_sid, "AI session dropped, reconnecting");
                            tokio::time::sleep(RECONNECT_DELAY).await;
                            match AiSession::connect(&ctx.settings.realtime).await {
                                Ok(new_ai) => {
                                    ai = new_ai;
                                    if ai.send(&ctx.session_config()).await.is_err() {
                                        session.terminate_with_farewell()
                                    } else {
                                        Vec::new()
                                    }
                                }
                                Err(e) => {
                                    tracing::error!(call_sid = %session.call_sid, error = %e, "AI reconnect failed");
                                    session.terminate_with_farewell()
                                }
                            }
                        } else {
                            session.terminate_with_farewell()
                        }
                    }
                }
            }
        };

        apply_actions(actions, &mut session, &mut ai, &mut carrier, &recorder, &ctx).await;

        if session.phase() == RelayPhase::Terminating {
            break;
        }
    }

    if let Some(recorder) = recorder {
        let ack = recorder.finalize(session.ended_at());
        if tokio::time::timeout(FINALIZE_TIMEOUT, ack).await.is_err() {
            tracing::warn!(call_sid = %session.call_sid, "Frame finalize timed out");
        }
    }

    ai.close().await;
    let _ = carrier.send(Message::Close(None)).await;
    tracing::info!(
        call_sid = %session.call_sid,
        dropped_egress = session.dropped_egress(),
        "Call ended"
    );
    Ok(())
}

fn start_recorder(
    start: &crate::carrier::StreamStart,
    ctx: &RelayContext,
    session: &mut CallSession,
    recorder: &mut Option<RecorderHandle>,
) {
    if recorder.is_some() {
        return;
    }
    let call_sid = start
        .custom_parameters
        .get("call_sid")
        .cloned()
        .or_else(|| start.call_sid.clone())
        .unwrap_or_else(|| "unknown".to_string());
    let caller = start
        .custom_parameters
        .get("from_number")
        .cloned()
        .unwrap_or_else(|| "unknown".to_string());

    session.call_sid = call_sid.clone();
    *recorder = Some(spawn_recorder(
        &call_sid,
        &ctx.business.id,
        &caller,
        &ctx.business.timezone,
        ctx.store.clone(),
        ctx.eval_tx.clone(),
    ));
}

/// Perform actions in order. Tool executions run inline and their
/// follow-up actions are spliced in behind the current batch.
async fn apply_actions(
    actions: Vec<RelayAction>,
    session: &mut CallSession,
    ai: &mut AiSession,
    carrier: &mut WebSocket,
    recorder: &Option<RecorderHandle>,
    ctx: &RelayContext,
) {
    let mut queue: VecDeque<RelayAction> = actions.into();

    while let Some(action) = queue.pop_front() {
        match action {
            RelayAction::ToAi(event) => {
                if let Err(e) = ai.send(&event).await {
                    tracing::warn!(call_sid = %session.call_sid, error = %e, "Failed to send to AI leg");
                }
            }
            RelayAction::ToCarrier(message) => {
                match serde_json::to_string(&message) {
                    Ok(text) => {
                        if let Err(e) = carrier.send(Message::Text(text)).await {
                            tracing::warn!(call_sid = %session.call_sid, error = %e, "Carrier send failed");
                            session.terminate();
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "Carrier message serialization failed"),
                }
            }
            RelayAction::ExecuteTool {
                call_id,
                name,
                arguments,
            } => {
                let result = match ctx.tools.execute(&name, arguments.clone()).await {
                    Ok(result) => result,
                    Err(e) => {
                        tracing::error!(call_sid = %session.call_sid, tool = %name, error = %e, "Tool execution failed");
                        format!("Error: {e}")
                    }
                };
                for follow_up in session.on_tool_result(&call_id, &name, arguments, &result) {
                    queue.push_back(follow_up);
                }
            }
            RelayAction::Record(turn) => {
                if let Some(recorder) = recorder {
                    recorder.record(turn);
                }
            }
        }
    }
}

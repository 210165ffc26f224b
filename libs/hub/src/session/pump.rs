//! Read and write loops of one session.
//!
//! ```text
//!   transport ──read_frame──▶ read_pump ──▶ on_message / on_pong / on_close
//!
//!   outbound queue ─────┐
//!   subscription chan ──┤
//!   heartbeat ticker ───┼──▶ write_pump ──write_frame──▶ transport
//!   actor termination ──┘
//! ```
//!
//! Every way out of either loop is reported through the error handler
//! exactly once per loop. The write pump owns teardown of the transport; the
//! read pump is woken by the session's closed signal.

use super::Session;
use crate::transport::{CloseReason, Frame, FrameSink, FrameSource, CLOSE_NO_STATUS};
use crate::{Envelope, FrameKind, HubError, TransportError};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, timeout_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Consume inbound frames until the transport fails, the peer closes, the
/// read deadline passes or the session is torn down locally
pub(crate) async fn read_pump<R>(
    session: Arc<Session>,
    mut source: R,
    mut closed: watch::Receiver<bool>,
) where
    R: FrameSource,
{
    let config = &session.shared.config;
    let handlers = &session.shared.handlers;
    let mut deadline = Instant::now() + config.pong_wait();

    let error: HubError = loop {
        let frame = tokio::select! {
            result = timeout_at(deadline, source.read_frame()) => match result {
                Ok(Ok(frame)) => frame,
                Ok(Err(e)) => break e.into(),
                Err(_) => break TransportError::ReadTimeout.into(),
            },
            _ = closed.changed() => break TransportError::Closed.into(),
        };

        match frame {
            Frame::Text(payload) | Frame::Binary(payload)
                if payload.len() > config.max_message_size =>
            {
                break TransportError::MessageTooLarge {
                    size: payload.len(),
                    limit: config.max_message_size,
                }
                .into();
            }
            Frame::Text(payload) => handlers.message(&session, payload).await,
            Frame::Binary(payload) => handlers.message_binary(&session, payload).await,
            Frame::Pong(_) => {
                deadline = Instant::now() + config.pong_wait();
                handlers.pong(&session);
            }
            // Answered by the transport
            Frame::Ping(_) => {}
            Frame::Close(reason) => {
                let (code, reason) = reason
                    .map(|r| (r.code, r.reason))
                    .unwrap_or((CLOSE_NO_STATUS, String::new()));

                if let Err(e) = handlers.close(&session, code, &reason) {
                    break e;
                }

                let payload = if code == CLOSE_NO_STATUS {
                    Bytes::new()
                } else {
                    CloseReason::new(code, "").to_payload()
                };
                if let Err(e) = session.try_enqueue(Envelope::close(payload)) {
                    debug!("Session {} could not echo close: {}", session.id, e);
                }

                break TransportError::ClosedByPeer { code, reason }.into();
            }
        }
    };

    session.report(&error);
}

/// Drain both queues and the heartbeat into the transport, then tear the
/// session down
pub(crate) async fn write_pump<W>(
    session: Arc<Session>,
    mut sink: W,
    mut outbound: mpsc::Receiver<Envelope>,
    mut subscription: mpsc::Receiver<Envelope>,
) where
    W: FrameSink,
{
    let config = &session.shared.config;
    let handlers = &session.shared.handlers;
    let pubsub = &session.shared.pubsub;

    let mut heartbeat = interval_at(Instant::now() + config.ping_period(), config.ping_period());
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut subscribed = true;
    let mut actor_running = true;

    loop {
        let envelope = tokio::select! {
            envelope = outbound.recv() => match envelope {
                Some(envelope) => envelope,
                // Session torn down and queue drained
                None => break,
            },
            envelope = subscription.recv(), if subscribed => match envelope {
                Some(envelope) => envelope,
                None => {
                    subscribed = false;
                    continue;
                }
            },
            _ = pubsub.terminated(), if actor_running => {
                // No topic traffic can arrive any more; drain what is queued
                actor_running = false;
                session.teardown().await;
                continue;
            },
            _ = heartbeat.tick() => Envelope::ping(),
        };

        let written = timeout(config.write_wait(), sink.write_frame(envelope.to_frame())).await;
        let result = match written {
            Ok(result) => result,
            Err(_) => Err(TransportError::WriteTimeout),
        };

        if let Err(e) = result {
            session.report(&e.into());
            break;
        }

        match envelope.kind() {
            FrameKind::Text => handlers.message_sent(&session, envelope.payload()),
            FrameKind::Binary => handlers.message_sent_binary(&session, envelope.payload()),
            FrameKind::Ping => {}
            FrameKind::Close => break,
        }
    }

    // Release the actor if a synchronous publish is waiting on this session
    drop(subscription);
    drop(outbound);

    if let Err(e) = sink.close().await {
        debug!("Session {} transport close failed: {}", session.id, e);
    }
    session.teardown().await;
}

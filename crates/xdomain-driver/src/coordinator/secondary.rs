//! Serving loop of a secondary context.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use xdomain_bridge::{ChannelMessage, Envelope};

use crate::runtime::ContextRuntime;

/// Serve `runtime`'s port until it is cancelled or its port closes. A
/// context asked to shut down, or one that left its origin, closes its own
/// port first.
pub(crate) async fn serve(mut runtime: ContextRuntime, cancel: CancellationToken) {
    let id = runtime.state.id().clone();
    info!(context = %id, "secondary context started");

    loop {
        // Cancellation wins over anything else that is ready.
        let envelope = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = runtime.next_envelope() => match next {
                Some(envelope) => envelope,
                None => break,
            },
        };

        let Envelope {
            from,
            correlation,
            message,
            responder,
        } = envelope;
        let (serialized_fn, args) = match message {
            ChannelMessage::RunCallback {
                serialized_fn,
                args,
            } => (serialized_fn, args),
            other => {
                runtime.handle(Envelope {
                    from,
                    correlation,
                    message: other,
                    responder,
                });
                if runtime.should_stop() {
                    runtime.state.tear_down();
                    break;
                }
                continue;
            }
        };

        debug!(context = %id, from = %from, %correlation, "running callback");
        let reply = tokio::select! {
            biased;
            // Dropping the responder unanswered closes the caller's request.
            _ = cancel.cancelled() => break,
            reply = runtime.run_callback(&serialized_fn, &args) => reply,
        };
        if cancel.is_cancelled() {
            break;
        }

        // Close the port before settling so the caller sees the context gone.
        let leaving = runtime.should_stop();
        if leaving {
            runtime.state.tear_down();
        }
        if let Some(responder) = responder {
            if !responder.respond(&reply) {
                debug!(context = %id, %correlation, "caller stopped waiting");
            }
        }
        if leaving {
            break;
        }
    }

    // Cancelled or disconnected: the coordinator already closed the port.
    runtime.state.release();
    info!(context = %id, "secondary context stopped");
}

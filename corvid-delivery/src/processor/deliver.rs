//! Single-attempt send and outcome handling

use corvid_common::outgoing;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::{
    circuit_breaker::CircuitBreaker,
    event::DeliveryEvent,
    processor::DeliveryProcessor,
    queue::DeliveryQueue,
    sender::{SendOutcome, Sender},
    types::QueuedMessage,
};

/// Perform one send attempt and apply its outcome
///
/// Called with the rate-window slot already consumed and the breaker's
/// permission already granted. On success the message is destroyed and a
/// [`DeliveryEvent::Delivered`] dispatched; a provider throttle reschedules
/// without spending an attempt; a failure either schedules a retry with
/// backoff or, once the budget is exhausted, dispatches
/// [`DeliveryEvent::PermanentFailure`] and drops the message.
pub(crate) async fn deliver(
    processor: &DeliveryProcessor,
    queue: &DeliveryQueue,
    sender: &dyn Sender,
    breaker: &CircuitBreaker,
    mut message: QueuedMessage,
) {
    let queue_wait = message.first_enqueued_at.elapsed();

    queue.set_processing(true);
    let started = Instant::now();
    let outcome = sender.send(&message.destination, &message.payload).await;
    let elapsed = started.elapsed();
    queue.set_processing(false);

    match outcome {
        SendOutcome::Delivered => {
            breaker.record_success(&message.destination);

            if let Some(metrics) = &processor.metrics {
                metrics.record_sent(message.destination.as_str(), elapsed.as_secs_f64());
                metrics.record_queue_wait(queue_wait.as_secs_f64());
            }

            outgoing!(
                level = INFO,
                "Delivered {} to {} after {} retries",
                message.id,
                message.destination,
                message.retry_count
            );

            processor.dispatch(&DeliveryEvent::Delivered {
                id: message.id,
                destination: message.destination,
                retries: message.retry_count,
            });
        }

        SendOutcome::RateLimited(retry_after) => {
            // A provider throttle is a scheduling hint, not a failure: no
            // breaker update, no retry attempt spent.
            if let Some(metrics) = &processor.metrics {
                metrics.record_rate_limited(message.destination.as_str());
            }

            warn!(
                message_id = %message.id,
                destination = %message.destination,
                retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                "Provider rate limit hit, deferring"
            );

            message.next_eligible_at = Instant::now() + retry_after;
            queue.requeue(message);
        }

        SendOutcome::Failed(err) => {
            breaker.record_failure(&message.destination);
            message.retry_count += 1;
            message.last_error = Some(err.to_string());

            if processor.retry.should_retry(message.retry_count) {
                let delay = processor.retry.backoff(message.retry_count);

                if let Some(metrics) = &processor.metrics {
                    metrics.record_retried(message.destination.as_str());
                }

                warn!(
                    message_id = %message.id,
                    destination = %message.destination,
                    attempt = message.retry_count,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "Send failed, retry scheduled"
                );

                message.next_eligible_at = Instant::now() + delay;
                queue.requeue(message);
            } else {
                if let Some(metrics) = &processor.metrics {
                    metrics.record_failed(message.destination.as_str(), err.kind());
                }

                error!(
                    message_id = %message.id,
                    destination = %message.destination,
                    attempts = message.retry_count,
                    error = %err,
                    "Retry budget exhausted, dropping message"
                );

                processor.dispatch(&DeliveryEvent::PermanentFailure {
                    id: message.id,
                    destination: message.destination,
                    attempts: message.retry_count,
                    error: err.to_string(),
                });
            }
        }
    }
}

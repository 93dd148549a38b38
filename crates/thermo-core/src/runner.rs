//! Event loop driving a [`ThermometerClient`].

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::client::ThermometerClient;
use crate::error::{Error, Result};
use crate::traits::{BleStack, EventSource};

/// Feed events from `source` into `client` until cancelled.
///
/// Events are handled strictly one at a time; the next event is not awaited
/// until the previous one has been fully processed.
///
/// # Errors
///
/// Returns the first fatal error from [`ThermometerClient::handle_event`],
/// or [`Error::EventStreamClosed`] if the source ends before `cancel` fires.
///
/// # Example
///
/// ```
/// use thermo_core::{run, MockStack, StackEvent, StackVersion, ThermometerClient};
/// use tokio_util::sync::CancellationToken;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let mut client = ThermometerClient::new(MockStack::new());
/// let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
/// tx.send(StackEvent::SystemBooted { version: StackVersion::default() }).unwrap();
/// drop(tx);
///
/// let result = run(&mut client, &mut rx, CancellationToken::new()).await;
/// assert!(result.is_err());
/// assert_eq!(client.table().len(), 0);
/// # }
/// ```
pub async fn run<S, E>(
    client: &mut ThermometerClient<S>,
    source: &mut E,
    cancel: CancellationToken,
) -> Result<()>
where
    S: BleStack,
    E: EventSource + ?Sized,
{
    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("Event loop cancelled, shutting down");
                return Ok(());
            }
            event = source.next_event() => event,
        };

        let Some(event) = event else {
            debug!("Event source closed");
            return Err(Error::EventStreamClosed);
        };
        client.handle_event(event)?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::StackCommand;
    use crate::error::StackStatus;
    use crate::events::{StackEvent, StackVersion};
    use crate::mock::MockStack;

    fn boot() -> StackEvent {
        StackEvent::SystemBooted {
            version: StackVersion::default(),
        }
    }

    #[tokio::test]
    async fn test_processes_events_in_order() {
        let mut client = ThermometerClient::new(MockStack::new());
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        tx.send(boot()).await.unwrap();
        drop(tx);

        let result = run(&mut client, &mut rx, CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::EventStreamClosed)));
        assert_eq!(client.stack().last_command(), Some(&StackCommand::StartScan));
    }

    #[tokio::test]
    async fn test_fatal_error_stops_loop() {
        let mut stack = MockStack::new();
        stack.fail("set_default_connection_parameters", StackStatus::InvalidParameter);
        let mut client = ThermometerClient::new(stack);
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        tx.send(boot()).unwrap();
        tx.send(boot()).unwrap();

        let err = run(&mut client, &mut rx, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.stack_status(), Some(StackStatus::InvalidParameter));
        // The second event was never consumed
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_cancellation_stops_loop() {
        let mut client = ThermometerClient::new(MockStack::new());
        let (_tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<StackEvent>();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run(&mut client, &mut rx, cancel).await;
        assert!(result.is_ok());
        assert!(client.stack().commands().is_empty());
    }
}

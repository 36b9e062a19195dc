use postage::{stream::Stream, watch};
use thiserror::Error;

#[derive(Error, Debug)]
#[error("state channel closed before the condition was met")]
pub struct StateClosedError {}

/// Waits until the watched value satisfies the condition, and returns it.
pub async fn await_condition<T, F>(
    channel: &mut watch::Receiver<T>,
    mut condition: F,
) -> Result<T, StateClosedError>
where
    T: Clone + Send + Sync,
    F: FnMut(&T) -> bool,
{
    {
        let value = channel.borrow();
        if condition(&value) {
            return Ok(value.clone());
        }
    }

    while let Some(update) = channel.recv().await {
        if condition(&update) {
            return Ok(update);
        }
    }

    Err(StateClosedError {})
}

#[cfg(test)]
mod tests {
    use super::await_condition;
    use lifeline::assert_completes;
    use postage::{sink::Sink, watch};

    #[tokio::test]
    async fn resolves_immediately() {
        let (_tx, mut rx) = watch::channel_with(3usize);

        assert_completes!(async move {
            let value = await_condition(&mut rx, |v| *v == 3).await;
            assert_eq!(3, value.unwrap());
        });
    }

    #[tokio::test]
    async fn waits_for_update() -> anyhow::Result<()> {
        let (mut tx, mut rx) = watch::channel_with(0usize);

        let wait = tokio::spawn(async move { await_condition(&mut rx, |v| *v > 1).await.ok() });

        tx.send(1).await?;
        tx.send(2).await?;

        assert_completes!(async move {
            assert_eq!(Some(2), wait.await.unwrap());
        });

        Ok(())
    }

    #[tokio::test]
    async fn fails_when_closed() {
        let (tx, mut rx) = watch::channel_with(0usize);
        drop(tx);

        assert_completes!(async move {
            assert!(await_condition(&mut rx, |v| *v > 1).await.is_err());
        });
    }
}

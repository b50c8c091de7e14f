//! Optimistic local mutation with rollback.

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::WorkflowError;

type Forward<S, U> = Box<dyn FnOnce(&mut S) -> U + Send>;
type Reverse<S, U> = Box<dyn FnOnce(&mut S, U) + Send>;

/// A view-state change applied before its remote write settles.
///
/// `forward` mutates local state and returns whatever `reverse` needs to put
/// it back. If `remote` fails, `reverse` runs and the error is returned.
pub struct OptimisticCommand<S, U, T> {
    forward: Forward<S, U>,
    reverse: Reverse<S, U>,
    remote: BoxFuture<'static, Result<T, WorkflowError>>,
}

impl<S, U, T> OptimisticCommand<S, U, T>
where
    S: Send,
    U: Send + 'static,
{
    pub fn new(
        forward: impl FnOnce(&mut S) -> U + Send + 'static,
        reverse: impl FnOnce(&mut S, U) + Send + 'static,
        remote: BoxFuture<'static, Result<T, WorkflowError>>,
    ) -> Self {
        Self {
            forward: Box::new(forward),
            reverse: Box::new(reverse),
            remote,
        }
    }

    /// The lock is not held while `remote` is pending.
    pub async fn run(self, state: &Mutex<S>) -> Result<T, WorkflowError> {
        let undo = {
            let mut s = state.lock().await;
            (self.forward)(&mut *s)
        };
        match self.remote.await {
            Ok(v) => Ok(v),
            Err(e) => {
                let mut s = state.lock().await;
                (self.reverse)(&mut *s, undo);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::StoreError;
    use futures_util::FutureExt;
    use uuid::Uuid;

    fn remove_cmd(
        target: u32,
        outcome: Result<(), WorkflowError>,
    ) -> OptimisticCommand<Vec<u32>, Vec<u32>, ()> {
        OptimisticCommand::new(
            move |rows: &mut Vec<u32>| {
                let before = rows.clone();
                rows.retain(|r| *r != target);
                before
            },
            |rows: &mut Vec<u32>, before| *rows = before,
            async move { outcome }.boxed(),
        )
    }

    #[tokio::test]
    async fn success_keeps_forward_change() {
        let state = Mutex::new(vec![1, 2, 3]);
        remove_cmd(2, Ok(())).run(&state).await.unwrap();
        assert_eq!(*state.lock().await, vec![1, 3]);
    }

    #[tokio::test]
    async fn failure_restores_previous_state() {
        let state = Mutex::new(vec![1, 2, 3]);
        let err = WorkflowError::Store(StoreError::Conflict {
            table: "products",
            id: Uuid::nil(),
        });
        let res = remove_cmd(2, Err(err.clone())).run(&state).await;
        assert_eq!(res.unwrap_err(), err);
        assert_eq!(*state.lock().await, vec![1, 2, 3]);
    }
}

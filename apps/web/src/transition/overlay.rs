//! Decorative overlays driven by the coordinator's transition flag.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;

use super::{TransitionError, TransitionSnapshot, TransitionTiming};

/// A self-contained, time-bounded animation. Never owns navigation state.
#[derive(Debug, Clone, Copy)]
pub struct Overlay {
    animation: Duration,
}

impl Overlay {
    /// Rejects animations longer than the coordinator's total transition,
    /// which would keep playing after the content fades back in.
    pub fn new(animation: Duration, timing: &TransitionTiming) -> Result<Self, TransitionError> {
        let total = timing.total();
        if animation > total {
            return Err(TransitionError::OverlayTooLong { animation, total });
        }
        Ok(Self { animation })
    }

    pub fn animation(&self) -> Duration {
        self.animation
    }

    /// Plays once and calls `on_complete` exactly once when done.
    pub async fn play<F: FnOnce()>(&self, on_complete: F) {
        sleep(self.animation).await;
        on_complete();
    }

    /// Plays the overlay each time `is_transitioning` flips from false to
    /// true. The task ends when the coordinator goes away.
    pub fn attach<F>(self, mut rx: watch::Receiver<TransitionSnapshot>, on_complete: F) -> JoinHandle<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        tokio::spawn(async move {
            let mut visible = rx.borrow_and_update().is_transitioning();
            if visible {
                self.play(&on_complete).await;
                visible = rx.borrow_and_update().is_transitioning();
            }
            while rx.changed().await.is_ok() {
                let now = rx.borrow_and_update().is_transitioning();
                if now && !visible {
                    trace!(animation = ?self.animation, "Overlay playing");
                    self.play(&on_complete).await;
                    visible = rx.borrow_and_update().is_transitioning();
                } else {
                    visible = now;
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transition::TransitionCoordinator;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_overlay_longer_than_transition_rejected() {
        let timing = TransitionTiming::default();
        let err = Overlay::new(Duration::from_millis(1500), &timing).unwrap_err();
        assert_eq!(
            err,
            TransitionError::OverlayTooLong {
                animation: Duration::from_millis(1500),
                total: Duration::from_millis(1400),
            }
        );
        assert!(Overlay::new(Duration::from_millis(1400), &timing).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_completes_once() {
        let overlay = Overlay::new(Duration::from_millis(800), &TransitionTiming::default()).unwrap();
        let count = AtomicUsize::new(0);
        overlay
            .play(|| {
                count.fetch_add(1, Ordering::SeqCst);
            })
            .await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attached_overlay_plays_once_per_transition() {
        let coordinator = TransitionCoordinator::new("/", |_: &str| {});
        let overlay = Overlay::new(Duration::from_millis(1000), &coordinator.timing()).unwrap();
        let plays = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&plays);
        let handle = overlay.attach(coordinator.subscribe(), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        coordinator.navigate("/workshop");
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(plays.load(Ordering::SeqCst), 1);

        coordinator.navigate("/resumeathon");
        sleep(Duration::from_millis(2000)).await;
        assert_eq!(plays.load(Ordering::SeqCst), 2);

        drop(coordinator);
        handle.await.unwrap();
    }
}
